//! CSV reports: the count matrix and the code legend.

use std::io::Write;

use crate::legend::{Legend, NODATA_LABEL};
use crate::matrix::TransitionMatrix;

pub const MATRIX_CORNER: &str = "From/To";
pub const LEGEND_HEADER: [&str; 2] = ["Transition Class", "Transition"];

/// Header `From/To, <to classes...>`, then one row per from-class with its
/// counts. Rows and columns are in ascending class order.
pub fn write_count_matrix<W: Write>(matrix: &TransitionMatrix, writer: W) -> csv::Result<()> {
    let mut out = csv::Writer::from_writer(writer);

    let header = std::iter::once(MATRIX_CORNER.to_string())
        .chain(matrix.to_values().iter().map(ToString::to_string));
    out.write_record(header)?;

    for (from, counts) in matrix.rows() {
        let record = std::iter::once(from.to_string())
            .chain(counts.iter().map(ToString::to_string));
        out.write_record(record)?;
    }
    out.flush()?;
    Ok(())
}

/// Header, the reserved nodata row, then every code from 0 upwards.
pub fn write_legend<W: Write>(legend: &Legend, writer: W) -> csv::Result<()> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(LEGEND_HEADER)?;
    out.write_record([
        format!("{} (nodata)", legend.nodata_code()),
        NODATA_LABEL.to_string(),
    ])?;
    for (code, label) in legend.entries() {
        out.write_record([code.to_string(), label])?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_value::ClassValue;
    use crate::legend::Transition;
    use crate::matrix::CountMatrix;
    use crate::vocabulary::Vocabulary;

    fn render(write: impl FnOnce(&mut Vec<u8>) -> csv::Result<()>) -> String {
        let mut buf = Vec::new();
        write(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn matrix_csv_layout() {
        let mut from = Vocabulary::new();
        let mut to = Vocabulary::new();
        let (f1, f2) = (from.insert(ClassValue::new(1.0)), from.insert(ClassValue::new(2.0)));
        let (t2, t1) = (to.insert(ClassValue::new(2.0)), to.insert(ClassValue::new(1.0)));
        let mut counts = CountMatrix::new();
        counts.increment(f1, t1);
        counts.increment(f1, t2);
        counts.increment(f2, t2);
        let matrix = counts.materialize(&from, &to);

        let text = render(|buf| write_count_matrix(&matrix, buf));
        assert_eq!(text, "From/To,1,2\n1,1,1\n2,0,1\n");
    }

    #[test]
    fn fractional_and_nan_classes_are_printed_verbatim() {
        let mut from = Vocabulary::new();
        let mut to = Vocabulary::new();
        let fi = from.insert(ClassValue::new(0.5));
        let ti = to.insert(ClassValue::new(f64::NAN));
        let mut counts = CountMatrix::new();
        counts.increment(fi, ti);
        let matrix = counts.materialize(&from, &to);

        let text = render(|buf| write_count_matrix(&matrix, buf));
        assert_eq!(text, "From/To,NaN\n0.5,1\n");
    }

    #[test]
    fn empty_matrix_is_header_only() {
        let matrix = CountMatrix::new().materialize(&Vocabulary::new(), &Vocabulary::new());
        let text = render(|buf| write_count_matrix(&matrix, buf));
        assert_eq!(text, "From/To\n");
    }

    #[test]
    fn legend_csv_layout() {
        let mut legend = Legend::new(-1).unwrap();
        legend
            .code_for(
                0,
                1,
                Transition {
                    from: ClassValue::new(1.0),
                    to: ClassValue::new(2.0),
                },
            )
            .unwrap();

        let text = render(|buf| write_legend(&legend, buf));
        assert_eq!(
            text,
            "Transition Class,Transition\n\
             -1 (nodata),nodata to nodata\n\
             0,unchanged\n\
             1,1 to 2\n"
        );
    }

    #[test]
    fn legend_uses_configured_nodata_code() {
        let legend = Legend::new(-128).unwrap();
        let text = render(|buf| write_legend(&legend, buf));
        assert!(text.contains("-128 (nodata),nodata to nodata\n"));
    }
}
