//! Nodata detection.
//!
//! Sentinels stored as floating point rarely survive format conversions bit
//! for bit, so a cell matches the sentinel when it is within
//! `ABS_TOLERANCE + REL_TOLERANCE * |nodata|` of it. A NaN sentinel matches NaN
//! cells. Class values themselves are still compared exactly elsewhere.

use crate::error::{Result, TransitionError};

const REL_TOLERANCE: f64 = 1e-5;
const ABS_TOLERANCE: f64 = 1e-8;

/// True when `value` is the nodata sentinel. No sentinel never matches.
#[inline]
pub fn matches(value: f64, nodata: Option<f64>) -> bool {
    let Some(nodata) = nodata else {
        return false;
    };
    if nodata.is_nan() || value.is_nan() {
        return nodata.is_nan() && value.is_nan();
    }
    if nodata.is_infinite() || value.is_infinite() {
        return value == nodata;
    }
    (value - nodata).abs() <= ABS_TOLERANCE + REL_TOLERANCE * nodata.abs()
}

/// Per-pixel mask of cells that are nodata in both rasters.
pub fn both_nodata_mask(
    from: &[f64],
    from_nodata: Option<f64>,
    to: &[f64],
    to_nodata: Option<f64>,
) -> Vec<bool> {
    from.iter()
        .zip(to)
        .map(|(&f, &t)| matches(f, from_nodata) && matches(t, to_nodata))
        .collect()
}

/// Parse a nodata literal: any float syntax, plus `nan` and `inf` in any case.
pub fn parse_value(text: &str) -> Result<f64> {
    let text = text.trim();
    text.parse::<f64>()
        .map_err(|_| TransitionError::InvalidArgument(format!("not a numeric nodata value: {text:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_sentinel_matches() {
        assert!(matches(-9999.0, Some(-9999.0)));
        assert!(!matches(-9998.0, Some(-9999.0)));
    }

    #[test]
    fn float_artifacts_match() {
        // -9999 stored as f32 and widened back.
        let widened = f64::from(-9999.0f32) + 1e-6;
        assert!(matches(widened, Some(-9999.0)));
        assert!(matches(3.4028234663852886e38, Some(f64::from(f32::MAX))));
    }

    #[test]
    fn nan_sentinel_matches_nan_only() {
        assert!(matches(f64::NAN, Some(f64::NAN)));
        assert!(!matches(0.0, Some(f64::NAN)));
        assert!(!matches(f64::NAN, Some(0.0)));
    }

    #[test]
    fn infinite_sentinel() {
        assert!(matches(f64::NEG_INFINITY, Some(f64::NEG_INFINITY)));
        assert!(!matches(f64::INFINITY, Some(f64::NEG_INFINITY)));
        assert!(!matches(f64::MAX, Some(f64::INFINITY)));
    }

    #[test]
    fn no_sentinel_never_matches() {
        assert!(!matches(0.0, None));
        assert!(!matches(f64::NAN, None));
    }

    #[test]
    fn zero_sentinel_is_tight() {
        assert!(matches(0.0, Some(0.0)));
        assert!(!matches(1e-6, Some(0.0)));
    }

    #[test]
    fn mask_requires_both_sides() {
        let mask = both_nodata_mask(
            &[-1.0, -1.0, 3.0, 3.0],
            Some(-1.0),
            &[255.0, 4.0, 255.0, 4.0],
            Some(255.0),
        );
        assert_eq!(mask, vec![true, false, false, false]);
    }

    #[test]
    fn parse_literals() {
        assert_eq!(parse_value(" -9999 ").unwrap(), -9999.0);
        assert_eq!(parse_value("1e3").unwrap(), 1000.0);
        assert!(parse_value("nan").unwrap().is_nan());
        assert!(parse_value("NaN").unwrap().is_nan());
        assert_eq!(parse_value("-inf").unwrap(), f64::NEG_INFINITY);
        assert!(matches!(
            parse_value("none"),
            Err(TransitionError::InvalidArgument(_))
        ));
    }
}
