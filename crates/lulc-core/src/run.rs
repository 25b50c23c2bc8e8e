//! File-level pipeline: two GeoTIFFs in, code raster and two CSVs out.
//!
//! All outputs are first written to temporary files inside the output
//! directory and only renamed to their final names once every artifact is
//! complete. A failed run therefore leaves no half-written file under a
//! final name; the temporaries are removed when they are dropped.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;

use crate::align;
use crate::config::TransitionConfig;
use crate::engine::{compute_transitions, resolve_block_rows, TransitionOutcome};
use crate::error::{Result, TransitionError};
use crate::progress::ProgressObserver;
use crate::raster::geotiff::{write_code_raster, GeoTiffReader, RasterTemplate};
use crate::raster::{BlockSource, Windowed};
use crate::report;

pub const RASTER_FILE_NAME: &str = "transition_raster.tif";
pub const MATRIX_FILE_NAME: &str = "transition_csv_matrix.csv";
pub const LEGEND_FILE_NAME: &str = "transition_raster_table.csv";

/// Final locations of the three artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputPaths {
    pub raster: PathBuf,
    pub matrix: PathBuf,
    pub legend: PathBuf,
}

impl OutputPaths {
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            raster: dir.join(RASTER_FILE_NAME),
            matrix: dir.join(MATRIX_FILE_NAME),
            legend: dir.join(LEGEND_FILE_NAME),
        }
    }
}

/// Compare `from_path` against `to_path` and write the three artifacts into
/// `output_dir`, creating it if needed.
pub fn run_transition<O>(
    from_path: impl AsRef<Path>,
    to_path: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &TransitionConfig,
    observer: &mut O,
) -> Result<TransitionOutcome>
where
    O: ProgressObserver + ?Sized,
{
    let output_dir = output_dir.as_ref();
    config.validate()?;

    let mut from = GeoTiffReader::open(from_path.as_ref())?;
    let mut to = GeoTiffReader::open(to_path.as_ref())?;
    if config.from_nodata.is_some() {
        from.set_nodata(config.from_nodata);
    }
    if config.to_nodata.is_some() {
        to.set_nodata(config.to_nodata);
    }

    let alignment = align::resolve(&from.geometry(), &to.geometry(), config.align)?;
    let geokeys = from.geokeys().clone();
    let mut from = Windowed::new(from, alignment.from)?;
    let mut to = Windowed::new(to, alignment.to)?;
    let template = RasterTemplate {
        geometry: from.geometry(),
        geokeys,
    };

    let mut options = config.engine_options();
    let block_rows = resolve_block_rows(options.block_rows, &from);
    options.block_rows = Some(block_rows);

    std::fs::create_dir_all(output_dir).map_err(|e| TransitionError::io(output_dir, e))?;
    let paths = OutputPaths::in_dir(output_dir);

    let mut raster_tmp = scratch_file(output_dir)?;
    let outcome = write_code_raster(
        raster_tmp.as_file_mut(),
        &paths.raster,
        &template,
        options.nodata_code,
        block_rows,
        |sink| compute_transitions(&mut from, &mut to, sink, &options, observer),
    )?;
    sync(raster_tmp.as_file(), &paths.raster)?;

    let mut matrix_tmp = scratch_file(output_dir)?;
    report::write_count_matrix(&outcome.matrix, matrix_tmp.as_file_mut())
        .map_err(|e| csv_error(&paths.matrix, e))?;

    let mut legend_tmp = scratch_file(output_dir)?;
    report::write_legend(&outcome.legend, legend_tmp.as_file_mut())
        .map_err(|e| csv_error(&paths.legend, e))?;

    persist(matrix_tmp, &paths.matrix)?;
    persist(legend_tmp, &paths.legend)?;
    persist(raster_tmp, &paths.raster)?;

    tracing::info!(
        raster = %paths.raster.display(),
        matrix = %paths.matrix.display(),
        legend = %paths.legend.display(),
        "outputs written"
    );
    Ok(outcome)
}

fn scratch_file(dir: &Path) -> Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix(".transition-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(|e| TransitionError::io(dir, e))
}

fn sync(file: &File, path: &Path) -> Result<()> {
    file.sync_all().map_err(|e| TransitionError::io(path, e))
}

fn persist(tmp: NamedTempFile, path: &Path) -> Result<()> {
    tmp.persist(path)
        .map(drop)
        .map_err(|e| TransitionError::io(path, e.error))
}

fn csv_error(path: &Path, source: csv::Error) -> TransitionError {
    TransitionError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names() {
        let paths = OutputPaths::in_dir("/tmp/out");
        assert_eq!(paths.raster, Path::new("/tmp/out/transition_raster.tif"));
        assert_eq!(paths.matrix, Path::new("/tmp/out/transition_csv_matrix.csv"));
        assert_eq!(paths.legend, Path::new("/tmp/out/transition_raster_table.csv"));
    }
}
