//! Error types for the lulc-core crate.

use std::path::PathBuf;

use crate::raster::Window;

/// Error type for every fallible operation in the transition pipeline.
///
/// Any error aborts the whole pass; nothing is downgraded to a warning.
#[derive(Debug, thiserror::Error)]
pub enum TransitionError {
    /// The two inputs are not on the same pixel grid.
    #[error("rasters are not aligned: {reason}")]
    Alignment {
        /// What differs between the two grids.
        reason: String,
    },

    /// Corresponding blocks of the two rasters disagree in shape.
    #[error(
        "block geometry mismatch at row {}, col {}: from block is {}x{}, to block is {}x{}",
        window.row_off, window.col_off, from_shape.0, from_shape.1, to_shape.0, to_shape.1
    )]
    GeometryMismatch {
        /// The window that was requested.
        window: Window,
        /// (cols, rows) of the block read from the "from" raster.
        from_shape: (usize, usize),
        /// (cols, rows) of the block read from the "to" raster or expected by the sink.
        to_shape: (usize, usize),
    },

    /// Reading or writing a file failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// The offending path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The TIFF codec rejected a file.
    #[error("TIFF error on {}: {source}", path.display())]
    Tiff {
        /// The offending path.
        path: PathBuf,
        /// Underlying codec error.
        #[source]
        source: tiff::TiffError,
    },

    /// Writing a CSV report failed.
    #[error("CSV error on {}: {source}", path.display())]
    Csv {
        /// The offending path.
        path: PathBuf,
        /// Underlying CSV error.
        #[source]
        source: csv::Error,
    },

    /// The raster is readable but has a layout this crate does not handle.
    #[error("unsupported raster {}: {reason}", path.display())]
    UnsupportedRaster {
        /// The offending path.
        path: PathBuf,
        /// Why the raster was rejected.
        reason: String,
    },

    /// Malformed configuration or argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// More distinct transitions than the i32 code space can hold.
    #[error("transition code space exhausted")]
    CodeSpaceExhausted,

    /// The progress observer asked the pass to stop.
    #[error("cancelled after {processed} of {total} pixels")]
    Cancelled {
        /// Pixels processed before cancellation.
        processed: u64,
        /// Total pixels in the pass.
        total: u64,
    },
}

impl TransitionError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn tiff(path: impl Into<PathBuf>, source: tiff::TiffError) -> Self {
        Self::Tiff {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn unsupported(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::UnsupportedRaster {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn alignment(reason: impl Into<String>) -> Self {
        Self::Alignment {
            reason: reason.into(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TransitionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_names_path() {
        let e = TransitionError::io(
            "data/from.tif",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert_eq!(e.to_string(), "I/O error on data/from.tif: missing");
    }

    #[test]
    fn geometry_mismatch_message() {
        let e = TransitionError::GeometryMismatch {
            window: Window::new(0, 256, 100, 256),
            from_shape: (100, 256),
            to_shape: (100, 128),
        };
        assert_eq!(
            e.to_string(),
            "block geometry mismatch at row 256, col 0: from block is 100x256, to block is 100x128"
        );
    }

    #[test]
    fn cancelled_message() {
        let e = TransitionError::Cancelled {
            processed: 10,
            total: 40,
        };
        assert_eq!(e.to_string(), "cancelled after 10 of 40 pixels");
    }

    #[test]
    fn error_is_send_and_sync() {
        fn assert_impl<T: Send + Sync + std::error::Error>() {}
        assert_impl::<TransitionError>();
    }
}
