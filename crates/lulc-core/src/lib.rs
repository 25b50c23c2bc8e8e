//! Land-use / land-cover transition analysis.
//!
//! Streams two aligned class rasters band by band and produces a per-pixel
//! transition-code raster, a from × to count matrix and a code legend.

pub mod align;
pub mod class_value;
pub mod config;
pub mod engine;
pub mod error;
pub mod legend;
pub mod matrix;
pub mod nodata;
pub mod progress;
pub mod raster;
pub mod report;
pub mod run;
pub mod vocabulary;

pub use align::AlignMode;
pub use class_value::ClassValue;
pub use config::TransitionConfig;
pub use engine::{compute_transitions, EngineOptions, PixelStats, TransitionEngine, TransitionOutcome};
pub use error::{Result, TransitionError};
pub use legend::{Legend, Transition};
pub use matrix::TransitionMatrix;
pub use progress::{LogProgress, ProgressObserver, Silent};
pub use run::{run_transition, OutputPaths};
