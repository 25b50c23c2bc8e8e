//! Progress reporting and cooperative cancellation for the streaming pass.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Receives progress between blocks. Implementations must be cheap: the
/// engine calls `on_block` once per block.
pub trait ProgressObserver {
    /// `processed` of `total` pixels are done.
    fn on_block(&mut self, processed: u64, total: u64);

    /// Called once after the last block.
    fn on_finish(&mut self, _total: u64) {}

    /// Checked between blocks; returning true aborts the pass.
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Observer that reports nothing and never cancels.
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl ProgressObserver for Silent {
    fn on_block(&mut self, _processed: u64, _total: u64) {}
}

/// Logs the percentage done through `tracing`, at most once per interval.
#[derive(Debug)]
pub struct LogProgress {
    interval: Duration,
    last_report: Instant,
    /// Interim reports emitted so far.
    reports: u64,
    cancel: Option<Arc<AtomicBool>>,
}

impl LogProgress {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_report: Instant::now(),
            reports: 0,
            cancel: None,
        }
    }

    /// Abort the pass at the next block boundary once `flag` is set.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }
}

impl Default for LogProgress {
    fn default() -> Self {
        Self::new(Duration::from_secs(5))
    }
}

impl ProgressObserver for LogProgress {
    fn on_block(&mut self, processed: u64, total: u64) {
        if self.last_report.elapsed() < self.interval {
            return;
        }
        tracing::info!("transitions {:.2}% complete", percent(processed, total));
        self.last_report = Instant::now();
        self.reports += 1;
    }

    fn on_finish(&mut self, _total: u64) {
        tracing::info!(interim_reports = self.reports, "transitions 100.00% complete");
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|flag| flag.load(Ordering::Relaxed))
    }
}

pub fn percent(processed: u64, total: u64) -> f64 {
    if total == 0 {
        100.0
    } else {
        processed as f64 / total as f64 * 100.0
    }
}
