//! Cell-by-cell comparison of two aligned class rasters.
//!
//! One streaming pass over full-width row bands:
//!   1. read the band from both rasters,
//!   2. mask cells that are nodata on both sides,
//!   3. register the band's distinct values in the from/to vocabularies,
//!   4. count every unmasked (from, to) pair and pick its code
//!      (0 unchanged, minted code for a change),
//!   5. stamp masked cells with the reserved nodata code and write the band.
//!
//! Counts are keyed by vocabulary index, so classes first seen in a late band
//! need no backfilling; the dense sorted matrix is built once at the end.

use serde::Serialize;

use crate::align;
use crate::class_value::ClassValue;
use crate::error::{Result, TransitionError};
use crate::legend::{Legend, Transition, DEFAULT_NODATA_CODE, UNCHANGED_CODE};
use crate::matrix::{CountMatrix, TransitionMatrix};
use crate::nodata;
use crate::progress::ProgressObserver;
use crate::raster::{Block, BlockSink, BlockSource, Blocks};
use crate::vocabulary::{distinct_values, Vocabulary};

/// Knobs of a single pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Rows per streamed band; `None` uses the "from" raster's natural layout.
    pub block_rows: Option<usize>,
    /// Code written where both inputs are nodata. Must be negative.
    pub nodata_code: i32,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            block_rows: None,
            nodata_code: DEFAULT_NODATA_CODE,
        }
    }
}

/// Per-pixel classification tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PixelStats {
    pub total: u64,
    /// Nodata in both inputs.
    pub nodata: u64,
    pub unchanged: u64,
    pub changed: u64,
}

/// Everything a completed pass produces besides the code raster.
#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub matrix: TransitionMatrix,
    pub legend: Legend,
    pub stats: PixelStats,
}

/// Incremental state of a pass. Feed it blocks in raster order, then
/// [`finish`](Self::finish) it.
#[derive(Debug)]
pub struct TransitionEngine {
    from_nodata: Option<f64>,
    to_nodata: Option<f64>,
    from_vocab: Vocabulary,
    to_vocab: Vocabulary,
    counts: CountMatrix,
    legend: Legend,
    stats: PixelStats,
}

impl TransitionEngine {
    pub fn new(from_nodata: Option<f64>, to_nodata: Option<f64>, nodata_code: i32) -> Result<Self> {
        Ok(Self {
            from_nodata,
            to_nodata,
            from_vocab: Vocabulary::new(),
            to_vocab: Vocabulary::new(),
            counts: CountMatrix::new(),
            legend: Legend::new(nodata_code)?,
            stats: PixelStats::default(),
        })
    }

    /// Classify one pair of corresponding blocks; returns the codes for the
    /// block, row-major.
    pub fn process_block(&mut self, from: &Block, to: &Block) -> Result<Vec<i32>> {
        let n = from.window.len();
        if from.shape() != to.shape() || from.values.len() != n || to.values.len() != n {
            return Err(TransitionError::GeometryMismatch {
                window: from.window,
                from_shape: from.shape(),
                to_shape: to.shape(),
            });
        }

        let mask = nodata::both_nodata_mask(&from.values, self.from_nodata, &to.values, self.to_nodata);

        let new_from = self.from_vocab.extend_distinct(&distinct_values(&from.values, &mask));
        let new_to = self.to_vocab.extend_distinct(&distinct_values(&to.values, &mask));
        if new_from + new_to > 0 {
            tracing::debug!(
                row_off = from.window.row_off,
                new_from,
                new_to,
                "new classes observed"
            );
        }

        let nodata_code = self.legend.nodata_code();
        let mut codes = Vec::with_capacity(n);
        for ((&f, &t), &masked) in from.values.iter().zip(&to.values).zip(&mask) {
            if masked {
                self.stats.nodata += 1;
                codes.push(nodata_code);
                continue;
            }
            let (from_value, to_value) = (ClassValue::new(f), ClassValue::new(t));
            let fi = self.from_vocab.insert(from_value);
            let ti = self.to_vocab.insert(to_value);
            self.counts.increment(fi, ti);

            let code = if from_value == to_value {
                self.stats.unchanged += 1;
                UNCHANGED_CODE
            } else {
                self.stats.changed += 1;
                self.legend.code_for(
                    fi,
                    ti,
                    Transition {
                        from: from_value,
                        to: to_value,
                    },
                )?
            };
            codes.push(code);
        }
        self.stats.total += n as u64;
        Ok(codes)
    }

    pub fn finish(self) -> TransitionOutcome {
        TransitionOutcome {
            matrix: self.counts.materialize(&self.from_vocab, &self.to_vocab),
            legend: self.legend,
            stats: self.stats,
        }
    }
}

/// Stream `from` and `to` block by block, writing codes into `sink`.
///
/// Both sources must already share one grid; a mismatch is reported as an
/// alignment error before anything is read. Any error aborts the pass and
/// the sink must then be treated as garbage.
pub fn compute_transitions<F, T, S, O>(
    from: &mut F,
    to: &mut T,
    sink: &mut S,
    options: &EngineOptions,
    observer: &mut O,
) -> Result<TransitionOutcome>
where
    F: BlockSource,
    T: BlockSource,
    S: BlockSink,
    O: ProgressObserver + ?Sized,
{
    let geometry = from.geometry();
    align::ensure_aligned(&geometry, &to.geometry())?;

    let block_rows = resolve_block_rows(options.block_rows, &*from);
    let total = geometry.pixel_count();
    let mut engine = TransitionEngine::new(from.nodata(), to.nodata(), options.nodata_code)?;
    tracing::info!(
        cols = geometry.cols,
        rows = geometry.rows,
        block_rows,
        from_nodata = ?from.nodata(),
        to_nodata = ?to.nodata(),
        "computing transitions"
    );

    let mut processed = 0u64;
    for from_block in Blocks::new(from, block_rows) {
        if observer.is_cancelled() {
            return Err(TransitionError::Cancelled { processed, total });
        }
        let from_block = from_block?;
        let to_block = to.read_window(from_block.window)?;
        let codes = engine.process_block(&from_block, &to_block)?;
        sink.write_block(from_block.window, &codes)?;

        processed += from_block.window.len() as u64;
        observer.on_block(processed, total);
    }
    observer.on_finish(total);

    let outcome = engine.finish();
    tracing::info!(
        changed = outcome.stats.changed,
        unchanged = outcome.stats.unchanged,
        nodata = outcome.stats.nodata,
        transitions = outcome.legend.transition_count(),
        "transitions complete"
    );
    Ok(outcome)
}

/// Band height actually used for a pass.
pub fn resolve_block_rows<F: BlockSource + ?Sized>(requested: Option<usize>, from: &F) -> usize {
    requested.unwrap_or_else(|| from.natural_block_rows()).max(1)
}
