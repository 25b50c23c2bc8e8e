use crate::error::{Result, TransitionError};

use super::{Block, BlockSource, RasterGeometry, Window};

/// Exposes a sub-window of another source as a grid of its own.
///
/// Window offsets passed to `read_window` are relative to the sub-window; the
/// returned block reports them the same way.
#[derive(Debug)]
pub struct Windowed<S> {
    inner: S,
    window: Window,
    geometry: RasterGeometry,
}

impl<S: BlockSource> Windowed<S> {
    pub fn new(inner: S, window: Window) -> Result<Self> {
        let parent = inner.geometry();
        if !parent.contains(&window) {
            return Err(TransitionError::InvalidArgument(format!(
                "sub-window {window:?} outside {}x{} raster",
                parent.cols, parent.rows
            )));
        }
        let geometry = RasterGeometry::new(
            window.cols,
            window.rows,
            parent
                .transform
                .map(|t| t.shifted(window.col_off, window.row_off)),
        );
        Ok(Self {
            inner,
            window,
            geometry,
        })
    }
}

impl<S: BlockSource> BlockSource for Windowed<S> {
    fn geometry(&self) -> RasterGeometry {
        self.geometry
    }

    fn nodata(&self) -> Option<f64> {
        self.inner.nodata()
    }

    fn natural_block_rows(&self) -> usize {
        self.inner.natural_block_rows()
    }

    fn read_window(&mut self, window: Window) -> Result<Block> {
        if !self.geometry.contains(&window) {
            return Err(TransitionError::InvalidArgument(format!(
                "window {window:?} outside {}x{} view",
                self.geometry.cols, self.geometry.rows
            )));
        }
        let outer = window.offset_by(self.window.col_off, self.window.row_off);
        let block = self.inner.read_window(outer)?;
        Ok(Block::new(window, block.values))
    }
}
