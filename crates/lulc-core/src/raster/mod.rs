//! Raster grids, windows and the block streaming contract.
//!
//! The engine never sees a whole raster. It pulls full-width row bands from a
//! [`BlockSource`] and pushes transition codes into a [`BlockSink`], so peak
//! memory is one band per input plus one band of output.

pub mod geotiff;
mod memory;
mod windowed;

pub use memory::{MemoryRaster, MemorySink};
pub use windowed::Windowed;

use crate::error::Result;

// ── Geometry ─────────────────────────────────────────────────────────────────

/// Affine placement of a north-up raster: world coordinate of the top-left
/// corner of pixel (0, 0) and the signed pixel size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    /// Negative for north-up rasters.
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
        }
    }

    /// Transform of the sub-grid starting at pixel (col_off, row_off).
    pub fn shifted(&self, col_off: usize, row_off: usize) -> Self {
        Self {
            origin_x: self.origin_x + col_off as f64 * self.pixel_width,
            origin_y: self.origin_y + row_off as f64 * self.pixel_height,
            ..*self
        }
    }
}

/// Size and placement of a single-band raster.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterGeometry {
    pub cols: usize,
    pub rows: usize,
    /// `None` when the file carries no georeferencing.
    pub transform: Option<GeoTransform>,
}

impl RasterGeometry {
    pub fn new(cols: usize, rows: usize, transform: Option<GeoTransform>) -> Self {
        Self {
            cols,
            rows,
            transform,
        }
    }

    /// A grid without georeferencing.
    pub fn ungeoreferenced(cols: usize, rows: usize) -> Self {
        Self::new(cols, rows, None)
    }

    pub fn pixel_count(&self) -> u64 {
        self.cols as u64 * self.rows as u64
    }

    /// The window covering the whole grid.
    pub fn full_window(&self) -> Window {
        Window::new(0, 0, self.cols, self.rows)
    }

    pub fn contains(&self, window: &Window) -> bool {
        window.col_off + window.cols <= self.cols && window.row_off + window.rows <= self.rows
    }
}

/// A rectangular sub-window of a grid, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Window {
    pub col_off: usize,
    pub row_off: usize,
    pub cols: usize,
    pub rows: usize,
}

impl Window {
    pub fn new(col_off: usize, row_off: usize, cols: usize, rows: usize) -> Self {
        Self {
            col_off,
            row_off,
            cols,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.cols * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The same window moved by (col_off, row_off).
    pub fn offset_by(&self, col_off: usize, row_off: usize) -> Self {
        Self {
            col_off: self.col_off + col_off,
            row_off: self.row_off + row_off,
            ..*self
        }
    }
}

// ── Blocks ───────────────────────────────────────────────────────────────────

/// Pixel values of one window, row-major, widened to f64.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub window: Window,
    pub values: Vec<f64>,
}

impl Block {
    pub fn new(window: Window, values: Vec<f64>) -> Self {
        Self { window, values }
    }

    /// (cols, rows) of the block.
    pub fn shape(&self) -> (usize, usize) {
        (self.window.cols, self.window.rows)
    }
}

/// Read side of the streaming contract.
pub trait BlockSource {
    fn geometry(&self) -> RasterGeometry;

    /// The nodata sentinel, if the raster declares one.
    fn nodata(&self) -> Option<f64>;

    /// Band height the underlying storage is organised in; used as the
    /// default block height.
    fn natural_block_rows(&self) -> usize;

    /// Read one window. The window must lie inside `geometry()`.
    fn read_window(&mut self, window: Window) -> Result<Block>;
}

/// Write side of the streaming contract.
pub trait BlockSink {
    /// Store `codes` (row-major, `window.len()` values) at `window`.
    fn write_block(&mut self, window: Window, codes: &[i32]) -> Result<()>;
}

impl<S: BlockSource + ?Sized> BlockSource for &mut S {
    fn geometry(&self) -> RasterGeometry {
        (**self).geometry()
    }

    fn nodata(&self) -> Option<f64> {
        (**self).nodata()
    }

    fn natural_block_rows(&self) -> usize {
        (**self).natural_block_rows()
    }

    fn read_window(&mut self, window: Window) -> Result<Block> {
        (**self).read_window(window)
    }
}

impl<S: BlockSink + ?Sized> BlockSink for &mut S {
    fn write_block(&mut self, window: Window, codes: &[i32]) -> Result<()> {
        (**self).write_block(window, codes)
    }
}

/// Full-width row bands of `block_rows` rows covering `geometry` top to
/// bottom; the last band may be shorter.
///
/// Because every band spans the full width, concatenating the bands yields
/// the global row-major pixel order whatever `block_rows` is.
pub fn row_bands(geometry: RasterGeometry, block_rows: usize) -> impl Iterator<Item = Window> {
    let block_rows = block_rows.max(1);
    let RasterGeometry { cols, rows, .. } = geometry;
    (0..rows)
        .step_by(block_rows)
        .map(move |row_off| Window::new(0, row_off, cols, block_rows.min(rows - row_off)))
}

/// Lazy, finite, non-restartable sequence of blocks read from a source.
pub struct Blocks<'a, S: BlockSource + ?Sized> {
    source: &'a mut S,
    windows: Box<dyn Iterator<Item = Window>>,
}

impl<'a, S: BlockSource + ?Sized> Blocks<'a, S> {
    pub fn new(source: &'a mut S, block_rows: usize) -> Self {
        let windows = Box::new(row_bands(source.geometry(), block_rows));
        Self { source, windows }
    }
}

impl<S: BlockSource + ?Sized> Iterator for Blocks<'_, S> {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        let window = self.windows.next()?;
        Some(self.source.read_window(window))
    }
}
