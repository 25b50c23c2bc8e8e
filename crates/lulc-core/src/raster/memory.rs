use crate::error::{Result, TransitionError};

use super::{Block, BlockSink, BlockSource, RasterGeometry, Window};

/// A raster held entirely in memory, row-major.
#[derive(Debug, Clone)]
pub struct MemoryRaster {
    geometry: RasterGeometry,
    values: Vec<f64>,
    nodata: Option<f64>,
    block_rows: usize,
}

impl MemoryRaster {
    pub fn new(geometry: RasterGeometry, values: Vec<f64>, nodata: Option<f64>) -> Result<Self> {
        if values.len() as u64 != geometry.pixel_count() {
            return Err(TransitionError::InvalidArgument(format!(
                "{} values do not fill a {}x{} grid",
                values.len(),
                geometry.cols,
                geometry.rows
            )));
        }
        Ok(Self {
            geometry,
            values,
            nodata,
            block_rows: 256,
        })
    }

    /// Build from nested rows; every row must have the same length.
    pub fn from_rows(rows: &[Vec<f64>], nodata: Option<f64>) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != cols) {
            return Err(TransitionError::InvalidArgument(
                "ragged rows in raster literal".to_string(),
            ));
        }
        let values = rows.iter().flatten().copied().collect();
        Self::new(RasterGeometry::ungeoreferenced(cols, rows.len()), values, nodata)
    }

    pub fn with_transform(mut self, transform: super::GeoTransform) -> Self {
        self.geometry.transform = Some(transform);
        self
    }

    pub fn with_block_rows(mut self, block_rows: usize) -> Self {
        self.block_rows = block_rows.max(1);
        self
    }
}

impl BlockSource for MemoryRaster {
    fn geometry(&self) -> RasterGeometry {
        self.geometry
    }

    fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    fn natural_block_rows(&self) -> usize {
        self.block_rows
    }

    fn read_window(&mut self, window: Window) -> Result<Block> {
        if !self.geometry.contains(&window) {
            return Err(TransitionError::InvalidArgument(format!(
                "window {window:?} outside {}x{} raster",
                self.geometry.cols, self.geometry.rows
            )));
        }
        let mut values = Vec::with_capacity(window.len());
        for row in window.row_off..window.row_off + window.rows {
            let start = row * self.geometry.cols + window.col_off;
            values.extend_from_slice(&self.values[start..start + window.cols]);
        }
        Ok(Block::new(window, values))
    }
}

/// Collects written codes in memory; cells never written keep `fill`.
#[derive(Debug, Clone)]
pub struct MemorySink {
    geometry: RasterGeometry,
    codes: Vec<i32>,
    blocks_written: usize,
}

impl MemorySink {
    pub fn new(geometry: RasterGeometry, fill: i32) -> Self {
        Self {
            geometry,
            codes: vec![fill; geometry.cols * geometry.rows],
            blocks_written: 0,
        }
    }

    pub fn codes(&self) -> &[i32] {
        &self.codes
    }

    pub fn blocks_written(&self) -> usize {
        self.blocks_written
    }
}

impl BlockSink for MemorySink {
    fn write_block(&mut self, window: Window, codes: &[i32]) -> Result<()> {
        if !self.geometry.contains(&window) || codes.len() != window.len() {
            return Err(TransitionError::GeometryMismatch {
                window,
                from_shape: (window.cols, window.rows),
                to_shape: (self.geometry.cols, self.geometry.rows),
            });
        }
        for (r, row_codes) in codes.chunks(window.cols.max(1)).enumerate() {
            let start = (window.row_off + r) * self.geometry.cols + window.col_off;
            self.codes[start..start + window.cols].copy_from_slice(row_codes);
        }
        self.blocks_written += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_inner_window() {
        let mut raster = MemoryRaster::from_rows(
            &[vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0], vec![7.0, 8.0, 9.0]],
            None,
        )
        .unwrap();
        let block = raster.read_window(Window::new(1, 1, 2, 2)).unwrap();
        assert_eq!(block.values, vec![5.0, 6.0, 8.0, 9.0]);
    }

    #[test]
    fn read_outside_is_rejected() {
        let mut raster = MemoryRaster::from_rows(&[vec![1.0, 2.0]], None).unwrap();
        assert!(raster.read_window(Window::new(1, 0, 2, 1)).is_err());
    }

    #[test]
    fn ragged_rows_rejected() {
        assert!(MemoryRaster::from_rows(&[vec![1.0, 2.0], vec![3.0]], None).is_err());
    }

    #[test]
    fn value_count_must_match_geometry() {
        let err = MemoryRaster::new(RasterGeometry::ungeoreferenced(2, 2), vec![0.0; 3], None);
        assert!(matches!(err, Err(TransitionError::InvalidArgument(_))));
    }

    #[test]
    fn sink_places_block() {
        let mut sink = MemorySink::new(RasterGeometry::ungeoreferenced(3, 2), -1);
        sink.write_block(Window::new(1, 1, 2, 1), &[7, 8]).unwrap();
        assert_eq!(sink.codes(), &[-1, -1, -1, -1, 7, 8]);
        assert_eq!(sink.blocks_written(), 1);
    }

    #[test]
    fn sink_rejects_wrong_length() {
        let mut sink = MemorySink::new(RasterGeometry::ungeoreferenced(3, 2), 0);
        let err = sink.write_block(Window::new(0, 0, 3, 1), &[1, 2]);
        assert!(matches!(err, Err(TransitionError::GeometryMismatch { .. })));
    }
}
