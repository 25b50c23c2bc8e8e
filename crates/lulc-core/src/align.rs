//! Grid alignment checks and resampling-free intersection.
//!
//! Two rasters are aligned when they have the same size, pixel size and
//! origin. `Intersection` additionally accepts rasters on the same pixel
//! lattice with different extents, and crops both to the shared part. No
//! resampling is ever done: grids that would need it are rejected.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransitionError};
use crate::raster::{GeoTransform, RasterGeometry, Window};

/// Relative tolerance on pixel sizes.
const PIXEL_SIZE_TOLERANCE: f64 = 1e-9;
/// Tolerance on origin offsets, in pixels.
const ORIGIN_TOLERANCE_PX: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlignMode {
    /// Inputs must already share one grid.
    #[default]
    Strict,
    /// Crop both inputs to their common extent.
    Intersection,
}

/// Windows of each input that cover the same ground.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alignment {
    pub from: Window,
    pub to: Window,
}

/// Fail unless `from` and `to` describe the same grid.
pub fn ensure_aligned(from: &RasterGeometry, to: &RasterGeometry) -> Result<()> {
    if (from.cols, from.rows) != (to.cols, to.rows) {
        return Err(TransitionError::alignment(format!(
            "raster sizes differ: {}x{} vs {}x{}",
            from.cols, from.rows, to.cols, to.rows
        )));
    }
    match (from.transform, to.transform) {
        (None, None) => Ok(()),
        (Some(a), Some(b)) => {
            check_pixel_size(&a, &b)?;
            let (dx, dy) = origin_offset_px(&a, &b);
            if dx.abs() > ORIGIN_TOLERANCE_PX || dy.abs() > ORIGIN_TOLERANCE_PX {
                return Err(TransitionError::alignment(format!(
                    "origins differ by ({dx:.6}, {dy:.6}) pixels"
                )));
            }
            Ok(())
        }
        _ => Err(TransitionError::alignment(
            "only one raster is georeferenced",
        )),
    }
}

/// Work out which windows of each raster to compare.
pub fn resolve(from: &RasterGeometry, to: &RasterGeometry, mode: AlignMode) -> Result<Alignment> {
    match mode {
        AlignMode::Strict => {
            ensure_aligned(from, to)?;
            Ok(Alignment {
                from: from.full_window(),
                to: to.full_window(),
            })
        }
        AlignMode::Intersection => intersect(from, to),
    }
}

/// Common extent of two rasters on the same pixel lattice.
pub fn intersect(from: &RasterGeometry, to: &RasterGeometry) -> Result<Alignment> {
    // Position of `to`'s pixel (0, 0) on `from`'s grid.
    let (dx, dy) = match (from.transform, to.transform) {
        (None, None) => (0, 0),
        (Some(a), Some(b)) => {
            check_pixel_size(&a, &b)?;
            let (dx, dy) = origin_offset_px(&a, &b);
            if (dx - dx.round()).abs() > ORIGIN_TOLERANCE_PX
                || (dy - dy.round()).abs() > ORIGIN_TOLERANCE_PX
            {
                return Err(TransitionError::alignment(format!(
                    "grids are offset by a fraction of a pixel ({dx:.6}, {dy:.6}); resampling is not supported"
                )));
            }
            (dx.round() as i64, dy.round() as i64)
        }
        _ => {
            return Err(TransitionError::alignment(
                "only one raster is georeferenced",
            ))
        }
    };

    let (col_start, col_end) = overlap(from.cols, dx, to.cols);
    let (row_start, row_end) = overlap(from.rows, dy, to.rows);
    if col_end <= col_start || row_end <= row_start {
        return Err(TransitionError::alignment("rasters do not overlap"));
    }

    let cols = (col_end - col_start) as usize;
    let rows = (row_end - row_start) as usize;
    let alignment = Alignment {
        from: Window::new(col_start as usize, row_start as usize, cols, rows),
        to: Window::new((col_start - dx) as usize, (row_start - dy) as usize, cols, rows),
    };
    if alignment.from != from.full_window() || alignment.to != to.full_window() {
        tracing::info!(?alignment, "cropping inputs to their common extent");
    }
    Ok(alignment)
}

/// Overlap of [0, a_len) with [offset, offset + b_len) on one axis.
fn overlap(a_len: usize, offset: i64, b_len: usize) -> (i64, i64) {
    let start = offset.max(0);
    let end = (a_len as i64).min(offset + b_len as i64);
    (start, end)
}

fn check_pixel_size(a: &GeoTransform, b: &GeoTransform) -> Result<()> {
    let same = |x: f64, y: f64| (x - y).abs() <= PIXEL_SIZE_TOLERANCE * x.abs().max(y.abs());
    if !same(a.pixel_width, b.pixel_width) || !same(a.pixel_height, b.pixel_height) {
        return Err(TransitionError::alignment(format!(
            "pixel sizes differ: {}x{} vs {}x{}",
            a.pixel_width, a.pixel_height, b.pixel_width, b.pixel_height
        )));
    }
    Ok(())
}

/// Offset of `b`'s origin from `a`'s, in `a`'s pixels.
fn origin_offset_px(a: &GeoTransform, b: &GeoTransform) -> (f64, f64) {
    (
        (b.origin_x - a.origin_x) / a.pixel_width,
        (b.origin_y - a.origin_y) / a.pixel_height,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geo(cols: usize, rows: usize, x: f64, y: f64, px: f64) -> RasterGeometry {
        RasterGeometry::new(cols, rows, Some(GeoTransform::new(x, y, px, -px)))
    }

    #[test]
    fn identical_grids_align() {
        let g = geo(10, 5, 100.0, 200.0, 30.0);
        assert!(ensure_aligned(&g, &g).is_ok());
    }

    #[test]
    fn float_noise_in_origin_is_tolerated() {
        let a = geo(10, 5, 100.0, 200.0, 30.0);
        let b = geo(10, 5, 100.0 + 1e-9, 200.0, 30.0);
        assert!(ensure_aligned(&a, &b).is_ok());
    }

    #[test]
    fn size_pixel_and_origin_mismatches() {
        let a = geo(10, 5, 100.0, 200.0, 30.0);
        assert!(ensure_aligned(&a, &geo(10, 6, 100.0, 200.0, 30.0)).is_err());
        assert!(ensure_aligned(&a, &geo(10, 5, 100.0, 200.0, 10.0)).is_err());
        assert!(ensure_aligned(&a, &geo(10, 5, 130.0, 200.0, 30.0)).is_err());
        let bare = RasterGeometry::ungeoreferenced(10, 5);
        assert!(ensure_aligned(&a, &bare).is_err());
        assert!(ensure_aligned(&bare, &bare).is_ok());
    }

    #[test]
    fn intersection_crops_both_inputs() {
        // `to` starts 2 columns right of and 1 row below `from`.
        let from = geo(6, 4, 0.0, 40.0, 10.0);
        let to = geo(6, 4, 20.0, 30.0, 10.0);
        let alignment = intersect(&from, &to).unwrap();
        assert_eq!(alignment.from, Window::new(2, 1, 4, 3));
        assert_eq!(alignment.to, Window::new(0, 0, 4, 3));
    }

    #[test]
    fn intersection_when_to_starts_first() {
        let from = geo(4, 4, 20.0, 40.0, 10.0);
        let to = geo(8, 8, 0.0, 60.0, 10.0);
        let alignment = intersect(&from, &to).unwrap();
        assert_eq!(alignment.from, Window::new(0, 0, 4, 4));
        assert_eq!(alignment.to, Window::new(2, 2, 4, 4));
    }

    #[test]
    fn intersection_rejects_subpixel_shift() {
        let from = geo(4, 4, 0.0, 40.0, 10.0);
        let to = geo(4, 4, 5.0, 40.0, 10.0);
        assert!(matches!(
            intersect(&from, &to),
            Err(TransitionError::Alignment { .. })
        ));
    }

    #[test]
    fn intersection_rejects_disjoint_extents() {
        let from = geo(4, 4, 0.0, 40.0, 10.0);
        let to = geo(4, 4, 100.0, 40.0, 10.0);
        assert!(intersect(&from, &to).is_err());
    }

    #[test]
    fn ungeoreferenced_intersection_is_top_left() {
        let from = RasterGeometry::ungeoreferenced(5, 3);
        let to = RasterGeometry::ungeoreferenced(4, 6);
        let alignment = intersect(&from, &to).unwrap();
        assert_eq!(alignment.from, Window::new(0, 0, 4, 3));
        assert_eq!(alignment.to, Window::new(0, 0, 4, 3));
    }

    #[test]
    fn strict_resolve_returns_full_windows() {
        let g = geo(3, 2, 0.0, 0.0, 1.0);
        let alignment = resolve(&g, &g, AlignMode::Strict).unwrap();
        assert_eq!(alignment.from, g.full_window());
        assert_eq!(alignment.to, g.full_window());
    }

    #[test]
    fn align_mode_from_json() {
        let mode: AlignMode = serde_json::from_str("\"intersection\"").unwrap();
        assert_eq!(mode, AlignMode::Intersection);
    }
}
