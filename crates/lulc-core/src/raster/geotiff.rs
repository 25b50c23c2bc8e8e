//! Streaming GeoTIFF access on top of the pure-Rust `tiff` crate.
//!
//! Reading decodes one chunk row (a strip, or a row of tiles) at a time and
//! keeps only that band cached. Writing emits one strip per block, so blocks
//! have to arrive top to bottom as full-width bands.
//!
//! Georeferencing is limited to what a north-up grid needs: ModelPixelScale +
//! ModelTiepoint for the transform, GDAL_NODATA for the sentinel. The GeoKey
//! tags are carried through opaquely so outputs keep the input's CRS.

use std::fs::File;
use std::io::{BufReader, Read, Seek, Write};
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::GrayI32;
use tiff::encoder::{DirectoryEncoder, ImageEncoder, TiffEncoder, TiffKindStandard};
use tiff::tags::Tag;
use tiff::{ColorType, TiffError, TiffResult};

use crate::error::{Result, TransitionError};
use crate::nodata;

use super::{Block, BlockSink, BlockSource, GeoTransform, RasterGeometry, Window};

// ── Tag ids (not named by the tiff crate) ────────────────────────────────────

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const MODEL_TRANSFORMATION: u16 = 34264;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GEO_DOUBLE_PARAMS: u16 = 34736;
const GEO_ASCII_PARAMS: u16 = 34737;
const GDAL_NODATA: u16 = 42113;

/// Raw GeoKey tags, copied verbatim from an input to an output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoKeys {
    pub directory: Option<Vec<u16>>,
    pub doubles: Option<Vec<f64>>,
    pub ascii: Option<String>,
}

/// Geometry and georeferencing an output raster is created from.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterTemplate {
    pub geometry: RasterGeometry,
    pub geokeys: GeoKeys,
}

// ── Reader ───────────────────────────────────────────────────────────────────

/// Decoded full-width rows of one chunk row.
struct DecodedBand {
    chunk_row: usize,
    row_start: usize,
    values: Vec<f64>,
}

/// Single-band GeoTIFF opened for windowed reads.
pub struct GeoTiffReader<R: Read + Seek = BufReader<File>> {
    path: PathBuf,
    decoder: Decoder<R>,
    geometry: RasterGeometry,
    nodata: Option<f64>,
    geokeys: GeoKeys,
    chunk_width: usize,
    chunk_height: usize,
    chunks_across: usize,
    band: Option<DecodedBand>,
}

impl GeoTiffReader<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| TransitionError::io(path, e))?;
        Self::from_reader(BufReader::new(file), path)
    }
}

impl<R: Read + Seek> GeoTiffReader<R> {
    /// Decode the header of a TIFF held by `reader`; `path` is only used in
    /// error messages.
    pub fn from_reader(reader: R, path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tiff_err = |e: TiffError| TransitionError::tiff(path.clone(), e);

        let mut decoder = Decoder::new(reader).map_err(tiff_err)?;
        let (width, height) = decoder.dimensions().map_err(tiff_err)?;
        match decoder.colortype().map_err(tiff_err)? {
            ColorType::Gray(_) => {}
            other => {
                return Err(TransitionError::unsupported(
                    &path,
                    format!("expected a single-band raster, found {other:?}"),
                ))
            }
        }

        let transform = read_transform(&mut decoder, &path)?;
        let nodata = read_nodata(&mut decoder, &path)?;
        let geokeys = read_geokeys(&mut decoder).map_err(tiff_err)?;

        let geometry = RasterGeometry::new(width as usize, height as usize, transform);
        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        let chunk_width = (chunk_width as usize).max(1);
        let chunk_height = (chunk_height as usize).max(1);
        let chunks_across = geometry.cols.div_ceil(chunk_width);

        tracing::debug!(
            path = %path.display(),
            cols = geometry.cols,
            rows = geometry.rows,
            chunk_width,
            chunk_height,
            ?nodata,
            "opened raster"
        );

        Ok(Self {
            path,
            decoder,
            geometry,
            nodata,
            geokeys,
            chunk_width,
            chunk_height,
            chunks_across,
            band: None,
        })
    }

    pub fn geokeys(&self) -> &GeoKeys {
        &self.geokeys
    }

    /// Replace the nodata sentinel read from the file.
    pub fn set_nodata(&mut self, nodata: Option<f64>) {
        self.nodata = nodata;
    }

    /// Template for an output on this raster's grid.
    pub fn template(&self) -> RasterTemplate {
        RasterTemplate {
            geometry: self.geometry,
            geokeys: self.geokeys.clone(),
        }
    }

    fn band_for_row(&mut self, row: usize) -> Result<&DecodedBand> {
        let chunk_row = row / self.chunk_height;
        let band = match self.band.take() {
            Some(band) if band.chunk_row == chunk_row => band,
            _ => self.decode_band(chunk_row)?,
        };
        Ok(&*self.band.insert(band))
    }

    fn decode_band(&mut self, chunk_row: usize) -> Result<DecodedBand> {
        let cols = self.geometry.cols;
        let row_start = chunk_row * self.chunk_height;
        let rows = self.chunk_height.min(self.geometry.rows - row_start);
        let mut values = vec![0.0; cols * rows];

        for chunk_col in 0..self.chunks_across {
            let index = u32::try_from(chunk_row * self.chunks_across + chunk_col).map_err(|_| {
                TransitionError::unsupported(&self.path, "chunk index exceeds u32")
            })?;
            let (w, h) = self.decoder.chunk_data_dimensions(index);
            let (w, h) = (w as usize, h as usize);
            let decoded = self
                .decoder
                .read_chunk(index)
                .map_err(|e| TransitionError::tiff(self.path.clone(), e))?;
            let chunk = widen(decoded);

            let col_start = chunk_col * self.chunk_width;
            if h > rows || col_start + w > cols || chunk.len() < w * h {
                return Err(TransitionError::unsupported(
                    &self.path,
                    format!("chunk {index} is {w}x{h}, does not fit the grid"),
                ));
            }
            for (r, src) in chunk.chunks_exact(w.max(1)).take(h).enumerate() {
                let dst = r * cols + col_start;
                values[dst..dst + w].copy_from_slice(src);
            }
        }

        tracing::trace!(chunk_row, row_start, rows, "decoded band");
        Ok(DecodedBand {
            chunk_row,
            row_start,
            values,
        })
    }
}

impl<R: Read + Seek> BlockSource for GeoTiffReader<R> {
    fn geometry(&self) -> RasterGeometry {
        self.geometry
    }

    fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    fn natural_block_rows(&self) -> usize {
        self.chunk_height.min(self.geometry.rows).max(1)
    }

    fn read_window(&mut self, window: Window) -> Result<Block> {
        if !self.geometry.contains(&window) {
            return Err(TransitionError::InvalidArgument(format!(
                "window {window:?} outside {}x{} raster {}",
                self.geometry.cols,
                self.geometry.rows,
                self.path.display()
            )));
        }
        let cols = self.geometry.cols;
        let mut values = Vec::with_capacity(window.len());
        for row in window.row_off..window.row_off + window.rows {
            let band = self.band_for_row(row)?;
            let start = (row - band.row_start) * cols + window.col_off;
            values.extend_from_slice(&band.values[start..start + window.cols]);
        }
        Ok(Block::new(window, values))
    }
}

/// Widen any integer or float sample buffer to f64.
fn widen(decoded: DecodingResult) -> Vec<f64> {
    match decoded {
        DecodingResult::U8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::I8(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I16(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|x| x as f64).collect(),
        DecodingResult::F32(v) => v.into_iter().map(f64::from).collect(),
        DecodingResult::F64(v) => v,
    }
}

fn find_f64s<R: Read + Seek>(decoder: &mut Decoder<R>, code: u16) -> TiffResult<Option<Vec<f64>>> {
    decoder
        .find_tag(Tag::from_u16_exhaustive(code))?
        .map(|v| v.into_f64_vec())
        .transpose()
}

fn find_string<R: Read + Seek>(decoder: &mut Decoder<R>, code: u16) -> TiffResult<Option<String>> {
    decoder
        .find_tag(Tag::from_u16_exhaustive(code))?
        .map(|v| v.into_string())
        .transpose()
        .map(|s| s.map(|s| s.trim_end_matches('\0').to_string()))
}

fn read_transform<R: Read + Seek>(
    decoder: &mut Decoder<R>,
    path: &Path,
) -> Result<Option<GeoTransform>> {
    let tiff_err = |e: TiffError| TransitionError::tiff(path, e);
    let scale = find_f64s(decoder, MODEL_PIXEL_SCALE).map_err(tiff_err)?;
    let tiepoint = find_f64s(decoder, MODEL_TIEPOINT).map_err(tiff_err)?;

    if let (Some(scale), Some(tp)) = (scale, tiepoint) {
        if scale.len() >= 2 && tp.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z]
            let origin_x = tp[3] - tp[0] * scale[0];
            let origin_y = tp[4] + tp[1] * scale[1];
            return Ok(Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1])));
        }
    }

    if let Some(m) = find_f64s(decoder, MODEL_TRANSFORMATION).map_err(tiff_err)? {
        if m.len() >= 8 {
            if m[1] != 0.0 || m[4] != 0.0 {
                return Err(TransitionError::unsupported(path, "rotated rasters"));
            }
            return Ok(Some(GeoTransform::new(m[3], m[7], m[0], m[5])));
        }
    }

    Ok(None)
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>, path: &Path) -> Result<Option<f64>> {
    let Some(text) =
        find_string(decoder, GDAL_NODATA).map_err(|e| TransitionError::tiff(path, e))?
    else {
        return Ok(None);
    };
    nodata::parse_value(&text).map(Some).map_err(|_| {
        TransitionError::unsupported(path, format!("unparseable GDAL_NODATA {text:?}"))
    })
}

fn read_geokeys<R: Read + Seek>(decoder: &mut Decoder<R>) -> TiffResult<GeoKeys> {
    let directory = decoder
        .find_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))?
        .map(|v| v.into_u32_vec())
        .transpose()?
        .and_then(|v| v.into_iter().map(|x| u16::try_from(x).ok()).collect());
    Ok(GeoKeys {
        directory,
        doubles: find_f64s(decoder, GEO_DOUBLE_PARAMS)?,
        ascii: find_string(decoder, GEO_ASCII_PARAMS)?,
    })
}

// ── Writer ───────────────────────────────────────────────────────────────────

/// Block sink writing i32 transition codes as consecutive TIFF strips.
pub struct CodeRasterWriter<'a, W: Write + Seek> {
    path: PathBuf,
    image: ImageEncoder<'a, W, GrayI32, TiffKindStandard>,
    geometry: RasterGeometry,
    block_rows: usize,
    next_row: usize,
}

impl<W: Write + Seek> CodeRasterWriter<'_, W> {
    fn expected_window(&self) -> Window {
        let rows = self.block_rows.min(self.geometry.rows - self.next_row);
        Window::new(0, self.next_row, self.geometry.cols, rows)
    }
}

impl<W: Write + Seek> BlockSink for CodeRasterWriter<'_, W> {
    fn write_block(&mut self, window: Window, codes: &[i32]) -> Result<()> {
        let expected = self.expected_window();
        if self.next_row >= self.geometry.rows || window != expected || codes.len() != window.len()
        {
            return Err(TransitionError::GeometryMismatch {
                window,
                from_shape: (window.cols, window.rows),
                to_shape: (expected.cols, expected.rows),
            });
        }
        self.image
            .write_strip(codes)
            .map_err(|e| TransitionError::tiff(self.path.clone(), e))?;
        self.next_row += window.rows;
        Ok(())
    }
}

/// Create an i32 code raster on `template`'s grid, hand a sink for it to
/// `body`, and finalise the file once `body` succeeds.
///
/// `body` must write the grid as consecutive full-width bands of
/// `block_rows` rows; a short or out-of-order write fails the whole raster.
pub fn write_code_raster<W, T, F>(
    writer: W,
    path: impl Into<PathBuf>,
    template: &RasterTemplate,
    nodata_code: i32,
    block_rows: usize,
    body: F,
) -> Result<T>
where
    W: Write + Seek,
    F: FnOnce(&mut CodeRasterWriter<'_, W>) -> Result<T>,
{
    let path = path.into();
    let tiff_err = |e: TiffError| TransitionError::tiff(path.clone(), e);
    let geometry = template.geometry;
    let block_rows = block_rows.max(1);
    let to_u32 = |n: usize, what: &str| {
        u32::try_from(n).map_err(|_| TransitionError::unsupported(&path, format!("{what} exceeds u32")))
    };
    let width = to_u32(geometry.cols, "width")?;
    let height = to_u32(geometry.rows, "height")?;
    let strip_rows = to_u32(block_rows, "block rows")?;

    let mut encoder = TiffEncoder::new(writer).map_err(tiff_err)?;
    let mut image = encoder
        .new_image::<GrayI32>(width, height)
        .map_err(tiff_err)?;
    image.rows_per_strip(strip_rows).map_err(tiff_err)?;
    write_geo_tags(image.encoder(), template, nodata_code).map_err(tiff_err)?;

    let mut sink = CodeRasterWriter {
        path: path.clone(),
        image,
        geometry,
        block_rows,
        next_row: 0,
    };
    let out = body(&mut sink)?;

    if sink.next_row != geometry.rows {
        return Err(TransitionError::GeometryMismatch {
            window: Window::new(0, sink.next_row, geometry.cols, geometry.rows - sink.next_row),
            from_shape: (geometry.cols, sink.next_row),
            to_shape: (geometry.cols, geometry.rows),
        });
    }
    sink.image.finish().map_err(tiff_err)?;
    Ok(out)
}

fn write_geo_tags<W: Write + Seek>(
    dir: &mut DirectoryEncoder<'_, W, TiffKindStandard>,
    template: &RasterTemplate,
    nodata_code: i32,
) -> TiffResult<()> {
    if let Some(t) = template.geometry.transform {
        let scale = [t.pixel_width, -t.pixel_height, 0.0];
        dir.write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), &scale[..])?;
        let tiepoint = [0.0, 0.0, 0.0, t.origin_x, t.origin_y, 0.0];
        dir.write_tag(Tag::Unknown(MODEL_TIEPOINT), &tiepoint[..])?;
    }
    let keys = &template.geokeys;
    if let Some(directory) = &keys.directory {
        dir.write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), directory.as_slice())?;
    }
    if let Some(doubles) = &keys.doubles {
        dir.write_tag(Tag::Unknown(GEO_DOUBLE_PARAMS), doubles.as_slice())?;
    }
    if let Some(ascii) = &keys.ascii {
        dir.write_tag(Tag::Unknown(GEO_ASCII_PARAMS), ascii.as_str())?;
    }
    let nodata = nodata_code.to_string();
    dir.write_tag(Tag::Unknown(GDAL_NODATA), nodata.as_str())?;
    Ok(())
}
