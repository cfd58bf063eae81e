//! Streaming GeoTIFF access through the `tiff` crate.
//!
//! Georeferencing comes from ModelTransformationTag (34264) when present,
//! otherwise ModelPixelScaleTag (33550) + ModelTiepointTag (33922). The CRS is
//! read from the GeoKeyDirectoryTag (34735) as `EPSG:<code>`.
//!
//! Pixels are decoded one strip or tile at a time, only for the rows asked for,
//! under the decoder's default memory limits.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::{debug, info, warn};

use crate::raster::{GeoTransform, RasterSource};

const GEO_KEY_DIRECTORY_TAG: u16 = 34735;
const MODEL_TRANSFORMATION_TAG: u16 = 34264;
const GEOGRAPHIC_TYPE_GEO_KEY: u16 = 2048;
const PROJECTED_CS_TYPE_GEO_KEY: u16 = 3072;
const USER_DEFINED: u32 = 32767;

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("cannot open raster {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("tiff decode failed: {0}")]
    Decode(#[from] tiff::TiffError),
    #[error("unsupported sample format {0}; expected 8 or 16 bit unsigned")]
    UnsupportedSamples(&'static str),
    #[error("unsupported color layout {0}")]
    UnsupportedColor(String),
    #[error("chunk {index} holds {len} samples, expected {width}x{height}x{bands}")]
    Chunk { index: u32, len: usize, width: usize, height: usize, bands: usize },
    #[error("{count} rows from row {row} exceed a raster of height {height}")]
    Rows { row: usize, count: usize, height: usize },
}

pub struct GeoTiffReader<R: Read + Seek> {
    decoder: Decoder<R>,
    width: usize,
    height: usize,
    bands: usize,
    chunk_width: usize,
    chunk_height: usize,
    chunks_across: usize,
    transform: GeoTransform,
    crs: String,
}

impl GeoTiffReader<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, RasterError> {
        let file = File::open(path).map_err(|source| RasterError::Open { path: path.to_path_buf(), source })?;
        let reader = Self::new(BufReader::new(file))?;
        info!(
            "raster: {} ({}x{}, {} band(s), {}x{} chunks, crs={})",
            path.display(), reader.width, reader.height, reader.bands,
            reader.chunk_width, reader.chunk_height,
            if reader.crs.is_empty() { "?" } else { &reader.crs }
        );
        Ok(reader)
    }
}

impl<R: Read + Seek> GeoTiffReader<R> {
    pub fn new(source: R) -> Result<Self, RasterError> {
        let mut decoder = Decoder::new(source)?;
        let (w, h) = decoder.dimensions()?;
        let bands = bands_of(decoder.colortype()?)?;
        let transform = read_transform(&mut decoder);
        let crs = read_crs(&mut decoder);

        let (cw, ch) = decoder.chunk_dimensions();
        let (chunk_width, chunk_height) = (cw.max(1) as usize, ch.max(1) as usize);
        let width = w as usize;
        Ok(Self {
            decoder,
            width,
            height: h as usize,
            bands,
            chunk_width,
            chunk_height,
            chunks_across: width.div_ceil(chunk_width),
            transform,
            crs,
        })
    }

    /// Decodes one chunk and copies the part that falls in `row..row + count`
    /// into `out`, a full-width buffer starting at `row`.
    fn copy_chunk(&mut self, index: usize, row: usize, count: usize, out: &mut [u8]) -> Result<(), RasterError> {
        let idx = index as u32;
        let (dw, dh) = self.decoder.chunk_data_dimensions(idx);
        let (dw, dh) = (dw as usize, dh as usize);
        let samples = to_u8(self.decoder.read_chunk(idx)?)?;

        // edge tiles may come back padded to the full chunk width
        let src_width = if dh == 0 { 0 } else { samples.len() / (dh * self.bands) };
        if src_width < dw || samples.len() < src_width * dh * self.bands {
            return Err(RasterError::Chunk { index: idx, len: samples.len(), width: dw, height: dh, bands: self.bands });
        }

        let x0 = (index % self.chunks_across) * self.chunk_width;
        let y0 = (index / self.chunks_across) * self.chunk_height;
        let span = dw * self.bands;
        for r in 0..dh {
            let y = y0 + r;
            if y < row || y >= row + count {
                continue;
            }
            let src = r * src_width * self.bands;
            let dst = ((y - row) * self.width + x0) * self.bands;
            out[dst..dst + span].copy_from_slice(&samples[src..src + span]);
        }
        Ok(())
    }
}

impl<R: Read + Seek> RasterSource for GeoTiffReader<R> {
    fn width(&self) -> usize { self.width }
    fn height(&self) -> usize { self.height }
    fn bands(&self) -> usize { self.bands }
    fn transform(&self) -> &GeoTransform { &self.transform }
    fn crs(&self) -> &str { &self.crs }

    fn read_rows(&mut self, row: usize, count: usize) -> Result<Vec<u8>, RasterError> {
        if row + count > self.height {
            return Err(RasterError::Rows { row, count, height: self.height });
        }
        let mut out = vec![0u8; self.width * count * self.bands];
        if count == 0 {
            return Ok(out);
        }
        let first = row / self.chunk_height;
        let last = (row + count - 1) / self.chunk_height;
        for cy in first..=last {
            for cx in 0..self.chunks_across {
                self.copy_chunk(cy * self.chunks_across + cx, row, count, &mut out)?;
            }
        }
        debug!("geotiff: rows {}..{} from chunk rows {}..={}", row, row + count, first, last);
        Ok(out)
    }
}

fn bands_of(color: ColorType) -> Result<usize, RasterError> {
    match color {
        ColorType::Gray(_) => Ok(1),
        ColorType::GrayA(_) => Ok(2),
        ColorType::RGB(_) => Ok(3),
        ColorType::RGBA(_) => Ok(4),
        ColorType::Multiband { num_samples, .. } => Ok(num_samples as usize),
        other => Err(RasterError::UnsupportedColor(format!("{:?}", other))),
    }
}

fn to_u8(result: DecodingResult) -> Result<Vec<u8>, RasterError> {
    match result {
        DecodingResult::U8(v) => Ok(v),
        DecodingResult::U16(v) => Ok(v.into_iter().map(|s| (s >> 8) as u8).collect()),
        DecodingResult::U32(_) => Err(RasterError::UnsupportedSamples("u32")),
        DecodingResult::U64(_) => Err(RasterError::UnsupportedSamples("u64")),
        DecodingResult::F32(_) => Err(RasterError::UnsupportedSamples("f32")),
        DecodingResult::F64(_) => Err(RasterError::UnsupportedSamples("f64")),
        _ => Err(RasterError::UnsupportedSamples("signed")),
    }
}

fn read_transform<R: Read + Seek>(decoder: &mut Decoder<R>) -> GeoTransform {
    if let Some(m) = f64_tag(decoder, Tag::from_u16_exhaustive(MODEL_TRANSFORMATION_TAG)) {
        if let Ok(m) = <[f64; 16]>::try_from(m.as_slice()) {
            debug!("geotiff: using ModelTransformation");
            return GeoTransform::from_model_matrix(&m);
        }
    }

    let scale = f64_tag(decoder, Tag::ModelPixelScaleTag).filter(|s| s.len() >= 2);
    let tie = f64_tag(decoder, Tag::ModelTiepointTag).filter(|t| t.len() >= 6);
    match (scale, tie) {
        (Some(s), Some(t)) => GeoTransform::from_scale_tiepoint([s[0], s[1]], [t[0], t[1], t[2], t[3], t[4], t[5]]),
        _ => {
            warn!("geotiff: no georeferencing tags, tiles will be in pixel space");
            GeoTransform::identity()
        }
    }
}

fn read_crs<R: Read + Seek>(decoder: &mut Decoder<R>) -> String {
    let keys = match decoder.find_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY_TAG)) {
        Ok(Some(v)) => v.into_u32_vec().unwrap_or_default(),
        _ => Vec::new(),
    };
    match epsg_from_geokeys(&keys) {
        Some(code) => format!("EPSG:{}", code),
        None => {
            warn!("geotiff: CRS not found in GeoKeyDirectory");
            String::new()
        }
    }
}

fn f64_tag<R: Read + Seek>(decoder: &mut Decoder<R>, tag: Tag) -> Option<Vec<f64>> {
    match decoder.find_tag(tag) {
        Ok(Some(v)) => v.into_f64_vec().ok(),
        _ => None,
    }
}

/// GeoKeyDirectory layout: 4-value header (.., .., .., key count) followed by
/// (key id, tag location, count, value) entries. Only inline values are read.
pub(crate) fn epsg_from_geokeys(keys: &[u32]) -> Option<u32> {
    if keys.len() < 4 {
        return None;
    }
    let n = keys[3] as usize;
    let entries: Vec<&[u32]> = keys[4..].chunks_exact(4).take(n).collect();
    let lookup = |id: u16| {
        entries
            .iter()
            .find(|e| e[0] == id as u32 && e[1] == 0)
            .map(|e| e[3])
            .filter(|&code| code != 0 && code != USER_DEFINED)
    };
    lookup(PROJECTED_CS_TYPE_GEO_KEY).or_else(|| lookup(GEOGRAPHIC_TYPE_GEO_KEY))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tiff::encoder::{colortype, TiffEncoder};

    /// 5x7 grayscale, two rows per strip, sample = row * 10 + col.
    fn striped_gray() -> Vec<u8> {
        let data: Vec<u8> = (0..7u8).flat_map(|r| (0..5u8).map(move |c| r * 10 + c)).collect();
        let mut buf = Cursor::new(Vec::new());
        {
            let mut enc = TiffEncoder::new(&mut buf).unwrap();
            let mut img = enc.new_image::<colortype::Gray8>(5, 7).unwrap();
            img.rows_per_strip(2).unwrap();
            img.write_data(&data).unwrap();
        }
        buf.into_inner()
    }

    #[test]
    fn rows_span_several_strips() {
        let mut reader = GeoTiffReader::new(Cursor::new(striped_gray())).unwrap();
        assert_eq!((reader.width(), reader.height(), reader.bands()), (5, 7, 1));
        assert_eq!(reader.chunk_height, 2);
        assert_eq!(
            reader.read_rows(3, 3).unwrap(),
            vec![30, 31, 32, 33, 34, 40, 41, 42, 43, 44, 50, 51, 52, 53, 54]
        );
        // last strip holds a single row
        assert_eq!(reader.read_rows(6, 1).unwrap(), vec![60, 61, 62, 63, 64]);
        assert!(matches!(reader.read_rows(5, 3), Err(RasterError::Rows { .. })));
    }

    #[test]
    fn missing_tags_fall_back_to_pixel_space() {
        let reader = GeoTiffReader::new(Cursor::new(striped_gray())).unwrap();
        assert_eq!(reader.crs(), "");
        assert_eq!(reader.transform(), &GeoTransform::identity());
    }

    #[test]
    fn projected_key_wins_over_geographic() {
        let keys = [1, 1, 0, 3, 1024, 0, 1, 1, 2048, 0, 1, 4326, 3072, 0, 1, 31982];
        assert_eq!(epsg_from_geokeys(&keys), Some(31982));
    }

    #[test]
    fn geographic_only() {
        let keys = [1, 1, 0, 2, 1024, 0, 1, 2, 2048, 0, 1, 4674];
        assert_eq!(epsg_from_geokeys(&keys), Some(4674));
    }

    #[test]
    fn user_defined_and_truncated_directories() {
        assert_eq!(epsg_from_geokeys(&[1, 1, 0, 1, 3072, 0, 1, 32767]), None);
        assert_eq!(epsg_from_geokeys(&[1, 1, 0]), None);
        // key count larger than the entries present
        assert_eq!(epsg_from_geokeys(&[1, 1, 0, 5, 3072, 0, 1, 32723]), Some(32723));
    }
}
