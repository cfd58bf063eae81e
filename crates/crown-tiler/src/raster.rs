//! 8-bit rasters with an affine pixel → CRS transform, read row band by row band.

use geo::{coord, Rect};

use crate::geotiff::RasterError;

/// Affine transform, rasterio/GDAL convention:
///   x = a*col + b*row + c
///   y = d*col + e*row + f
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl GeoTransform {
    /// Pixel space, y growing downward. Used when the file carries no georeferencing.
    pub fn identity() -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 0.0, e: 1.0, f: 0.0 }
    }

    /// North-up transform from a pixel scale and a single tiepoint.
    /// `tiepoint` is (i, j, k, x, y, z): raster point (i, j) sits at world (x, y).
    pub fn from_scale_tiepoint(scale: [f64; 2], tiepoint: [f64; 6]) -> Self {
        let (sx, sy) = (scale[0], scale[1]);
        let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
        Self { a: sx, b: 0.0, c: x - i * sx, d: 0.0, e: -sy, f: y + j * sy }
    }

    /// From a row-major 4x4 ModelTransformation matrix.
    pub fn from_model_matrix(m: &[f64; 16]) -> Self {
        Self { a: m[0], b: m[1], c: m[3], d: m[4], e: m[5], f: m[7] }
    }

    pub fn apply(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.a * col + self.b * row + self.c,
            self.d * col + self.e * row + self.f,
        )
    }

    /// Projected bounds of a pixel window. Min/max over all four corners so
    /// flipped or rotated transforms still give an ordered box.
    pub fn window_bounds(&self, col: usize, row: usize, width: usize, height: usize) -> Rect<f64> {
        let (c0, r0) = (col as f64, row as f64);
        let (c1, r1) = ((col + width) as f64, (row + height) as f64);
        let corners = [self.apply(c0, r0), self.apply(c1, r0), self.apply(c0, r1), self.apply(c1, r1)];

        let mut min = (f64::INFINITY, f64::INFINITY);
        let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for (x, y) in corners {
            min = (min.0.min(x), min.1.min(y));
            max = (max.0.max(x), max.1.max(y));
        }
        Rect::new(coord! { x: min.0, y: min.1 }, coord! { x: max.0, y: max.1 })
    }
}

/// Row-wise access to a georeferenced raster. Tiling pulls one band of rows
/// per grid row, so a source never has to hold the whole image.
pub trait RasterSource {
    fn width(&self) -> usize;
    fn height(&self) -> usize;
    fn bands(&self) -> usize;
    fn transform(&self) -> &GeoTransform;
    fn crs(&self) -> &str;

    /// Full-width samples of rows `row..row + count`, band-interleaved.
    fn read_rows(&mut self, row: usize, count: usize) -> Result<Vec<u8>, RasterError>;

    fn extent(&self) -> Rect<f64> {
        self.transform().window_bounds(0, 0, self.width(), self.height())
    }

    fn center(&self) -> (f64, f64) {
        let c = self.extent().center();
        (c.x, c.y)
    }
}

/// Copies a window out of a band-interleaved buffer that is `data_width`
/// pixels wide.
pub fn window_samples(
    data: &[u8],
    data_width: usize,
    bands: usize,
    col: usize,
    row: usize,
    width: usize,
    height: usize,
) -> Vec<u8> {
    let stride = data_width * bands;
    let span = width * bands;
    let mut out = Vec::with_capacity(span * height);
    for r in row..row + height {
        let start = r * stride + col * bands;
        out.extend_from_slice(&data[start..start + span]);
    }
    out
}

/// Fully loaded raster. Sample (row, col, band) lives at
/// `(row * width + col) * bands + band`.
#[derive(Debug, Clone)]
pub struct Raster {
    pub width: usize,
    pub height: usize,
    pub bands: usize,
    pub data: Vec<u8>,
    pub transform: GeoTransform,
    pub crs: String,
}

impl Raster {
    pub fn new(width: usize, height: usize, bands: usize, data: Vec<u8>) -> Self {
        assert_eq!(data.len(), width * height * bands, "raster buffer does not match its shape");
        Self { width, height, bands, data, transform: GeoTransform::identity(), crs: String::new() }
    }

    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_crs(mut self, crs: impl Into<String>) -> Self {
        self.crs = crs.into();
        self
    }

    pub fn window(&self, col: usize, row: usize, width: usize, height: usize) -> Vec<u8> {
        window_samples(&self.data, self.width, self.bands, col, row, width, height)
    }
}

impl RasterSource for Raster {
    fn width(&self) -> usize { self.width }
    fn height(&self) -> usize { self.height }
    fn bands(&self) -> usize { self.bands }
    fn transform(&self) -> &GeoTransform { &self.transform }
    fn crs(&self) -> &str { &self.crs }

    fn read_rows(&mut self, row: usize, count: usize) -> Result<Vec<u8>, RasterError> {
        if row + count > self.height {
            return Err(RasterError::Rows { row, count, height: self.height });
        }
        let stride = self.width * self.bands;
        Ok(self.data[row * stride..(row + count) * stride].to_vec())
    }
}
