pub mod doctor;
pub mod geotiff;
pub mod grid;
pub mod manifest;
pub mod presets;
pub mod raster;
pub mod sample;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crown_proto::{Tile, TileManifest};
use geo::Rect;
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use tracing::{debug, info};

pub use geotiff::{GeoTiffReader, RasterError};
pub use grid::{plan_grid, Window};
pub use raster::{GeoTransform, Raster, RasterSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingParams {
    pub tile_size: usize,
    pub overlap: usize,
}

#[derive(Debug, Clone)]
pub struct TilingOutput {
    pub tiles: Vec<Tile>,
    pub crs: String,
    /// Projected extent of the whole source raster.
    pub extent: Rect<f64>,
    /// Grid cells visited, including the empty ones.
    pub cells: usize,
    pub skipped_empty: usize,
}

impl TilingOutput {
    pub fn count(&self) -> usize { self.tiles.len() }

    pub fn center(&self) -> (f64, f64) {
        let c = self.extent.center();
        (c.x, c.y)
    }

    /// Manifest of the emitted tiles, without a round trip through disk.
    pub fn manifest(&self) -> TileManifest {
        TileManifest::from_rows(self.tiles.iter().map(Tile::manifest_row).collect())
    }
}

/// Cuts `src` into overlapping tiles and writes them as `tile_<n>.jpg` under
/// `out_dir`. All-zero cells produce no file and do not consume a number.
/// Only one grid row of source pixels is held at a time.
pub fn tile_raster<S: RasterSource>(src: &mut S, params: &TilingParams, out_dir: &Path) -> Result<TilingOutput> {
    anyhow::ensure!(
        params.overlap < params.tile_size,
        "overlap ({}) must be smaller than tile size ({})", params.overlap, params.tile_size
    );
    fs::create_dir_all(out_dir).with_context(|| format!("create tile dir {}", out_dir.display()))?;

    let (width, bands) = (src.width(), src.bands());
    let grid = plan_grid(width, src.height(), params.tile_size, params.overlap);
    let mut tiles = Vec::new();
    let mut cells = 0;
    let mut skipped_empty = 0;

    for grid_row in &grid {
        let Some(first) = grid_row.first() else { continue };
        let strip = src
            .read_rows(first.row, first.height)
            .with_context(|| format!("read raster rows {}..{}", first.row, first.row + first.height))?;

        for w in grid_row {
            cells += 1;
            let pixels = raster::window_samples(&strip, width, bands, w.col, 0, w.width, w.height);
            if pixels.iter().all(|&v| v == 0) {
                skipped_empty += 1;
                continue;
            }

            let filename = format!("tile_{}.jpg", tiles.len());
            let path = out_dir.join(&filename);
            let img = tile_image(&pixels, w.width as u32, w.height as u32, bands)?;
            img.save_with_format(&path, ImageFormat::Jpeg)
                .with_context(|| format!("write tile {}", path.display()))?;

            debug!("tile: {} at col={} row={} ({}x{})", filename, w.col, w.row, w.width, w.height);
            tiles.push(Tile {
                filename,
                row: w.row,
                col: w.col,
                width: w.width,
                height: w.height,
                bounds: src.transform().window_bounds(w.col, w.row, w.width, w.height),
                crs: src.crs().to_string(),
            });
        }
    }

    info!("tiling: {} tile(s) from {} cell(s), {} empty skipped", tiles.len(), cells, skipped_empty);
    Ok(TilingOutput { tiles, crs: src.crs().to_string(), extent: src.extent(), cells, skipped_empty })
}

/// Where a tiling run puts its artifacts.
#[derive(Debug, Clone)]
pub struct TilingLayout {
    pub tiles_dir: PathBuf,
    pub manifest_path: PathBuf,
}

/// Streams a GeoTIFF into tiles and writes the manifest. The manifest only
/// lands once every tile has been written.
pub fn tile_geotiff(raster_path: &Path, params: &TilingParams, layout: &TilingLayout) -> Result<TilingOutput> {
    let mut reader = GeoTiffReader::open(raster_path).with_context(|| format!("open raster {}", raster_path.display()))?;
    let out = tile_raster(&mut reader, params, &layout.tiles_dir)?;
    manifest::write_manifest(&out.tiles, &layout.manifest_path)?;
    Ok(out)
}

/// Band handling: 1 band gray, 2 bands keep the first as gray, 3 bands RGB,
/// 4+ bands keep the first three (alpha and extras dropped).
fn tile_image(pixels: &[u8], width: u32, height: u32, bands: usize) -> Result<DynamicImage> {
    let img = match bands {
        1 => GrayImage::from_raw(width, height, pixels.to_vec()).map(DynamicImage::ImageLuma8),
        2 => {
            let gray = pixels.chunks_exact(2).map(|px| px[0]).collect();
            GrayImage::from_raw(width, height, gray).map(DynamicImage::ImageLuma8)
        }
        3 => RgbImage::from_raw(width, height, pixels.to_vec()).map(DynamicImage::ImageRgb8),
        n => {
            let rgb = pixels.chunks_exact(n).flat_map(|px| [px[0], px[1], px[2]]).collect();
            RgbImage::from_raw(width, height, rgb).map(DynamicImage::ImageRgb8)
        }
    };
    img.context("tile buffer does not match its dimensions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    /// 40x30 RGBA raster, 0.5 m pixels anchored at (500000, 7000000), with the
    /// right-hand strip (col >= 32) left at zero.
    fn ortho() -> Raster {
        let (w, h) = (40, 30);
        let mut data = vec![0u8; w * h * 4];
        for r in 0..h {
            for c in 0..32 {
                let i = (r * w + c) * 4;
                data[i..i + 4].copy_from_slice(&[90, 140, 60, 255]);
            }
        }
        Raster::new(w, h, 4, data)
            .with_transform(GeoTransform::from_scale_tiepoint([0.5, 0.5], [0.0, 0.0, 0.0, 500_000.0, 7_000_000.0, 0.0]))
            .with_crs("EPSG:31982")
    }

    #[test]
    fn skips_empty_cells_and_numbers_densely() {
        let dir = tempfile::tempdir().unwrap();
        let out = tile_raster(&mut ortho(), &TilingParams { tile_size: 16, overlap: 4 }, dir.path()).unwrap();

        // cols 0,12,24,36 x rows 0,12,24; col 36 is all zero
        assert_eq!(out.cells, 12);
        assert_eq!(out.skipped_empty, 3);
        assert_eq!(out.count(), 9);
        for (n, t) in out.tiles.iter().enumerate() {
            assert_eq!(t.filename, format!("tile_{}.jpg", n));
            assert!(dir.path().join(&t.filename).exists());
            assert_eq!(t.crs, "EPSG:31982");
        }
    }

    #[test]
    fn rgba_tiles_are_written_as_rgb() {
        let dir = tempfile::tempdir().unwrap();
        let out = tile_raster(&mut ortho(), &TilingParams { tile_size: 16, overlap: 4 }, dir.path()).unwrap();
        let img = image::open(dir.path().join(&out.tiles[0].filename)).unwrap();
        assert_eq!(img.color(), image::ColorType::Rgb8);
        assert_eq!(img.dimensions(), (16, 16));

        // clipped last row
        let last = out.tiles.last().unwrap();
        assert_eq!((last.row, last.height), (24, 6));
    }

    #[test]
    fn tile_bounds_follow_transform_and_cover_extent() {
        let dir = tempfile::tempdir().unwrap();
        let mut raster = ortho();
        let out = tile_raster(&mut raster, &TilingParams { tile_size: 16, overlap: 4 }, dir.path()).unwrap();

        let first = &out.tiles[0];
        assert_eq!((first.bounds.min().x, first.bounds.max().y), (500_000.0, 7_000_000.0));
        assert_eq!((first.bounds.max().x, first.bounds.min().y), (500_008.0, 6_999_992.0));

        for t in &out.tiles {
            assert_eq!(t.bounds, raster.transform.window_bounds(t.col, t.row, t.width, t.height));
        }

        // non-empty part of the raster spans cols 0..32 -> x 500000..500016
        let min_x = out.tiles.iter().map(|t| t.bounds.min().x).fold(f64::INFINITY, f64::min);
        let max_x = out.tiles.iter().map(|t| t.bounds.max().x).fold(f64::NEG_INFINITY, f64::max);
        let min_y = out.tiles.iter().map(|t| t.bounds.min().y).fold(f64::INFINITY, f64::min);
        let max_y = out.tiles.iter().map(|t| t.bounds.max().y).fold(f64::NEG_INFINITY, f64::max);
        let extent = raster.extent();
        assert_eq!((min_x, max_y), (extent.min().x, extent.max().y));
        assert_eq!(min_y, extent.min().y);
        assert!(max_x >= 500_016.0);
    }

    #[test]
    fn grayscale_and_two_band_sources() {
        let dir = tempfile::tempdir().unwrap();
        let mut gray = Raster::new(8, 8, 1, vec![7; 64]);
        let out = tile_raster(&mut gray, &TilingParams { tile_size: 8, overlap: 0 }, dir.path()).unwrap();
        assert_eq!(out.count(), 1);
        let img = image::open(dir.path().join("tile_0.jpg")).unwrap();
        assert_eq!(img.color(), image::ColorType::L8);

        let two = Raster::new(4, 4, 2, vec![9; 32]);
        assert!(tile_image(&two.window(0, 0, 4, 4), 4, 4, 2).is_ok());
    }

    #[test]
    fn output_carries_manifest_and_center() {
        let dir = tempfile::tempdir().unwrap();
        let out = tile_raster(&mut ortho(), &TilingParams { tile_size: 16, overlap: 4 }, dir.path()).unwrap();
        assert_eq!(out.center(), (500_010.0, 6_999_992.5));

        let manifest = out.manifest();
        assert_eq!(manifest.len(), out.count());
        for t in &out.tiles {
            assert_eq!(manifest.get(&t.filename).map(|r| r.bounds()), Some(t.bounds));
        }
    }

    #[test]
    fn overlap_must_be_below_size() {
        let dir = tempfile::tempdir().unwrap();
        assert!(tile_raster(&mut ortho(), &TilingParams { tile_size: 8, overlap: 8 }, dir.path()).is_err());
    }
}
