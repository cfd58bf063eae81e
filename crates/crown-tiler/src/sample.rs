//! Picks a handful of tiles near the raster center for threshold preview.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use crown_proto::{ManifestRow, TileManifest};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy)]
pub struct SampleParams {
    pub max_distance: f64,
    pub max_images: usize,
}

impl Default for SampleParams {
    fn default() -> Self {
        Self { max_distance: 100.0, max_images: 5 }
    }
}

/// Tiles whose bbox center lies within `max_distance` of `center`, nearest first.
/// Equal distances keep manifest order.
pub fn select_central_tiles<'a>(manifest: &'a TileManifest, center: (f64, f64), params: &SampleParams) -> Vec<&'a ManifestRow> {
    let mut near: Vec<(f64, &ManifestRow)> = manifest
        .rows()
        .iter()
        .map(|r| {
            let c = r.bounds().center();
            ((c.x - center.0).hypot(c.y - center.1), r)
        })
        .filter(|(d, _)| *d <= params.max_distance)
        .collect();
    near.sort_by(|a, b| a.0.total_cmp(&b.0));
    near.into_iter().take(params.max_images).map(|(_, r)| r).collect()
}

/// Copies the selected tiles; missing sources are skipped with a warning.
pub fn copy_samples(rows: &[&ManifestRow], tiles_dir: &Path, out_dir: &Path) -> Result<usize> {
    fs::create_dir_all(out_dir).with_context(|| format!("create {}", out_dir.display()))?;
    let mut copied = 0;
    for r in rows {
        let src = tiles_dir.join(&r.filename);
        if !src.exists() {
            warn!("sample: {} not found in {}", r.filename, tiles_dir.display());
            continue;
        }
        fs::copy(&src, out_dir.join(&r.filename)).with_context(|| format!("copy {}", src.display()))?;
        copied += 1;
    }
    info!("sample: {} tile(s) copied to {}", copied, out_dir.display());
    Ok(copied)
}
