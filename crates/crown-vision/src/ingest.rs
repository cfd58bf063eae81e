//! Reads per-tile label files and places every detection in the raster CRS.
//!
//! Label line: `class_id cx cy w h confidence`, normalized to the tile with the
//! origin at the image top-left. Projected Y grows upward, so
//! `y_center = tile.maxY - cy * tile_height`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crown_proto::{ManifestRow, ProjectedDetection, RawDetection, TileManifest};
use geo::{coord, Rect};
use serde::Deserialize;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub conf_threshold: f64,
    /// Extension the tiler gave the images, used to join label stems to the manifest.
    pub image_ext: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self { conf_threshold: 0.25, image_ext: "jpg".into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    pub label_files: usize,
    pub lines: usize,
    pub malformed: usize,
    /// Image names with no manifest row or an unreadable label file.
    pub skipped_tiles: Vec<String>,
    pub degenerate: usize,
    pub below_threshold: usize,
    pub kept: usize,
}

#[derive(Debug, Clone)]
pub struct Ingested {
    pub detections: Vec<ProjectedDetection>,
    pub report: IngestReport,
}

impl Ingested {
    pub fn is_empty(&self) -> bool { self.detections.is_empty() }
}

/// One parsed label line, before it is tied to a tile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LabelLine {
    pub class_id: i64,
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
    pub confidence: f64,
}

/// `None` unless the line has exactly six numbers and a finite class id. Fractional
/// class ids are truncated; ids outside the code list are left to the resolver.
pub fn parse_label_line(line: &str) -> Option<LabelLine> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 6 {
        return None;
    }
    let mut v = [0.0f64; 6];
    for (slot, f) in v.iter_mut().zip(&fields) {
        *slot = f.parse().ok()?;
    }
    let class = v[0];
    if !class.is_finite() {
        return None;
    }
    // saturates beyond the i64 range
    Some(LabelLine { class_id: class as i64, cx: v[1], cy: v[2], w: v[3], h: v[4], confidence: v[5] })
}

/// Places a normalized box inside the tile's projected bounds. Returns `None`
/// for a box with no width or height.
pub fn project(tile: &ManifestRow, raw: RawDetection, num_tiles: usize) -> Option<ProjectedDetection> {
    let (tw, th) = (tile.width(), tile.height());
    let x_center = tile.min_x + raw.cx * tw;
    let y_center = tile.max_y - raw.cy * th;
    let x_min = x_center - raw.w * tw / 2.0;
    let y_min = y_center - raw.h * th / 2.0;
    let x_max = x_min + raw.w * tw;
    let y_max = y_min + raw.h * th;

    if !(x_max > x_min && y_max > y_min) {
        return None;
    }
    Some(ProjectedDetection {
        raw,
        num_tiles,
        bbox: Rect::new(coord! { x: x_min, y: y_min }, coord! { x: x_max, y: y_max }),
    })
}

/// `*.txt` files in `dir`, sorted by name.
pub fn label_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read labels dir {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().map(|e| e == "txt").unwrap_or(false) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Reads every label file in `labels_dir`, joins it to the manifest and keeps
/// detections with `confidence >= conf_threshold`. Files without a manifest
/// row, unreadable files and malformed lines are skipped and counted, never fatal.
pub fn ingest_labels(labels_dir: &Path, manifest: &TileManifest, cfg: &IngestConfig) -> Result<Ingested> {
    let files = label_files(labels_dir)?;
    let num_tiles = files.len();
    let mut report = IngestReport { label_files: num_tiles, ..Default::default() };
    let mut projected = Vec::new();

    for path in &files {
        let stem = path.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
        let image_name = format!("{}.{}", stem, cfg.image_ext);
        let Some(tile) = manifest.get(&image_name) else {
            warn!("ingest: no manifest row for {}, skipping", image_name);
            report.skipped_tiles.push(image_name);
            continue;
        };

        let bytes = match fs::read(path) {
            Ok(b) => b,
            Err(e) => {
                warn!("ingest: cannot read {}: {}, skipping", path.display(), e);
                report.skipped_tiles.push(image_name);
                continue;
            }
        };
        let text = String::from_utf8_lossy(&bytes);
        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            report.lines += 1;
            let Some(l) = parse_label_line(line) else {
                debug!("ingest: malformed line in {}: {:?}", path.display(), line);
                report.malformed += 1;
                continue;
            };
            let raw = RawDetection {
                filename: image_name.clone(),
                class_id: l.class_id,
                cx: l.cx,
                cy: l.cy,
                w: l.w,
                h: l.h,
                confidence: l.confidence,
            };
            match project(tile, raw, num_tiles) {
                Some(d) => projected.push(d),
                None => report.degenerate += 1,
            }
        }
    }

    let before = projected.len();
    let detections: Vec<ProjectedDetection> =
        projected.into_iter().filter(|d| d.raw.confidence >= cfg.conf_threshold).collect();
    report.below_threshold = before - detections.len();
    report.kept = detections.len();

    if !report.skipped_tiles.is_empty() {
        warn!("ingest: {} label file(s) had no manifest row", report.skipped_tiles.len());
    }
    info!(
        "ingest: {} file(s), {} line(s), {} malformed, {} degenerate, {} below conf {}, {} kept",
        report.label_files, report.lines, report.malformed, report.degenerate,
        report.below_threshold, cfg.conf_threshold, report.kept
    );
    Ok(Ingested { detections, report })
}
