//! Class distribution table and the per-run summary document.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crown_proto::FinalDetection;
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::info;

/// Detections per common name, sorted by name.
pub fn class_distribution(dets: &[FinalDetection]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for d in dets {
        *counts.entry(d.common_name.clone()).or_insert(0) += 1;
    }
    counts
}

pub fn write_distribution(counts: &BTreeMap<String, usize>, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
    }
    let mut wtr = csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    wtr.write_record(["common_name", "count"])?;
    for (name, n) in counts {
        wtr.write_record([name.as_str(), n.to_string().as_str()])?;
        info!("report: {:<24} {:>6}", name, n);
    }
    wtr.flush().with_context(|| format!("flush {}", path.display()))
}

#[derive(Debug, Clone, Serialize)]
pub struct StageCounts {
    pub label_files: usize,
    pub lines: usize,
    pub malformed: usize,
    pub skipped_tiles: Vec<String>,
    pub degenerate: usize,
    pub below_threshold: usize,
    pub ingested: usize,
    pub aspect_rejected: usize,
    pub suppressed: usize,
    pub final_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub generated_at: String,
    pub algorithm: String,
    pub crs: String,
    pub conf_threshold: f64,
    /// Stage that ran out of detections, if any.
    pub empty_at: Option<String>,
    pub counts: StageCounts,
    pub outputs: Vec<PathBuf>,
}

impl RunSummary {
    pub fn new(algorithm: &str, crs: &str, conf_threshold: f64, counts: StageCounts) -> Self {
        let generated_at = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            generated_at,
            algorithm: algorithm.into(),
            crs: crs.into(),
            conf_threshold,
            empty_at: None,
            counts,
            outputs: Vec::new(),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let s = serde_json::to_string_pretty(self).context("encode run summary")?;
        fs::write(path, s).with_context(|| format!("write {}", path.display()))
    }
}
