pub mod doctor;
pub mod filter;
pub mod ingest;
pub mod nms;
pub mod runs;

use crown_proto::ProjectedDetection;
use serde::Deserialize;
use tracing::info;

pub use ingest::{ingest_labels, IngestConfig, IngestReport, Ingested};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub min_aspect_ratio: f64,
    pub max_aspect_ratio: f64,
    pub iou_threshold: f64,
    /// Weight of the perimeter term in the box score.
    pub alpha: f64,
    /// Pre-filter candidate pairs with an R-tree. Same result, fewer IoU evaluations.
    pub use_index: bool,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            min_aspect_ratio: 0.5,
            max_aspect_ratio: 2.0,
            iou_threshold: 0.20,
            alpha: 0.20,
            use_index: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub input: usize,
    pub aspect_rejected: usize,
    pub suppressed: usize,
    pub kept: usize,
}

/// Aspect-ratio filter followed by score-weighted NMS. Survivors keep their
/// input order.
pub fn dedup(candidates: Vec<ProjectedDetection>, cfg: &DedupConfig) -> (Vec<ProjectedDetection>, DedupReport) {
    let input = candidates.len();
    let shaped = filter::filter_aspect(candidates, cfg.min_aspect_ratio, cfg.max_aspect_ratio);
    let after_aspect = shaped.len();

    let strategy = if cfg.use_index && cfg.iou_threshold >= 0.0 {
        nms::PairStrategy::Indexed
    } else {
        nms::PairStrategy::AllPairs
    };
    let kept = nms::nms_with_score(shaped, cfg.iou_threshold, cfg.alpha, strategy);

    let report = DedupReport {
        input,
        aspect_rejected: input - after_aspect,
        suppressed: after_aspect - kept.len(),
        kept: kept.len(),
    };
    info!(
        "dedup: {} in, {} rejected by aspect ratio, {} suppressed, {} kept",
        report.input, report.aspect_rejected, report.suppressed, report.kept
    );
    (kept, report)
}
