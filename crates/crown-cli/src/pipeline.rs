//! Label files → projected candidates → aspect filter + NMS → species names.

use std::fmt;
use std::path::Path;

use anyhow::Result;
use crown_proto::{FinalDetection, TileManifest};
use crown_species::SpeciesCatalog;
use crown_vision::{dedup, ingest_labels, DedupConfig, DedupReport, IngestConfig, IngestReport};
use tracing::warn;

/// Stage after which no detection was left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyStage {
    Ingestion,
    Filtering,
}

impl fmt::Display for EmptyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyStage::Ingestion => write!(f, "ingestion"),
            EmptyStage::Filtering => write!(f, "filtering"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub detections: Vec<FinalDetection>,
    pub ingest: IngestReport,
    pub dedup: DedupReport,
    pub empty_at: Option<EmptyStage>,
}

pub struct PipelineInput<'a> {
    pub labels_dir: &'a Path,
    pub manifest: &'a TileManifest,
    pub catalog: &'a SpeciesCatalog,
    pub algorithm: &'a str,
    pub ingest: &'a IngestConfig,
    pub dedup: &'a DedupConfig,
}

pub fn process_labels(input: &PipelineInput<'_>) -> Result<PipelineOutcome> {
    let ingested = ingest_labels(input.labels_dir, input.manifest, input.ingest)?;
    if ingested.is_empty() {
        warn!("pipeline: no detections survived ingestion; writing empty outputs");
        return Ok(PipelineOutcome {
            detections: Vec::new(),
            ingest: ingested.report,
            dedup: DedupReport::default(),
            empty_at: Some(EmptyStage::Ingestion),
        });
    }

    let (kept, dedup_report) = dedup(ingested.detections, input.dedup);
    let empty_at = if kept.is_empty() {
        warn!("pipeline: every detection was filtered out; writing empty outputs");
        Some(EmptyStage::Filtering)
    } else {
        None
    };

    let detections = input.catalog.resolver(input.algorithm).resolve_all(kept);
    Ok(PipelineOutcome { detections, ingest: ingested.report, dedup: dedup_report, empty_at })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crown_proto::ManifestRow;
    use std::fs;

    const CATALOG: &str = r#"{
        "species_dict": {
            "11": {"common_name": "Açaí", "scientific_name": "Euterpe oleracea"},
            "12": {"common_name": "Buriti", "scientific_name": "Mauritia flexuosa"}
        },
        "categories": { "Palmeiras": [{"specie": "11"}, {"specie": "12"}] }
    }"#;

    fn row(name: &str, min_x: f64) -> ManifestRow {
        ManifestRow {
            filename: name.into(),
            min_x,
            min_y: 0.0,
            max_x: min_x + 100.0,
            max_y: 100.0,
            crs: "EPSG:31982".into(),
        }
    }

    /// Two 100 m tiles overlapping by 20 m (x 0..100 and 80..180).
    fn seam_manifest() -> TileManifest {
        TileManifest::from_rows(vec![row("tile_0.jpg", 0.0), row("tile_1.jpg", 80.0)])
    }

    fn run(labels: &Path, manifest: &TileManifest) -> PipelineOutcome {
        let catalog = SpeciesCatalog::from_json(CATALOG).unwrap();
        process_labels(&PipelineInput {
            labels_dir: labels,
            manifest,
            catalog: &catalog,
            algorithm: "Palmeiras",
            ingest: &IngestConfig::default(),
            dedup: &DedupConfig::default(),
        })
        .unwrap()
    }

    #[test]
    fn seam_duplicate_collapses_to_one() {
        let dir = tempfile::tempdir().unwrap();
        // Crown centred at (90, 50), 10 m wide: right edge of tile 0, left edge of tile 1.
        fs::write(
            dir.path().join("tile_0.txt"),
            "0 0.90 0.50 0.100 0.10 0.81\n1 0.30 0.70 0.08 0.08 0.66\n",
        )
        .unwrap();
        fs::write(dir.path().join("tile_1.txt"), "0 0.105 0.51 0.098 0.10 0.84\n").unwrap();

        let out = run(dir.path(), &seam_manifest());
        assert_eq!(out.empty_at, None);
        assert_eq!(out.ingest.kept, 3);
        assert_eq!(out.dedup.suppressed, 1);
        assert_eq!(out.detections.len(), 2);

        let at_seam: Vec<&FinalDetection> = out
            .detections
            .iter()
            .filter(|d| (80.0..=100.0).contains(&d.bbox.center().x))
            .collect();
        assert_eq!(at_seam.len(), 1);
        // larger box from tile 0 wins on score despite lower confidence
        assert_eq!(at_seam[0].filename, "tile_0.jpg");
        assert_eq!(at_seam[0].common_name, "Açaí");

        let other = out.detections.iter().find(|d| d.class_id == 1).unwrap();
        assert_eq!(other.scientific_name, "Mauritia flexuosa");
        let c = other.bbox.center();
        assert!((c.x - 30.0).abs() < 1e-9 && (c.y - 30.0).abs() < 1e-9);
    }

    #[test]
    fn no_labels_is_empty_after_ingestion() {
        let dir = tempfile::tempdir().unwrap();
        let out = run(dir.path(), &seam_manifest());
        assert_eq!(out.empty_at, Some(EmptyStage::Ingestion));
        assert!(out.detections.is_empty());
    }

    #[test]
    fn only_slivers_is_empty_after_filtering() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tile_0.txt"), "0 0.5 0.5 0.40 0.05 0.9\n").unwrap();
        let out = run(dir.path(), &seam_manifest());
        assert_eq!(out.empty_at, Some(EmptyStage::Filtering));
        assert_eq!(out.dedup.aspect_rejected, 1);
        assert_eq!(out.empty_at.map(|s| s.to_string()).as_deref(), Some("filtering"));
    }

    #[test]
    fn out_of_range_class_is_unknown() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tile_0.txt"), "7 0.5 0.5 0.1 0.1 0.9\n").unwrap();
        let out = run(dir.path(), &seam_manifest());
        assert_eq!(out.detections.len(), 1);
        assert_eq!(out.detections[0].common_name, crown_species::UNKNOWN);
        assert_eq!(out.detections[0].scientific_name, crown_species::UNKNOWN);
    }

    #[test]
    fn huge_and_negative_classes_are_unknown() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("tile_0.txt"),
            "4294967296 0.5 0.5 0.1 0.1 0.9\n-1 0.2 0.2 0.1 0.1 0.9\n",
        )
        .unwrap();
        let out = run(dir.path(), &seam_manifest());
        assert_eq!(out.ingest.malformed, 0);
        assert_eq!(out.empty_at, None);
        assert_eq!(out.detections.len(), 2);
        assert_eq!(out.detections[0].class_id, 4_294_967_296);
        assert_eq!(out.detections[1].class_id, -1);
        assert!(out
            .detections
            .iter()
            .all(|d| d.common_name == crown_species::UNKNOWN && d.scientific_name == crown_species::UNKNOWN));
    }
}
