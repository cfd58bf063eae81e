use anyhow::Result;

use crate::{DedupConfig, IngestConfig};

pub fn check_ingest(cfg: &IngestConfig) -> Result<()> {
    anyhow::ensure!((0.0..=1.0).contains(&cfg.conf_threshold), "ingest.conf_threshold must be within 0..1");
    anyhow::ensure!(!cfg.image_ext.is_empty() && !cfg.image_ext.starts_with('.'), "ingest.image_ext should look like \"jpg\"");
    Ok(())
}

pub fn check_dedup(cfg: &DedupConfig) -> Result<()> {
    anyhow::ensure!((0.0..1.0).contains(&cfg.iou_threshold), "dedup.iou_threshold must be within 0..1");
    anyhow::ensure!((0.0..=1.0).contains(&cfg.alpha), "dedup.alpha must be within 0..1");
    anyhow::ensure!(cfg.min_aspect_ratio > 0.0, "dedup.min_aspect_ratio must be positive");
    anyhow::ensure!(cfg.min_aspect_ratio <= cfg.max_aspect_ratio, "dedup.min_aspect_ratio above max_aspect_ratio");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass() {
        check_ingest(&IngestConfig::default()).unwrap();
        check_dedup(&DedupConfig::default()).unwrap();
    }

    #[test]
    fn bad_values_fail() {
        assert!(check_ingest(&IngestConfig { conf_threshold: 1.5, ..Default::default() }).is_err());
        assert!(check_ingest(&IngestConfig { image_ext: ".jpg".into(), ..Default::default() }).is_err());
        assert!(check_dedup(&DedupConfig { min_aspect_ratio: 3.0, ..Default::default() }).is_err());
        assert!(check_dedup(&DedupConfig { iou_threshold: -0.1, ..Default::default() }).is_err());
    }
}
