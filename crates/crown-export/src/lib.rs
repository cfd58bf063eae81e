pub mod geojson;
pub mod report;
pub mod table;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crown_proto::FinalDetection;
use tracing::info;

/// Paths written for one algorithm's result set.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPaths {
    pub geojson: PathBuf,
    pub csv: PathBuf,
}

impl OutputPaths {
    pub fn under(results_dir: &Path, algorithm: &str) -> Self {
        Self {
            geojson: results_dir.join("geojson").join(format!("resultados_{}.geojson", algorithm)),
            csv: results_dir.join("csv").join(format!("resultados_{}.csv", algorithm)),
        }
    }
}

/// Writes the vector and tabular outputs. An empty slice still yields a valid
/// FeatureCollection and a header-only CSV.
pub fn write_results(dets: &[FinalDetection], crs: &str, paths: &OutputPaths) -> Result<()> {
    for p in [&paths.geojson, &paths.csv] {
        if let Some(dir) = p.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }
    }
    geojson::write_geojson(dets, crs, &paths.geojson)?;
    table::write_csv(dets, &paths.csv)?;
    info!("export: {} detection(s) -> {}, {}", dets.len(), paths.geojson.display(), paths.csv.display());
    Ok(())
}

/// Closed exterior ring of a box, counter-clockwise starting at (maxX, minY).
pub(crate) fn ring(d: &FinalDetection) -> [(f64, f64); 5] {
    let (min, max) = (d.bbox.min(), d.bbox.max());
    [(max.x, min.y), (max.x, max.y), (min.x, max.y), (min.x, min.y), (max.x, min.y)]
}
