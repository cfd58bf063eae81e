use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use crown_tiler::presets::{default_presets, AlgorithmPreset};
use crown_tiler::sample::SampleParams;
use crown_vision::{DedupConfig, IngestConfig};

/// Every section is optional; a missing `--config` means all defaults.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsCfg,
    pub sampling: SamplingCfg,
    pub ingest: IngestConfig,
    pub dedup: DedupConfig,
    /// Replaces the built-in algorithm table when present.
    pub algorithms: Option<Vec<AlgorithmPreset>>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
pub struct PathsCfg {
    pub tiles_dir: PathBuf,
    pub manifest: PathBuf,
    pub run_config: PathBuf,
    pub samples_dir: PathBuf,
    /// Detector output root holding `exp`, `exp2`, ...
    pub detect_dir: PathBuf,
    pub results_dir: PathBuf,
    pub species_catalog: PathBuf,
}

impl Default for PathsCfg {
    fn default() -> Self {
        let work = Path::new("processing");
        Self {
            tiles_dir: work.join("output_tiles"),
            manifest: work.join("tile_coords.csv"),
            run_config: work.join("run.toml"),
            samples_dir: work.join("selected_images"),
            detect_dir: PathBuf::from("runs/detect"),
            results_dir: PathBuf::from("results"),
            species_catalog: PathBuf::from("json/groups.json"),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(default)]
pub struct SamplingCfg {
    pub enable: bool,
    pub max_distance: f64,
    pub max_images: usize,
}

impl Default for SamplingCfg {
    fn default() -> Self {
        let p = SampleParams::default();
        Self { enable: true, max_distance: p.max_distance, max_images: p.max_images }
    }
}

impl SamplingCfg {
    pub fn params(&self) -> SampleParams {
        SampleParams { max_distance: self.max_distance, max_images: self.max_images }
    }
}

impl Config {
    pub fn presets(&self) -> Vec<AlgorithmPreset> {
        self.algorithms.clone().unwrap_or_else(default_presets)
    }
}

pub fn load_config(path: Option<&str>) -> Result<Config> {
    let Some(path) = path else { return Ok(Config::default()) };
    let s = std::fs::read_to_string(path).context("read config")?;
    toml::from_str(&s).context("parse config toml")
}
