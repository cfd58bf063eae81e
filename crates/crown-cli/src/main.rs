mod config;
mod pipeline;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crown_export::report::{class_distribution, write_distribution, RunSummary, StageCounts};
use crown_export::{write_results, OutputPaths};
use crown_proto::RunConfig;
use crown_species::{doctor as species_doctor, SpeciesCatalog};
use crown_tiler::manifest::{read_manifest, read_run_config, write_run_config};
use crown_tiler::presets::find_preset;
use crown_tiler::sample::{copy_samples, select_central_tiles};
use crown_tiler::{doctor as tiler_doctor, tile_geotiff, TilingLayout, TilingParams};
use crown_vision::doctor as vision_doctor;
use crown_vision::runs::latest_labels_dir;

use config::{load_config, Config};
use pipeline::{process_labels, PipelineInput};

#[derive(Debug, Parser)]
#[command(name = "crown", version, about = "crownmap - tree crown detection over georeferenced orthophotos")]
struct Cli {
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Cut a GeoTIFF into detector-sized tiles and write the tile manifest.
    Tile {
        #[arg(long)]
        raster: PathBuf,
        #[arg(long)]
        algorithm: String,
        #[arg(long)]
        tile_size: Option<u32>,
        #[arg(long)]
        overlap: Option<u32>,
    },
    /// Turn the detector's label files into deduplicated, georeferenced results.
    Results {
        #[arg(long)]
        conf: Option<f64>,
        /// Also write the per-species count table.
        #[arg(long)]
        report: bool,
        /// Labels directory; defaults to the newest run under paths.detect_dir.
        #[arg(long)]
        labels: Option<PathBuf>,
    },
    Doctor,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let cfg = load_config(cli.config.as_deref())?;

    match cli.cmd {
        Command::Tile { raster, algorithm, tile_size, overlap } => tile(&cfg, raster, &algorithm, tile_size, overlap),
        Command::Results { conf, report, labels } => results(&cfg, conf, report, labels),
        Command::Doctor => doctor(&cfg),
    }
}

fn tile(cfg: &Config, raster: PathBuf, algorithm: &str, tile_size: Option<u32>, overlap: Option<u32>) -> Result<()> {
    let presets = cfg.presets();
    let preset = find_preset(&presets, algorithm)?;
    let tile_size = tile_size.unwrap_or(preset.tile_size);
    let overlap = overlap.unwrap_or(preset.overlap);
    tiler_doctor::check_tiling(tile_size, overlap)?;
    info!("tile: algorithm={} tile_size={} overlap={}", preset.name, tile_size, overlap);

    let params = TilingParams { tile_size: tile_size as usize, overlap: overlap as usize };
    let layout = TilingLayout {
        tiles_dir: cfg.paths.tiles_dir.clone(),
        manifest_path: cfg.paths.manifest.clone(),
    };
    let out = tile_geotiff(&raster, &params, &layout)?;
    if out.crs.is_empty() {
        warn!("tile: raster carries no EPSG code, outputs will have no CRS");
    }

    let run = RunConfig { crs: out.crs.clone(), algorithm: preset.name.clone(), tile_size, overlap };
    write_run_config(&run, &cfg.paths.run_config)?;

    if cfg.sampling.enable {
        let manifest = out.manifest();
        let picked = select_central_tiles(&manifest, out.center(), &cfg.sampling.params());
        let copied = copy_samples(&picked, &cfg.paths.tiles_dir, &cfg.paths.samples_dir)?;
        info!("tile: {} sample tile(s) in {}", copied, cfg.paths.samples_dir.display());
    }

    info!("tile: {} tile(s) written to {}", out.count(), cfg.paths.tiles_dir.display());
    Ok(())
}

fn results(cfg: &Config, conf: Option<f64>, report: bool, labels: Option<PathBuf>) -> Result<()> {
    let run = read_run_config(&cfg.paths.run_config)?;
    let manifest = read_manifest(&cfg.paths.manifest)?;
    let catalog = SpeciesCatalog::load(&cfg.paths.species_catalog)?;
    let labels_dir = match labels {
        Some(dir) => dir,
        None => latest_labels_dir(&cfg.paths.detect_dir)?,
    };

    let mut ingest = cfg.ingest.clone();
    if let Some(c) = conf {
        ingest.conf_threshold = c;
    }
    vision_doctor::check_ingest(&ingest)?;
    vision_doctor::check_dedup(&cfg.dedup)?;

    let outcome = process_labels(&PipelineInput {
        labels_dir: &labels_dir,
        manifest: &manifest,
        catalog: &catalog,
        algorithm: &run.algorithm,
        ingest: &ingest,
        dedup: &cfg.dedup,
    })?;

    let paths = OutputPaths::under(&cfg.paths.results_dir, &run.algorithm);
    write_results(&outcome.detections, &run.crs, &paths)?;

    let counts = StageCounts {
        label_files: outcome.ingest.label_files,
        lines: outcome.ingest.lines,
        malformed: outcome.ingest.malformed,
        skipped_tiles: outcome.ingest.skipped_tiles.clone(),
        degenerate: outcome.ingest.degenerate,
        below_threshold: outcome.ingest.below_threshold,
        ingested: outcome.ingest.kept,
        aspect_rejected: outcome.dedup.aspect_rejected,
        suppressed: outcome.dedup.suppressed,
        final_count: outcome.detections.len(),
    };
    let mut summary = RunSummary::new(&run.algorithm, &run.crs, ingest.conf_threshold, counts);
    summary.empty_at = outcome.empty_at.map(|s| s.to_string());
    summary.outputs = vec![paths.geojson.clone(), paths.csv.clone()];

    if report {
        let dist_path = cfg
            .paths
            .results_dir
            .join("csv")
            .join(format!("class_distribution_{}.csv", run.algorithm));
        write_distribution(&class_distribution(&outcome.detections), &dist_path)?;
        summary.outputs.push(dist_path);
    }

    let summary_path = cfg.paths.results_dir.join(format!("summary_{}.json", run.algorithm));
    summary.write(&summary_path)?;

    info!(
        "results: {} detection(s) for {} -> {}",
        outcome.detections.len(),
        run.algorithm,
        paths.geojson.display()
    );
    Ok(())
}

fn doctor(cfg: &Config) -> Result<()> {
    info!("doctor: starting");

    let presets = cfg.presets();
    anyhow::ensure!(!presets.is_empty(), "no algorithms configured");
    for p in presets.iter().filter(|p| p.available) {
        tiler_doctor::check_tiling(p.tile_size, p.overlap).with_context(|| format!("algorithm {}", p.name))?;
    }
    tiler_doctor::check_sampling(cfg.sampling.max_distance, cfg.sampling.max_images)?;
    vision_doctor::check_ingest(&cfg.ingest)?;
    vision_doctor::check_dedup(&cfg.dedup)?;

    let run = if cfg.paths.run_config.exists() {
        let run = read_run_config(&cfg.paths.run_config)?;
        info!("doctor: last tiling run {} ({}x{} px, overlap {})", run.algorithm, run.tile_size, run.tile_size, run.overlap);
        Some(run)
    } else {
        warn!("doctor: no run config at {}, run `crown tile` first", cfg.paths.run_config.display());
        None
    };

    if cfg.paths.manifest.exists() {
        let manifest = read_manifest(&cfg.paths.manifest)?;
        info!("doctor: manifest lists {} tile(s)", manifest.len());
    } else {
        warn!("doctor: no tile manifest at {}", cfg.paths.manifest.display());
    }

    if cfg.paths.species_catalog.exists() {
        let catalog = SpeciesCatalog::load(&cfg.paths.species_catalog)?;
        match &run {
            Some(run) => species_doctor::check_catalog(&catalog, &run.algorithm)?,
            None => {
                for p in presets.iter().filter(|p| p.available) {
                    species_doctor::check_catalog(&catalog, &p.name)?;
                }
            }
        }
    } else {
        warn!("doctor: species catalog missing at {}", cfg.paths.species_catalog.display());
    }

    info!("doctor: OK");
    Ok(())
}
