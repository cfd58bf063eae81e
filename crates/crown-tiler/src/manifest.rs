use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use crown_proto::{ManifestRow, RunConfig, Tile, TileManifest};
use tracing::debug;

/// Writes the manifest next to its final path and renames it into place, so a
/// reader never sees a half-written table.
pub fn write_manifest(tiles: &[Tile], path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("create manifest dir {}", dir.display()))?;
    }
    let tmp = path.with_extension("csv.partial");
    {
        let mut wtr = csv::Writer::from_path(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        // serialize() skips the header when there are no rows
        wtr.write_record(["filename", "minX", "minY", "maxX", "maxY", "crs"])?;
        for t in tiles {
            let r = t.manifest_row();
            wtr.write_record([
                r.filename,
                r.min_x.to_string(),
                r.min_y.to_string(),
                r.max_x.to_string(),
                r.max_y.to_string(),
                r.crs,
            ])?;
        }
        wtr.flush().context("flush manifest")?;
    }
    fs::rename(&tmp, path).with_context(|| format!("move manifest into {}", path.display()))?;
    debug!("manifest: {} rows -> {}", tiles.len(), path.display());
    Ok(())
}

pub fn read_manifest(path: &Path) -> Result<TileManifest> {
    let mut rdr = csv::Reader::from_path(path).with_context(|| format!("open manifest {}", path.display()))?;
    let rows = rdr
        .deserialize::<ManifestRow>()
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("parse manifest {}", path.display()))?;
    Ok(TileManifest::from_rows(rows))
}

pub fn write_run_config(cfg: &RunConfig, path: &Path) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("encode run config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))
}

pub fn read_run_config(path: &Path) -> Result<RunConfig> {
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).context("parse run config toml")
}
