//! Locates the detector's newest output run (`exp`, `exp2`, `exp3`, ...).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

/// `exp` counts as run 0, `expN` as run N. Anything else is not a run.
pub fn run_number(name: &str) -> Option<u64> {
    let rest = name.strip_prefix("exp")?;
    if rest.is_empty() {
        return Some(0);
    }
    if !rest.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    rest.parse().ok()
}

pub fn latest_run(base: &Path) -> Result<PathBuf> {
    let mut best: Option<(u64, PathBuf)> = None;
    for entry in fs::read_dir(base).with_context(|| format!("read detector output {}", base.display()))? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let Some(n) = path.file_name().and_then(|n| n.to_str()).and_then(run_number) else { continue };
        if best.as_ref().map(|(b, _)| n >= *b).unwrap_or(true) {
            best = Some((n, path));
        }
    }
    let (n, path) = best.with_context(|| format!("no detection run (exp*) under {}; run the detector first", base.display()))?;
    info!("runs: using run {} at {}", n, path.display());
    Ok(path)
}

/// Labels directory of the newest run.
pub fn latest_labels_dir(base: &Path) -> Result<PathBuf> {
    let dir = latest_run(base)?.join("labels");
    anyhow::ensure!(dir.is_dir(), "run has no labels directory: {}", dir.display());
    Ok(dir)
}
