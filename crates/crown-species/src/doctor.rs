use anyhow::Result;
use tracing::warn;

use crate::SpeciesCatalog;

/// Fails on an empty dictionary; gaps for the chosen algorithm only warn since
/// they resolve to `Unknown`.
pub fn check_catalog(catalog: &SpeciesCatalog, algorithm: &str) -> Result<()> {
    anyhow::ensure!(catalog.species_count() > 0, "species catalog has no species");
    if !catalog.has_algorithm(algorithm) {
        warn!("species: no category for algorithm {}, every class will be Unknown", algorithm);
        return Ok(());
    }
    for (i, code) in catalog.codes(algorithm).iter().enumerate() {
        if catalog.species(code).is_none() {
            warn!("species: class {} of {} maps to code {} missing from species_dict", i, algorithm, code);
        }
    }
    Ok(())
}
