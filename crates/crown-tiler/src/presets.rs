use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Tiling geometry a detection model was trained for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmPreset {
    pub name: String,
    /// ASCII spelling accepted on the command line.
    #[serde(default)]
    pub alias: Option<String>,
    pub tile_size: u32,
    pub overlap: u32,
    /// false while no trained model ships for this algorithm.
    #[serde(default = "available_default")]
    pub available: bool,
}

fn available_default() -> bool { true }

fn preset(name: &str, alias: &str, tile_size: u32, overlap: u32, available: bool) -> AlgorithmPreset {
    AlgorithmPreset { name: name.into(), alias: Some(alias.into()), tile_size, overlap, available }
}

pub fn default_presets() -> Vec<AlgorithmPreset> {
    vec![
        preset("Açaí", "Acai", 1536, 128, true),
        preset("Palmeiras", "Palmeiras", 1536, 256, true),
        preset("Castanheira", "Castanheira", 2048, 1024, false),
        preset("PMFS", "PMFS", 1536, 768, true),
        preset("PFNMs", "PFNMs", 1536, 512, true),
        preset("Ecológico", "Ecologico", 3000, 0, false),
    ]
}

/// Case-insensitive match on name or alias. Unavailable algorithms are refused.
pub fn find_preset<'a>(presets: &'a [AlgorithmPreset], name: &str) -> Result<&'a AlgorithmPreset> {
    let wanted = name.to_lowercase();
    let p = presets
        .iter()
        .find(|p| {
            p.name.to_lowercase() == wanted
                || p.alias.as_deref().map(|a| a.to_lowercase() == wanted).unwrap_or(false)
        })
        .ok_or_else(|| {
            let known: Vec<&str> = presets.iter().map(|p| p.name.as_str()).collect();
            anyhow::anyhow!("unknown algorithm {:?}; known: {}", name, known.join(", "))
        })?;
    anyhow::ensure!(p.available, "algorithm {} is still in development and has no model yet", p.name);
    Ok(p)
}
