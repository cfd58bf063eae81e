//! Maps detector class ids to species names.
//!
//! Each algorithm has an ordered list of species codes; the detector's class id
//! is a position in that list. The code then keys the species dictionary.

pub mod doctor;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use crown_proto::{FinalDetection, ProjectedDetection};
use serde::Deserialize;
use tracing::{debug, info};

pub const UNKNOWN: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SpeciesInfo {
    pub common_name: String,
    pub scientific_name: String,
}

/// Codes show up both as JSON strings and numbers.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum RawCode {
    Text(String),
    Number(i64),
}

impl RawCode {
    fn into_code(self) -> String {
        match self {
            RawCode::Text(s) => s,
            RawCode::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CategoryEntry {
    specie: RawCode,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    species_dict: HashMap<String, SpeciesInfo>,
    #[serde(default)]
    categories: HashMap<String, Vec<CategoryEntry>>,
}

/// Loaded once per run, read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct SpeciesCatalog {
    species: HashMap<String, SpeciesInfo>,
    categories: HashMap<String, Vec<String>>,
}

impl SpeciesCatalog {
    pub fn from_json(s: &str) -> Result<Self> {
        let file: CatalogFile = serde_json::from_str(s).context("parse species catalog json")?;
        let categories = file
            .categories
            .into_iter()
            .map(|(alg, entries)| (alg, entries.into_iter().map(|e| e.specie.into_code()).collect()))
            .collect();
        Ok(Self { species: file.species_dict, categories })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let s = fs::read_to_string(path).with_context(|| format!("read species catalog {}", path.display()))?;
        let cat = Self::from_json(&s)?;
        info!("species: {} species, {} algorithm(s) from {}", cat.species.len(), cat.categories.len(), path.display());
        Ok(cat)
    }

    /// Ordered code list of an algorithm; empty when the algorithm is unknown.
    pub fn codes(&self, algorithm: &str) -> &[String] {
        self.categories.get(algorithm).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn species(&self, code: &str) -> Option<&SpeciesInfo> {
        self.species.get(code)
    }

    pub fn has_algorithm(&self, algorithm: &str) -> bool {
        self.categories.contains_key(algorithm)
    }

    pub fn species_count(&self) -> usize { self.species.len() }

    pub fn resolver(&self, algorithm: &str) -> LabelResolver<'_> {
        LabelResolver { catalog: self, codes: self.codes(algorithm) }
    }
}

/// Resolution against one algorithm's code list.
#[derive(Debug, Clone, Copy)]
pub struct LabelResolver<'a> {
    catalog: &'a SpeciesCatalog,
    codes: &'a [String],
}

impl<'a> LabelResolver<'a> {
    /// (common_name, scientific_name), or `Unknown` for both when the class id
    /// is outside the code list or the code has no dictionary entry.
    pub fn names(&self, class_id: i64) -> (String, String) {
        usize::try_from(class_id)
            .ok()
            .and_then(|i| self.codes.get(i))
            .and_then(|code| self.catalog.species(code))
            .map(|s| (s.common_name.clone(), s.scientific_name.clone()))
            .unwrap_or_else(|| {
                debug!("species: class {} unresolved", class_id);
                (UNKNOWN.to_string(), UNKNOWN.to_string())
            })
    }

    pub fn resolve(&self, d: ProjectedDetection) -> FinalDetection {
        let (common_name, scientific_name) = self.names(d.raw.class_id);
        FinalDetection {
            filename: d.raw.filename,
            class_id: d.raw.class_id,
            common_name,
            scientific_name,
            confidence: d.raw.confidence,
            bbox: d.bbox,
        }
    }

    pub fn resolve_all(&self, dets: Vec<ProjectedDetection>) -> Vec<FinalDetection> {
        dets.into_iter().map(|d| self.resolve(d)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crown_proto::RawDetection;
    use geo::{coord, Rect};

    const CATALOG: &str = r#"{
        "species_dict": {
            "101": {"common_name": "Açaí", "scientific_name": "Euterpe oleracea"},
            "102": {"common_name": "Buriti", "scientific_name": "Mauritia flexuosa"},
            "205": {"common_name": "Castanheira", "scientific_name": "Bertholletia excelsa"}
        },
        "categories": {
            "Palmeiras": [{"specie": 101}, {"specie": "102"}, {"specie": 999}],
            "PMFS": [{"specie": "205"}]
        }
    }"#;

    #[test]
    fn class_zero_is_first_code() {
        let cat = SpeciesCatalog::from_json(CATALOG).unwrap();
        assert_eq!(cat.codes("Palmeiras"), &["101", "102", "999"]);
        let r = cat.resolver("Palmeiras");
        assert_eq!(r.names(0), ("Açaí".to_string(), "Euterpe oleracea".to_string()));
        assert_eq!(r.names(1).1, "Mauritia flexuosa");
    }

    #[test]
    fn out_of_range_and_missing_codes_are_unknown() {
        let cat = SpeciesCatalog::from_json(CATALOG).unwrap();
        let unknown = (UNKNOWN.to_string(), UNKNOWN.to_string());
        let r = cat.resolver("Palmeiras");
        assert_eq!(r.names(3), unknown);
        assert_eq!(r.names(i64::MAX), unknown);
        assert_eq!(r.names(-1), unknown);
        // code 999 is listed but not in the dictionary
        assert_eq!(r.names(2), unknown);
        // algorithm without a category
        assert_eq!(cat.resolver("Ecológico").names(0), unknown);
    }

    #[test]
    fn resolve_carries_attributes() {
        let cat = SpeciesCatalog::from_json(CATALOG).unwrap();
        let bbox = Rect::new(coord! { x: 1.0, y: 2.0 }, coord! { x: 3.0, y: 4.0 });
        let d = ProjectedDetection {
            raw: RawDetection { filename: "tile_4.jpg".into(), class_id: 0, cx: 0.5, cy: 0.5, w: 0.1, h: 0.1, confidence: 0.61 },
            num_tiles: 9,
            bbox,
        };
        let f = cat.resolver("PMFS").resolve(d);
        assert_eq!(f.filename, "tile_4.jpg");
        assert_eq!(f.common_name, "Castanheira");
        assert_eq!(f.confidence, 0.61);
        assert_eq!(f.bbox, bbox);
    }

    #[test]
    fn rejects_broken_json() {
        assert!(SpeciesCatalog::from_json("{\"categories\": {}}").is_err());
    }
}
