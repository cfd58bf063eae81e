use geo::Rect;
use serde::{Deserialize, Serialize};

/// Detector output for one object in one tile. Box values are normalized 0..1
/// with the origin at the image top-left.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub filename: String,
    pub class_id: i64,
    pub cx: f64,
    pub cy: f64,
    pub w: f64,
    pub h: f64,
    pub confidence: f64,
}

/// A detection placed in the raster's projected CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedDetection {
    pub raw: RawDetection,
    /// Label files seen in the run this detection came from.
    pub num_tiles: usize,
    pub bbox: Rect<f64>,
}

impl ProjectedDetection {
    pub fn confidence(&self) -> f64 { self.raw.confidence }
    pub fn class_id(&self) -> i64 { self.raw.class_id }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FinalDetection {
    pub filename: String,
    pub class_id: i64,
    pub common_name: String,
    pub scientific_name: String,
    pub confidence: f64,
    pub bbox: Rect<f64>,
}
