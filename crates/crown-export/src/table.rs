use std::path::Path;

use anyhow::{Context, Result};
use crown_proto::FinalDetection;

use crate::ring;

pub const HEADER: [&str; 6] = ["filename", "class_id", "common_name", "scientific_name", "confidence", "geometry"];

pub fn polygon_wkt(d: &FinalDetection) -> String {
    let pts: Vec<String> = ring(d).iter().map(|(x, y)| format!("{} {}", x, y)).collect();
    format!("POLYGON (({}))", pts.join(", "))
}

pub fn write_csv(dets: &[FinalDetection], path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path).with_context(|| format!("create {}", path.display()))?;
    wtr.write_record(HEADER)?;
    for d in dets {
        wtr.write_record([
            d.filename.clone(),
            d.class_id.to_string(),
            d.common_name.clone(),
            d.scientific_name.clone(),
            d.confidence.to_string(),
            polygon_wkt(d),
        ])?;
    }
    wtr.flush().with_context(|| format!("flush {}", path.display()))
}
