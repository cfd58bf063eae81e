use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use crown_proto::FinalDetection;
use serde_json::{json, Value};

use crate::ring;

pub fn feature_collection(dets: &[FinalDetection], crs: &str) -> Value {
    let features: Vec<Value> = dets
        .iter()
        .map(|d| {
            let coords: Vec<[f64; 2]> = ring(d).iter().map(|&(x, y)| [x, y]).collect();
            json!({
                "type": "Feature",
                "geometry": { "type": "Polygon", "coordinates": [coords] },
                "properties": {
                    "filename": d.filename,
                    "class_id": d.class_id,
                    "common_name": d.common_name,
                    "scientific_name": d.scientific_name,
                    "confidence": d.confidence,
                },
            })
        })
        .collect();

    let mut fc = json!({ "type": "FeatureCollection", "features": features });
    if !crs.is_empty() {
        // named CRS member, still understood by GDAL/QGIS for projected data
        fc["crs"] = json!({ "type": "name", "properties": { "name": crs } });
    }
    fc
}

pub fn write_geojson(dets: &[FinalDetection], crs: &str, path: &Path) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &feature_collection(dets, crs))
        .with_context(|| format!("write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fin;

    #[test]
    fn polygon_ring_is_closed() {
        let fc = feature_collection(&[fin("tile_0.jpg", "Açaí", 10.0, 20.0)], "EPSG:31982");
        assert_eq!(fc["crs"]["properties"]["name"], "EPSG:31982");
        let f = &fc["features"][0];
        assert_eq!(f["properties"]["common_name"], "Açaí");
        let ring = f["geometry"]["coordinates"][0].as_array().unwrap();
        assert_eq!(ring.len(), 5);
        assert_eq!(ring[0], ring[4]);
        assert_eq!(ring[0], json!([14.0, 20.0]));
        assert_eq!(ring[2], json!([10.0, 25.0]));
    }

    #[test]
    fn empty_collection_is_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.geojson");
        write_geojson(&[], "", &path).unwrap();
        let v: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["type"], "FeatureCollection");
        assert_eq!(v["features"].as_array().map(Vec::len), Some(0));
        assert!(v.get("crs").is_none());
    }
}
