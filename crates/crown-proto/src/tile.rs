use std::collections::HashMap;

use geo::{coord, Rect};
use serde::{Deserialize, Serialize};

/// One emitted tile. Pixel origin and size are in source-raster pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct Tile {
    pub filename: String,
    pub row: usize,
    pub col: usize,
    pub width: usize,
    pub height: usize,
    pub bounds: Rect<f64>,
    pub crs: String,
}

impl Tile {
    pub fn manifest_row(&self) -> ManifestRow {
        ManifestRow {
            filename: self.filename.clone(),
            min_x: self.bounds.min().x,
            min_y: self.bounds.min().y,
            max_x: self.bounds.max().x,
            max_y: self.bounds.max().y,
            crs: self.crs.clone(),
        }
    }
}

/// Manifest table row: `filename,minX,minY,maxX,maxY,crs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestRow {
    pub filename: String,
    #[serde(rename = "minX")]
    pub min_x: f64,
    #[serde(rename = "minY")]
    pub min_y: f64,
    #[serde(rename = "maxX")]
    pub max_x: f64,
    #[serde(rename = "maxY")]
    pub max_y: f64,
    pub crs: String,
}

impl ManifestRow {
    pub fn bounds(&self) -> Rect<f64> {
        Rect::new(
            coord! { x: self.min_x, y: self.min_y },
            coord! { x: self.max_x, y: self.max_y },
        )
    }

    pub fn width(&self) -> f64 { self.max_x - self.min_x }
    pub fn height(&self) -> f64 { self.max_y - self.min_y }
}

/// Ordered manifest rows with a filename index. Read-only once built.
#[derive(Debug, Clone, Default)]
pub struct TileManifest {
    rows: Vec<ManifestRow>,
    by_name: HashMap<String, usize>,
}

impl TileManifest {
    pub fn from_rows(rows: Vec<ManifestRow>) -> Self {
        let mut by_name = HashMap::with_capacity(rows.len());
        for (i, r) in rows.iter().enumerate() {
            // first row wins on duplicate names
            by_name.entry(r.filename.clone()).or_insert(i);
        }
        Self { rows, by_name }
    }

    pub fn get(&self, filename: &str) -> Option<&ManifestRow> {
        self.by_name.get(filename).map(|&i| &self.rows[i])
    }

    pub fn rows(&self) -> &[ManifestRow] { &self.rows }
    pub fn len(&self) -> usize { self.rows.len() }
    pub fn is_empty(&self) -> bool { self.rows.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, min_x: f64) -> ManifestRow {
        ManifestRow {
            filename: name.into(),
            min_x,
            min_y: 0.0,
            max_x: min_x + 10.0,
            max_y: 10.0,
            crs: "EPSG:31982".into(),
        }
    }

    #[test]
    fn lookup_by_filename() {
        let m = TileManifest::from_rows(vec![row("tile_0.jpg", 0.0), row("tile_1.jpg", 8.0)]);
        assert_eq!(m.len(), 2);
        assert_eq!(m.get("tile_1.jpg").map(|r| r.min_x), Some(8.0));
        assert!(m.get("tile_9.jpg").is_none());
    }

    #[test]
    fn duplicate_names_keep_first_row() {
        let m = TileManifest::from_rows(vec![row("tile_0.jpg", 0.0), row("tile_0.jpg", 50.0)]);
        assert_eq!(m.get("tile_0.jpg").map(|r| r.min_x), Some(0.0));
        assert_eq!(m.rows().len(), 2);
    }

    #[test]
    fn tile_row_matches_bounds() {
        let tile = Tile {
            filename: "tile_3.jpg".into(),
            row: 0,
            col: 384,
            width: 512,
            height: 512,
            bounds: Rect::new(coord! { x: 100.0, y: 200.0 }, coord! { x: 151.2, y: 251.2 }),
            crs: "EPSG:31982".into(),
        };
        let r = tile.manifest_row();
        assert_eq!(r.bounds(), tile.bounds);
        assert!((r.width() - 51.2).abs() < 1e-9);
    }
}
