pub mod detection;
pub mod run;
pub mod tile;

pub use detection::{FinalDetection, ProjectedDetection, RawDetection};
pub use run::RunConfig;
pub use tile::{ManifestRow, Tile, TileManifest};
