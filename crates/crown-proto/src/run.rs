use serde::{Deserialize, Serialize};

/// Written once by the tiler, read by the results stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub crs: String,
    pub algorithm: String,
    pub tile_size: u32,
    pub overlap: u32,
}
