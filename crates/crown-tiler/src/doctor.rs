use anyhow::Result;

pub fn check_tiling(tile_size: u32, overlap: u32) -> Result<()> {
    anyhow::ensure!(tile_size >= 32, "tile_size too small: {}", tile_size);
    anyhow::ensure!(overlap < tile_size, "overlap ({}) must be smaller than tile_size ({})", overlap, tile_size);
    Ok(())
}

pub fn check_sampling(max_distance: f64, max_images: usize) -> Result<()> {
    anyhow::ensure!(max_distance > 0.0, "sampling.max_distance must be positive");
    anyhow::ensure!(max_images >= 1, "sampling.max_images must be >= 1");
    Ok(())
}
