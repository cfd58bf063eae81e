/// Pixel window of one grid cell, clipped to the raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub col: usize,
    pub row: usize,
    pub width: usize,
    pub height: usize,
}

/// Cell origins along one axis: 0, stride, 2*stride, ... while inside `len`.
pub fn axis_origins(len: usize, tile_size: usize, overlap: usize) -> Vec<usize> {
    assert!(overlap < tile_size, "overlap must be smaller than tile size");
    (0..len).step_by(tile_size - overlap).collect()
}

/// Grid windows, one `Vec` per grid row; the last row/column is clipped,
/// never padded. Every window in a row shares its `row` and `height`.
pub fn plan_grid(width: usize, height: usize, tile_size: usize, overlap: usize) -> Vec<Vec<Window>> {
    let cols = axis_origins(width, tile_size, overlap);
    axis_origins(height, tile_size, overlap)
        .into_iter()
        .map(|row| {
            cols.iter()
                .map(|&col| Window {
                    col,
                    row,
                    width: tile_size.min(width - col),
                    height: tile_size.min(height - row),
                })
                .collect()
        })
        .collect()
}
