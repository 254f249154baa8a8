use crate::shape::Shape;

/// A rectangular sub-region of a matrix, possibly partial at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    /// Tile coordinates in the tile grid.
    pub tile_row: usize,
    pub tile_col: usize,
    /// First element row / column covered by the tile.
    pub row: usize,
    pub col: usize,
    /// Number of rows / columns actually covered (`<= tile_size`).
    pub rows: usize,
    pub cols: usize,
}

/// Iterator over `(start, len)` blocks of a single axis.
pub struct BlockIterator {
    total: usize,
    block_size: usize,
    current: usize,
}

impl BlockIterator {
    /// `block_size` must be non-zero.
    pub fn new(total: usize, block_size: usize) -> Self {
        Self {
            total,
            block_size,
            current: 0,
        }
    }
}

impl Iterator for BlockIterator {
    type Item = (usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        if self.current >= self.total {
            return None;
        }

        let start = self.current;
        let len = (self.total - start).min(self.block_size);
        self.current += len;

        Some((start, len))
    }
}

/// Iterates the tiles of `shape` in tile-major order: tile-rows outermost,
/// tile-columns inside. This is the burst order used for loads and writeback.
pub fn tiles(shape: Shape, tile_size: usize) -> impl Iterator<Item = Tile> {
    BlockIterator::new(shape.rows(), tile_size)
        .enumerate()
        .flat_map(move |(tile_row, (row, rows))| {
            BlockIterator::new(shape.cols(), tile_size)
                .enumerate()
                .map(move |(tile_col, (col, cols))| Tile {
                    tile_row,
                    tile_col,
                    row,
                    col,
                    rows,
                    cols,
                })
        })
}
