//! Burst transfers and the systolic accumulation pass.

use tracing::trace;

use crate::element::{mac, Elem};
use crate::error::Result;
use crate::matrix::Matrix;
use crate::shape::Shape;
use crate::storage::WorkingBuffer;
use crate::tile::{tiles, BlockIterator};

/// Copy `src` into `dst` tile by tile, one contiguous tile row per burst.
///
/// Returns the number of tiles moved.
pub(crate) fn burst_load(src: &Matrix, dst: &mut WorkingBuffer, tile_size: usize) -> Result<usize> {
    dst.bind(src.shape())?;
    let cols = src.cols();
    let data = src.data();
    let mut moved = 0;
    for tile in tiles(src.shape(), tile_size) {
        for i in tile.row..tile.row + tile.rows {
            let start = i * cols + tile.col;
            dst.write_run(i, tile.col, &data[start..start + tile.cols])?;
        }
        moved += 1;
    }
    Ok(moved)
}

/// Copy the `out` region of `src` into a fresh matrix in the same tile-major
/// burst order as [`burst_load`].
pub(crate) fn burst_store(src: &WorkingBuffer, out: Shape, tile_size: usize) -> Result<Matrix> {
    let cols = out.cols();
    let mut data = vec![0; out.numel()];
    for tile in tiles(out, tile_size) {
        for i in tile.row..tile.row + tile.rows {
            let start = i * cols + tile.col;
            data[start..start + tile.cols].copy_from_slice(src.read_run(i, tile.col, tile.cols)?);
        }
    }
    Matrix::new(data, out.rows(), out.cols())
}

/// Run every reduction tile over the whole output.
///
/// Reduction tiles run strictly in order because each cell's accumulator is
/// carried from one to the next. Within a reduction tile, output tile-rows
/// touch disjoint cells and are handed to [`for_each_tile_row`].
pub(crate) fn accumulate(
    a: &WorkingBuffer,
    b: &WorkingBuffer,
    c: &mut WorkingBuffer,
    tile_size: usize,
    parallel: bool,
) -> usize {
    let reduction = a.extent().cols();
    let out_cols = c.extent().cols();
    if out_cols == 0 || c.extent().rows() == 0 {
        return 0;
    }

    let mut steps = 0;
    for (kk, k_len) in BlockIterator::new(reduction, tile_size) {
        trace!(kk, k_len, "reduction tile");
        for_each_tile_row(
            c.as_mut_slice(),
            tile_size.saturating_mul(out_cols),
            parallel,
            |(tile_row, block): (usize, &mut [Elem])| {
                let pass = ReductionPass {
                    a,
                    b,
                    row0: tile_row * tile_size,
                    out_cols,
                    kk,
                    k_len,
                    tile_size,
                };
                pass.run(block);
            },
        );
        steps += 1;
    }
    steps
}

/// One reduction tile applied to one output tile-row.
struct ReductionPass<'a> {
    a: &'a WorkingBuffer,
    b: &'a WorkingBuffer,
    row0: usize,
    out_cols: usize,
    kk: usize,
    k_len: usize,
    tile_size: usize,
}

impl ReductionPass<'_> {
    fn run(&self, block: &mut [Elem]) {
        let first = self.kk == 0;
        for (jj, j_len) in BlockIterator::new(self.out_cols, self.tile_size) {
            for (di, out_row) in block.chunks_mut(self.out_cols).enumerate() {
                let i = self.row0 + di;
                for j in jj..jj + j_len {
                    // The accumulator is reset only by the first reduction tile.
                    let mut acc = if first { 0 } else { out_row[j] };
                    for k in self.kk..self.kk + self.k_len {
                        let a_val = self.a.get(i, k).unwrap_or(0);
                        let b_val = self.b.get(k, j).unwrap_or(0);
                        acc = mac(acc, a_val, b_val);
                    }
                    out_row[j] = acc;
                }
            }
        }
    }
}

#[cfg(feature = "rayon")]
fn for_each_tile_row<F>(out: &mut [Elem], chunk: usize, parallel: bool, f: F)
where
    F: Fn((usize, &mut [Elem])) + Sync + Send,
{
    use rayon::prelude::*;

    if parallel {
        out.par_chunks_mut(chunk).enumerate().for_each(f);
    } else {
        out.chunks_mut(chunk).enumerate().for_each(f);
    }
}

#[cfg(not(feature = "rayon"))]
fn for_each_tile_row<F>(out: &mut [Elem], chunk: usize, _parallel: bool, f: F)
where
    F: Fn((usize, &mut [Elem])) + Sync + Send,
{
    out.chunks_mut(chunk).enumerate().for_each(f);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_roundtrip_partial_tiles() {
        let m = Matrix::from_fn(5, 7, |i, j| (i * 7 + j) as i32).unwrap();
        let mut buf = WorkingBuffer::new("a", 64).unwrap();
        assert_eq!(burst_load(&m, &mut buf, 3).unwrap(), 6);
        assert_eq!(buf.as_slice(), m.data());
        assert_eq!(burst_store(&buf, m.shape(), 3).unwrap(), m);
    }

    #[test]
    fn test_burst_load_over_capacity() {
        let m = Matrix::zeros(4, 4).unwrap();
        let mut buf = WorkingBuffer::new("a", 8).unwrap();
        assert!(burst_load(&m, &mut buf, 2).is_err());
    }

    #[test]
    fn test_accumulate_counts_reduction_steps() {
        let a = Matrix::from_fn(3, 5, |i, j| (i + j) as i32).unwrap();
        let b = Matrix::from_fn(5, 2, |i, j| (i * j) as i32).unwrap();
        let mut ba = WorkingBuffer::new("a", 32).unwrap();
        let mut bb = WorkingBuffer::new("b", 32).unwrap();
        burst_load(&a, &mut ba, 2).unwrap();
        burst_load(&b, &mut bb, 2).unwrap();
        let mut bc = WorkingBuffer::for_extent("c", 32, Shape::new(3, 2)).unwrap();
        assert_eq!(accumulate(&ba, &bb, &mut bc, 2, false), 3);
    }

    #[test]
    fn test_accumulate_overwrites_stale_output() {
        // A dirty output buffer must not leak into the result: the first
        // reduction tile resets every accumulator.
        let a = Matrix::from_rows(&[[1, 2], [3, 4]]).unwrap();
        let b = Matrix::from_rows(&[[5, 6], [7, 8]]).unwrap();
        let mut ba = WorkingBuffer::new("a", 4).unwrap();
        let mut bb = WorkingBuffer::new("b", 4).unwrap();
        burst_load(&a, &mut ba, 1).unwrap();
        burst_load(&b, &mut bb, 1).unwrap();
        let mut bc = WorkingBuffer::for_extent("c", 4, Shape::new(2, 2)).unwrap();
        bc.as_mut_slice().fill(99);
        accumulate(&ba, &bb, &mut bc, 1, false);
        assert_eq!(bc.as_slice(), &[19, 22, 43, 50]);
    }

    #[test]
    fn test_tile_larger_than_any_extent() {
        let a = Matrix::from_rows(&[[1, 2], [3, 4]]).unwrap();
        let b = Matrix::from_rows(&[[5, 6], [7, 8]]).unwrap();
        let mut ba = WorkingBuffer::new("a", 4).unwrap();
        let mut bb = WorkingBuffer::new("b", 4).unwrap();
        burst_load(&a, &mut ba, usize::MAX).unwrap();
        burst_load(&b, &mut bb, usize::MAX).unwrap();
        let mut bc = WorkingBuffer::for_extent("c", 4, Shape::new(2, 2)).unwrap();
        assert_eq!(accumulate(&ba, &bb, &mut bc, usize::MAX, true), 1);
        assert_eq!(bc.as_slice(), &[19, 22, 43, 50]);
    }
}
