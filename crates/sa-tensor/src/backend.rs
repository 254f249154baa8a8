use std::fmt::Debug;

use crate::error::Result;
use crate::matrix::Matrix;

/// Trait for pluggable matrix-multiply backends.
///
/// The naive [`CpuBackend`](crate::CpuBackend) is the correctness oracle; the
/// [`TiledEngine`](crate::TiledEngine) models the fixed-capacity accelerator
/// kernel. Both must produce bit-identical results for the same inputs.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu", "tiled").
    fn name(&self) -> &str;

    /// Matrix multiplication: C = A @ B.
    ///
    /// - `a`: shape [m, k]
    /// - `b`: shape [k, n]
    /// - Returns: shape [m, n]
    ///
    /// Fails with `DimensionMismatch` when `a.cols() != b.rows()`.
    fn matmul(&self, a: &Matrix, b: &Matrix) -> Result<Matrix>;
}
