use crate::backend::ComputeBackend;
use crate::element::mac;
use crate::error::{Result, TensorError};
use crate::matrix::{check_matmul_dims, Matrix};
use crate::storage::zeroed;

/// Pure-Rust CPU reference backend.
///
/// A plain triple loop over the full reduction range, with no tiling and no
/// capacity ceiling. It exists as the ground truth the tiled engine is checked
/// against and is not meant for anything latency-sensitive.
#[derive(Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn matmul(&self, a: &Matrix, b: &Matrix) -> Result<Matrix> {
        let out = check_matmul_dims(a, b)?;
        let (m, k, n) = (a.rows(), a.cols(), b.cols());
        let (a, b) = (a.data(), b.data());

        let len = out.checked_numel().ok_or(TensorError::ExtentOverflow {
            rows: out.rows(),
            cols: out.cols(),
        })?;
        let mut c = zeroed("c", len)?;
        for i in 0..m {
            for j in 0..n {
                let mut sum = 0;
                for p in 0..k {
                    sum = mac(sum, a[i * k + p], b[p * n + j]);
                }
                c[i * n + j] = sum;
            }
        }
        Matrix::new(c, m, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> CpuBackend {
        CpuBackend::new()
    }

    #[test]
    fn test_matmul_identity() {
        let b = backend();
        let a = Matrix::from_rows(&[[1, 0], [0, 1]]).unwrap();
        let x = Matrix::from_rows(&[[1, 2], [3, 4]]).unwrap();
        let c = b.matmul(&a, &x).unwrap();
        assert_eq!(c.data(), &[1, 2, 3, 4]);
    }

    #[test]
    fn test_matmul_basic() {
        let b = backend();
        // [1,2;3,4] @ [5,6;7,8] = [19,22;43,50]
        let a = Matrix::from_rows(&[[1, 2], [3, 4]]).unwrap();
        let x = Matrix::from_rows(&[[5, 6], [7, 8]]).unwrap();
        let c = b.matmul(&a, &x).unwrap();
        assert_eq!(c.data(), &[19, 22, 43, 50]);
    }

    #[test]
    fn test_matmul_rectangular() {
        let b = backend();
        // [1,2,3] @ [4;5;6] = [32]
        let a = Matrix::from_rows(&[[1, 2, 3]]).unwrap();
        let x = Matrix::from_rows(&[[4], [5], [6]]).unwrap();
        let c = b.matmul(&a, &x).unwrap();
        assert_eq!(c.rows(), 1);
        assert_eq!(c.cols(), 1);
        assert_eq!(c.data(), &[32]);
    }

    #[test]
    fn test_matmul_wraps_on_overflow() {
        let b = backend();
        let a = Matrix::from_rows(&[[i32::MAX, 1]]).unwrap();
        let x = Matrix::from_rows(&[[1], [1]]).unwrap();
        assert_eq!(b.matmul(&a, &x).unwrap().data(), &[i32::MIN]);
    }

    #[test]
    fn test_matmul_empty_reduction() {
        let b = backend();
        let a = Matrix::zeros(2, 0).unwrap();
        let x = Matrix::zeros(0, 3).unwrap();
        assert_eq!(b.matmul(&a, &x).unwrap(), Matrix::zeros(2, 3).unwrap());
    }

    #[test]
    fn test_matmul_dimension_mismatch() {
        let b = backend();
        let a = Matrix::zeros(2, 3).unwrap();
        let x = Matrix::zeros(2, 2).unwrap();
        assert!(matches!(
            b.matmul(&a, &x),
            Err(TensorError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn test_output_extent_overflow() {
        let a = Matrix::zeros(1 << 33, 0).unwrap();
        let b = Matrix::zeros(0, 1 << 33).unwrap();
        assert!(matches!(
            backend().matmul(&a, &b),
            Err(TensorError::ExtentOverflow { .. })
        ));
    }
}
