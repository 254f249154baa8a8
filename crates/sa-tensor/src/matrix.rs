use crate::backend::ComputeBackend;
use crate::element::Elem;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::storage::zeroed;

/// A dense row-major integer matrix.
///
/// Invariant: `data.len() == shape.numel()`. Every constructor checks it, so a
/// `Matrix` is always fully populated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Matrix {
    data: Vec<Elem>,
    shape: Shape,
}

impl Matrix {
    /// Create a matrix from row-major data.
    ///
    /// # Errors
    /// Returns `LengthMismatch` if `data.len() != rows * cols`.
    pub fn new(data: Vec<Elem>, rows: usize, cols: usize) -> Result<Self> {
        let shape = Shape::new(rows, cols);
        if data.len() != shape.numel() {
            return Err(TensorError::LengthMismatch {
                rows,
                cols,
                got: data.len(),
            });
        }
        Ok(Matrix { data, shape })
    }

    /// Create a matrix from a slice of equally long rows.
    pub fn from_rows<R: AsRef<[Elem]>>(rows: &[R]) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map_or(0, |r| r.as_ref().len());
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for row in rows {
            let row = row.as_ref();
            if row.len() != n_cols {
                return Err(TensorError::ShapeMismatch {
                    expected: (n_rows, n_cols),
                    got: (n_rows, row.len()),
                });
            }
            data.extend_from_slice(row);
        }
        Matrix::new(data, n_rows, n_cols)
    }

    /// Create a zero-filled matrix.
    ///
    /// # Errors
    /// `ExtentOverflow` if `rows * cols` overflows, `AllocationFailed` if the
    /// allocator refuses.
    pub fn zeros(rows: usize, cols: usize) -> Result<Self> {
        let len = checked_len(rows, cols)?;
        Ok(Matrix {
            data: zeroed("matrix", len)?,
            shape: Shape::new(rows, cols),
        })
    }

    /// Create an identity matrix of size `n`.
    pub fn identity(n: usize) -> Result<Self> {
        let mut m = Matrix::zeros(n, n)?;
        for i in 0..n {
            m.data[i * n + i] = 1;
        }
        Ok(m)
    }

    /// Create a matrix whose element `(i, j)` is `f(i, j)`.
    ///
    /// # Errors
    /// Same as [`Matrix::zeros`]; `f` is not called on failure.
    pub fn from_fn(
        rows: usize,
        cols: usize,
        mut f: impl FnMut(usize, usize) -> Elem,
    ) -> Result<Self> {
        let len = checked_len(rows, cols)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| TensorError::AllocationFailed {
                operand: "matrix",
                requested: len,
            })?;
        for i in 0..rows {
            for j in 0..cols {
                data.push(f(i, j));
            }
        }
        Ok(Matrix {
            data,
            shape: Shape::new(rows, cols),
        })
    }

    pub fn shape(&self) -> Shape {
        self.shape
    }

    pub fn rows(&self) -> usize {
        self.shape.rows()
    }

    pub fn cols(&self) -> usize {
        self.shape.cols()
    }

    /// Element at `(row, col)`, or `None` outside the matrix.
    pub fn get(&self, row: usize, col: usize) -> Option<Elem> {
        self.shape.offset(row, col).map(|i| self.data[i])
    }

    /// One row as a slice, or `None` if `row` is out of range.
    pub fn row(&self, row: usize) -> Option<&[Elem]> {
        if row >= self.rows() {
            return None;
        }
        let start = row * self.cols();
        Some(&self.data[start..start + self.cols()])
    }

    /// The row-major element buffer.
    pub fn data(&self) -> &[Elem] {
        &self.data
    }

    /// Multiply `self @ other` with the given backend.
    pub fn matmul(&self, other: &Matrix, backend: &dyn ComputeBackend) -> Result<Matrix> {
        backend.matmul(self, other)
    }
}

fn checked_len(rows: usize, cols: usize) -> Result<usize> {
    Shape::new(rows, cols)
        .checked_numel()
        .ok_or(TensorError::ExtentOverflow { rows, cols })
}

/// Checks that `a @ b` is defined and returns the output shape.
pub fn check_matmul_dims(a: &Matrix, b: &Matrix) -> Result<Shape> {
    if a.cols() != b.rows() {
        return Err(TensorError::DimensionMismatch {
            m: a.rows(),
            k: a.cols(),
            k2: b.rows(),
            n: b.cols(),
        });
    }
    Ok(Shape::new(a.rows(), b.cols()))
}
