use std::fmt;

use crate::element::Elem;
use crate::error::{Result, TensorError};
use crate::matrix::Matrix;

/// The first element where two matrices disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mismatch {
    /// Linear row-major index.
    pub index: usize,
    pub row: usize,
    pub col: usize,
    /// Value from the reference (software) result.
    pub expected: Elem,
    /// Value from the result under test.
    pub actual: Elem,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "i = {} ({}, {}) expected {} got {}",
            self.index, self.row, self.col, self.expected, self.actual
        )
    }
}

/// Outcome of comparing a result against the reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifyResult {
    pub pass: bool,
    pub first_mismatch: Option<Mismatch>,
}

impl VerifyResult {
    /// Turn a failed verification into a `ResultMismatch` error.
    pub fn into_result(self) -> Result<()> {
        match self.first_mismatch {
            None => Ok(()),
            Some(m) => Err(TensorError::ResultMismatch {
                index: m.index,
                expected: m.expected,
                actual: m.actual,
            }),
        }
    }
}

/// Compare `hw` against the reference `sw`, stopping at the first mismatch.
///
/// # Errors
/// Returns `ShapeMismatch` if the two matrices have different shapes.
pub fn compare(hw: &Matrix, sw: &Matrix) -> Result<VerifyResult> {
    if hw.shape() != sw.shape() {
        return Err(TensorError::ShapeMismatch {
            expected: sw.shape().into(),
            got: hw.shape().into(),
        });
    }

    let first_mismatch = hw
        .data()
        .iter()
        .zip(sw.data())
        .position(|(h, s)| h != s)
        .and_then(|index| {
            let (row, col) = sw.shape().coords(index)?;
            Some(Mismatch {
                index,
                row,
                col,
                expected: sw.data()[index],
                actual: hw.data()[index],
            })
        });

    Ok(VerifyResult {
        pass: first_mismatch.is_none(),
        first_mismatch,
    })
}
