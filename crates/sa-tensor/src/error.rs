use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TensorError {
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        got: (usize, usize),
    },
    #[error("data length {got} does not match a {rows}x{cols} matrix")]
    LengthMismatch { rows: usize, cols: usize, got: usize },
    #[error("matmul dimension mismatch: [{m}x{k}] @ [{k2}x{n}]")]
    DimensionMismatch {
        m: usize,
        k: usize,
        k2: usize,
        n: usize,
    },
    #[error("{operand} needs {requested} elements but working buffer capacity is {capacity}")]
    CapacityExceeded {
        operand: &'static str,
        requested: usize,
        capacity: usize,
    },
    #[error("a {rows}x{cols} matrix does not fit in the address space")]
    ExtentOverflow { rows: usize, cols: usize },
    #[error("cannot allocate {requested} elements for {operand}")]
    AllocationFailed {
        operand: &'static str,
        requested: usize,
    },
    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),
    #[error("multiply job is in terminal state {0}")]
    InvalidState(String),
    #[error("result mismatch at index {index}: expected {expected}, got {actual}")]
    ResultMismatch {
        index: usize,
        expected: i32,
        actual: i32,
    },
}

pub type Result<T> = std::result::Result<T, TensorError>;
