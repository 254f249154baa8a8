use std::path::PathBuf;

use thiserror::Error;

/// Why a matrix text source was rejected.
///
/// Line and column numbers are 1-based.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not enough rows: expected {expected}, found {found}")]
    MissingRows { expected: usize, found: usize },
    #[error("line {line}: expected {expected} values, found {found}")]
    TokenCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}, column {column}: non-numeric value {token:?}")]
    NonNumeric {
        line: usize,
        column: usize,
        token: String,
    },
    #[error("line {line}, column {column}: value {token:?} is outside the i32 range")]
    OutOfRange {
        line: usize,
        column: usize,
        token: String,
    },
    #[error("too many rows: expected {expected}, extra content starts on line {line}")]
    TrailingRows { expected: usize, line: usize },
    #[error("tensor error: {0}")]
    Tensor(#[from] sa_tensor::TensorError),
}

pub type Result<T> = std::result::Result<T, ParseError>;
