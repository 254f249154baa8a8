use std::time::Duration;

use thiserror::Error;

/// Failures of the accelerator runtime and the host offload driver.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("no accelerator could be programmed: {0}")]
    AcceleratorUnavailable(String),
    #[error("failed to program device {device}: {reason}")]
    ProgramFailed { device: String, reason: String },
    #[error("compute failed: {0}")]
    ComputeFailure(String),
    #[error("invalid kernel image: {0}")]
    InvalidImage(String),
    #[error("unsupported kernel image version: {0}")]
    UnsupportedImageVersion(u32),
    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),
    #[error("timed out after {0:?} waiting for completion")]
    Timeout(Duration),
    #[error("wait cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Tensor(#[from] sa_tensor::TensorError),
}

pub type Result<T> = std::result::Result<T, RuntimeError>;
