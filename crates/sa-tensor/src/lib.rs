//! `sa-tensor` - Integer matrices and the tiled systolic-array multiply engine.
//!
//! This crate provides:
//! - A row-major `Matrix` of `i32` elements
//! - A `ComputeBackend` trait for pluggable multiply implementations
//! - `TiledEngine`, the fixed-capacity tiled engine with bounded working buffers
//! - `CpuBackend`, the naive reference multiply used as the correctness oracle
//! - `verify::compare`, the element-wise result verifier

pub mod backend;
pub mod config;
pub mod cpu;
pub mod element;
pub mod error;
pub mod matrix;
pub mod shape;
pub mod storage;
pub mod tile;
pub mod tiled;
pub mod verify;

// Re-export primary types at the crate root for convenience.
pub use backend::ComputeBackend;
pub use config::{EngineConfig, DEFAULT_CAPACITY, DEFAULT_TILE_SIZE, MAX_CAPACITY, MAX_DIM};
pub use cpu::CpuBackend;
pub use element::Elem;
pub use error::{Result, TensorError};
pub use matrix::Matrix;
pub use shape::Shape;
pub use storage::WorkingBuffer;
pub use tiled::{EngineState, JobStats, MultiplyJob, TiledEngine};
pub use verify::{compare, Mismatch, VerifyResult};
