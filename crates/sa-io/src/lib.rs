//! `sa-io` - Strict text matrix loading and writing.
//!
//! Input files hold exactly `rows` lines of exactly `cols`
//! whitespace-separated numbers. Loading either yields a fully populated
//! [`Matrix`](sa_tensor::Matrix) or a [`ParseError`] naming the violated
//! condition.

pub mod error;
pub mod reader;
pub mod writer;

pub use error::{ParseError, Result};
pub use reader::{load_matrix, parse_matrix, parse_matrix_str};
pub use writer::{save_matrix, write_matrix};
