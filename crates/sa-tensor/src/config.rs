use crate::element::Elem;
use crate::error::{Result, TensorError};

/// Tile edge length of the reference kernel.
pub const DEFAULT_TILE_SIZE: usize = 16;

/// Largest matrix edge the reference kernel's on-chip arrays were sized for.
pub const MAX_DIM: usize = 1536;

/// Default capacity ceiling, in elements, of one working buffer.
pub const DEFAULT_CAPACITY: usize = MAX_DIM * MAX_DIM;

/// Largest working buffer capacity, in elements, a single allocation can describe.
pub const MAX_CAPACITY: usize = isize::MAX as usize / std::mem::size_of::<Elem>();

/// Configuration of a [`TiledEngine`](crate::TiledEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Edge length of the square tiles used for transfer and accumulation.
    pub tile_size: usize,
    /// Maximum number of elements one working buffer may hold.
    pub capacity: usize,
    /// Evaluate output tile-rows of a reduction step on the rayon pool.
    pub parallel: bool,
}

impl EngineConfig {
    pub const fn new(tile_size: usize, capacity: usize) -> Self {
        Self {
            tile_size,
            capacity,
            parallel: true,
        }
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Check that the configuration can drive a multiply.
    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(TensorError::InvalidConfig(
                "tile_size must be non-zero".to_string(),
            ));
        }
        if self.tile_size > MAX_DIM {
            return Err(TensorError::InvalidConfig(format!(
                "tile_size {} exceeds {MAX_DIM}",
                self.tile_size
            )));
        }
        if self.capacity == 0 {
            return Err(TensorError::InvalidConfig(
                "capacity must be non-zero".to_string(),
            ));
        }
        if self.capacity > MAX_CAPACITY {
            return Err(TensorError::InvalidConfig(format!(
                "capacity {} exceeds {MAX_CAPACITY}",
                self.capacity
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TILE_SIZE, DEFAULT_CAPACITY)
    }
}
