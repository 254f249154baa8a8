use std::fmt;

use tracing::{debug, debug_span, warn};

use super::kernel::{accumulate, burst_load, burst_store};
use crate::config::EngineConfig;
use crate::error::{Result, TensorError};
use crate::matrix::{check_matmul_dims, Matrix};
use crate::storage::{check_capacity, WorkingBuffer};

/// Lifecycle of a single multiply.
///
/// `Idle → Loading → Computing → WritingBack → Done`, or `Error` from any
/// non-terminal state when a precondition fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Loading,
    Computing,
    WritingBack,
    Done,
    Error,
}

impl EngineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Done | EngineState::Error)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EngineState::Idle => "idle",
            EngineState::Loading => "loading",
            EngineState::Computing => "computing",
            EngineState::WritingBack => "writing-back",
            EngineState::Done => "done",
            EngineState::Error => "error",
        };
        f.write_str(s)
    }
}

/// Counters collected while a job runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStats {
    /// Tiles moved into the A and B working buffers.
    pub tiles_loaded: usize,
    /// Reduction tiles executed.
    pub reduction_steps: usize,
    /// Multiply-accumulate operations over the true matrix extent.
    pub macs: u64,
}

/// One multiply call together with the working buffers it owns.
///
/// A job is single-use: its buffers are allocated on entry to `Loading` and
/// dropped when `run` returns, so two jobs never share storage.
pub struct MultiplyJob<'a> {
    config: EngineConfig,
    a: &'a Matrix,
    b: &'a Matrix,
    state: EngineState,
    history: Vec<EngineState>,
    allocated: bool,
    stats: JobStats,
}

impl<'a> MultiplyJob<'a> {
    pub fn new(config: EngineConfig, a: &'a Matrix, b: &'a Matrix) -> Self {
        MultiplyJob {
            config,
            a,
            b,
            state: EngineState::Idle,
            history: vec![EngineState::Idle],
            allocated: false,
            stats: JobStats::default(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Every state the job has been in, starting with `Idle`.
    pub fn history(&self) -> &[EngineState] {
        &self.history
    }

    /// Whether working buffers were ever allocated for this job.
    pub fn buffers_allocated(&self) -> bool {
        self.allocated
    }

    pub fn stats(&self) -> JobStats {
        self.stats
    }

    /// Drive the job to a terminal state and return the product.
    ///
    /// # Errors
    /// `DimensionMismatch` or `CapacityExceeded` before any buffer is
    /// allocated; `InvalidState` if the job has already finished.
    pub fn run(&mut self) -> Result<Matrix> {
        if self.state.is_terminal() {
            return Err(TensorError::InvalidState(self.state.to_string()));
        }
        match self.run_phases() {
            Ok(c) => Ok(c),
            Err(e) => {
                warn!(state = %self.state, error = %e, "multiply aborted");
                self.transition(EngineState::Error);
                Err(e)
            }
        }
    }

    fn run_phases(&mut self) -> Result<Matrix> {
        self.config.validate()?;
        let out = check_matmul_dims(self.a, self.b)?;
        let capacity = self.config.capacity;
        check_capacity("a", self.a.shape(), capacity)?;
        check_capacity("b", self.b.shape(), capacity)?;
        check_capacity("c", out, capacity)?;

        let t = self.config.tile_size;
        debug!(
            a = %self.a.shape(),
            b = %self.b.shape(),
            tile_size = t,
            "starting tiled multiply"
        );

        self.transition(EngineState::Loading);
        let mut buf_a = WorkingBuffer::new("a", capacity)?;
        let mut buf_b = WorkingBuffer::new("b", capacity)?;
        let mut buf_c = WorkingBuffer::new("c", capacity)?;
        self.allocated = true;
        {
            let _span = debug_span!("load").entered();
            self.stats.tiles_loaded += burst_load(self.a, &mut buf_a, t)?;
            self.stats.tiles_loaded += burst_load(self.b, &mut buf_b, t)?;
        }

        self.transition(EngineState::Computing);
        buf_c.bind(out)?;
        {
            let _span = debug_span!("compute").entered();
            self.stats.reduction_steps =
                accumulate(&buf_a, &buf_b, &mut buf_c, t, self.config.parallel);
        }
        self.stats.macs = (out.numel() as u64).saturating_mul(self.a.cols() as u64);

        self.transition(EngineState::WritingBack);
        let c = {
            let _span = debug_span!("write_back").entered();
            burst_store(&buf_c, out, t)?
        };

        self.transition(EngineState::Done);
        debug!(stats = ?self.stats, "tiled multiply done");
        Ok(c)
    }

    fn transition(&mut self, next: EngineState) {
        self.state = next;
        self.history.push(next);
    }
}
