use std::time::{Duration, Instant};

use tracing::{debug, info, info_span, warn};

use sa_tensor::matrix::check_matmul_dims;
use sa_tensor::storage::check_capacity;
use sa_tensor::{compare, Matrix};

use crate::completion::WaitOptions;
use crate::error::{Result, RuntimeError};
use crate::image::KernelImage;
use crate::runtime::{
    AccessMode, AcceleratorRuntime, BufferHandle, DeviceInfo, KernelArgs, ProgramHandle,
    Transfer,
};

/// Host driver settings.
#[derive(Debug, Clone, Default)]
pub struct DriverConfig {
    pub wait: WaitOptions,
    /// Read each input back after upload and compare it with the host copy.
    pub verify_upload: bool,
}

/// Wall-clock time spent in each offload phase.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OffloadTimings {
    pub program: Duration,
    pub upload: Duration,
    pub compute: Duration,
    pub download: Duration,
}

impl OffloadTimings {
    pub fn total(&self) -> Duration {
        self.program + self.upload + self.compute + self.download
    }
}

/// Result of one offloaded multiply.
#[derive(Debug, Clone)]
pub struct OffloadReport {
    pub output: Matrix,
    pub device: DeviceInfo,
    pub timings: OffloadTimings,
    /// Multiply-accumulate operations performed (`M * N * P`).
    pub macs: u64,
}

impl OffloadReport {
    /// Throughput of the compute phase in giga-operations per second,
    /// counting a multiply-accumulate as two operations.
    pub fn gops(&self) -> f64 {
        let secs = self.timings.compute.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        2.0 * self.macs as f64 / secs / 1e9
    }
}

/// Runs a multiply on an accelerator: program a device, move the operands
/// over, compute, and read the product back.
#[derive(Debug)]
pub struct HostDriver<R> {
    runtime: R,
    config: DriverConfig,
}

impl<R: AcceleratorRuntime> HostDriver<R> {
    pub fn new(runtime: R, config: DriverConfig) -> Self {
        Self { runtime, config }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Program the first discovered device that accepts `image`.
    pub fn program(&self, image: &[u8]) -> Result<(DeviceInfo, ProgramHandle)> {
        let header = KernelImage::from_bytes(image)?;
        debug!(tile_size = header.tile_size, capacity = header.capacity, "kernel image");

        let devices = self.runtime.discover();
        if devices.is_empty() {
            return Err(RuntimeError::AcceleratorUnavailable(format!(
                "runtime {} reports no devices",
                self.runtime.name()
            )));
        }

        let count = devices.len();
        let mut last_error = None;
        for device in devices {
            info!("Trying to program {device}");
            match self.runtime.load_image(&device, image) {
                Ok(program) => {
                    info!("Programmed {device} with kernel image");
                    return Ok((device, program));
                }
                Err(e) => {
                    warn!("Failed to program {device}: {e}");
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        Err(RuntimeError::AcceleratorUnavailable(format!(
            "{count} device(s) tried, last error: {reason}"
        )))
    }

    /// Compute `a x b` on an already programmed device.
    ///
    /// Dimensions and buffer capacity are checked before any device buffer
    /// is allocated. Device buffers are released on every exit path.
    pub fn offload(
        &self,
        program: &ProgramHandle,
        a: &Matrix,
        b: &Matrix,
    ) -> Result<(Matrix, OffloadTimings)> {
        let out_shape = check_matmul_dims(a, b)?;
        let capacity = program.image.capacity();
        check_capacity("a", a.shape(), capacity)?;
        check_capacity("b", b.shape(), capacity)?;
        check_capacity("c", out_shape, capacity)?;

        let _span = info_span!("offload", a = %a.shape(), b = %b.shape()).entered();
        let mut timings = OffloadTimings::default();

        let a_buf = DeviceBuffer::allocate(&self.runtime, a.data().len(), AccessMode::ReadOnly)?;
        let b_buf = DeviceBuffer::allocate(&self.runtime, b.data().len(), AccessMode::ReadOnly)?;
        let c_buf =
            DeviceBuffer::allocate(&self.runtime, out_shape.numel(), AccessMode::WriteOnly)?;

        let start = Instant::now();
        self.runtime.transfer(&a_buf.handle, Transfer::ToDevice(a.data()))?;
        self.runtime.transfer(&b_buf.handle, Transfer::ToDevice(b.data()))?;
        if self.config.verify_upload {
            self.verify_upload("a", &a_buf.handle, a)?;
            self.verify_upload("b", &b_buf.handle, b)?;
        }
        timings.upload = start.elapsed();

        let args = KernelArgs {
            a: a_buf.handle,
            b: b_buf.handle,
            c: c_buf.handle,
            a_rows: a.rows(),
            a_cols: a.cols(),
            b_cols: b.cols(),
        };
        let start = Instant::now();
        let token = self.runtime.enqueue_compute(program, &args)?;
        self.runtime.wait(token, &self.config.wait)?;
        timings.compute = start.elapsed();

        let start = Instant::now();
        let mut out = vec![0; out_shape.numel()];
        self.runtime.transfer(&c_buf.handle, Transfer::ToHost(&mut out))?;
        timings.download = start.elapsed();

        debug!(?timings, "offload complete");
        Ok((Matrix::new(out, out_shape.rows(), out_shape.cols())?, timings))
    }

    /// Program a device with `image`, then offload `a x b` to it.
    pub fn run(&self, image: &[u8], a: &Matrix, b: &Matrix) -> Result<OffloadReport> {
        check_matmul_dims(a, b)?;

        let start = Instant::now();
        let (device, program) = self.program(image)?;
        let program_time = start.elapsed();

        let (output, mut timings) = self.offload(&program, a, b)?;
        timings.program = program_time;
        let macs = (a.rows() as u64) * (a.cols() as u64) * (b.cols() as u64);
        Ok(OffloadReport {
            output,
            device,
            timings,
            macs,
        })
    }

    fn verify_upload(&self, operand: &str, buffer: &BufferHandle, host: &Matrix) -> Result<()> {
        let mut readback = vec![0; host.data().len()];
        self.runtime.transfer(buffer, Transfer::ToHost(&mut readback))?;
        let device_copy = Matrix::new(readback, host.rows(), host.cols())?;
        match compare(&device_copy, host)?.first_mismatch {
            Some(mismatch) => Err(RuntimeError::ComputeFailure(format!(
                "upload of {operand} corrupted: {mismatch}"
            ))),
            None => {
                debug!(operand, "upload verified");
                Ok(())
            }
        }
    }
}

/// A device buffer released when dropped.
struct DeviceBuffer<'r, R: AcceleratorRuntime> {
    runtime: &'r R,
    handle: BufferHandle,
}

impl<'r, R: AcceleratorRuntime> DeviceBuffer<'r, R> {
    fn allocate(runtime: &'r R, len: usize, mode: AccessMode) -> Result<Self> {
        let handle = runtime.allocate_buffer(len, mode)?;
        Ok(Self { runtime, handle })
    }
}

impl<R: AcceleratorRuntime> Drop for DeviceBuffer<'_, R> {
    fn drop(&mut self) {
        self.runtime.release_buffer(&self.handle);
    }
}
