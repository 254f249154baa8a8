use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use sa_tensor::{Elem, Matrix, TiledEngine, DEFAULT_CAPACITY};

use crate::completion::{completion_pair, CompletionToken, DeviceOutcome};
use crate::error::{Result, RuntimeError};
use crate::image::KernelImage;
use crate::runtime::{
    AccessMode, AcceleratorRuntime, BufferHandle, DeviceId, DeviceInfo, KernelArgs,
    ProgramHandle, Transfer,
};

type DeviceMemory = HashMap<u64, Vec<Elem>>;

/// Description of one software-emulated device.
#[derive(Debug, Clone)]
pub struct EmulatedDevice {
    pub name: String,
    pub max_capacity: usize,
    /// Whether `load_image` succeeds on this device.
    pub programmable: bool,
    /// Artificial delay before each compute starts.
    pub latency: Duration,
    /// When set, every compute fails with this message.
    pub fault: Option<String>,
}

impl EmulatedDevice {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max_capacity: DEFAULT_CAPACITY,
            programmable: true,
            latency: Duration::ZERO,
            fault: None,
        }
    }

    pub fn with_max_capacity(mut self, max_capacity: usize) -> Self {
        self.max_capacity = max_capacity;
        self
    }

    pub fn unprogrammable(mut self) -> Self {
        self.programmable = false;
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_fault(mut self, message: impl Into<String>) -> Self {
        self.fault = Some(message.into());
        self
    }
}

/// An [`AcceleratorRuntime`] that runs the tiled engine on host threads.
///
/// Device memory is a map of buffers behind a mutex. Each enqueued compute
/// snapshots its inputs, runs on its own thread, writes the output buffer
/// and signals completion.
#[derive(Debug)]
pub struct EmulatedRuntime {
    devices: Vec<EmulatedDevice>,
    memory: Arc<Mutex<DeviceMemory>>,
    next_id: AtomicU64,
    allocations: AtomicUsize,
    parallel: bool,
}

impl EmulatedRuntime {
    pub fn new(devices: Vec<EmulatedDevice>) -> Self {
        Self {
            devices,
            memory: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            allocations: AtomicUsize::new(0),
            parallel: true,
        }
    }

    /// Run device computes on the calling worker thread only.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Number of buffers currently allocated.
    pub fn live_buffers(&self) -> usize {
        self.memory
            .lock()
            .map(|m| m.len())
            .unwrap_or_else(|poisoned| poisoned.into_inner().len())
    }

    /// Number of buffers allocated over the runtime's lifetime.
    pub fn total_allocations(&self) -> usize {
        self.allocations.load(Ordering::Relaxed)
    }

    fn memory(&self) -> Result<MutexGuard<'_, DeviceMemory>> {
        lock_memory(&self.memory).map_err(RuntimeError::ComputeFailure)
    }

    fn device(&self, id: DeviceId) -> Result<&EmulatedDevice> {
        self.devices
            .get(id.0)
            .ok_or_else(|| RuntimeError::AcceleratorUnavailable(format!("no device[{}]", id.0)))
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for EmulatedRuntime {
    fn default() -> Self {
        Self::new(vec![EmulatedDevice::new("emulated-systolic-0")])
    }
}

impl AcceleratorRuntime for EmulatedRuntime {
    fn name(&self) -> &str {
        "emulated"
    }

    fn discover(&self) -> Vec<DeviceInfo> {
        self.devices
            .iter()
            .enumerate()
            .map(|(i, d)| DeviceInfo {
                id: DeviceId(i),
                name: d.name.clone(),
                max_capacity: d.max_capacity,
            })
            .collect()
    }

    fn load_image(&self, device: &DeviceInfo, image: &[u8]) -> Result<ProgramHandle> {
        let emulated = self.device(device.id)?;
        let header = KernelImage::from_bytes(image)?;
        if !emulated.programmable {
            return Err(RuntimeError::ProgramFailed {
                device: emulated.name.clone(),
                reason: "device rejected the image".to_string(),
            });
        }
        if header.capacity() > emulated.max_capacity {
            return Err(RuntimeError::ProgramFailed {
                device: emulated.name.clone(),
                reason: format!(
                    "image needs {} elements per buffer, device has {}",
                    header.capacity(),
                    emulated.max_capacity
                ),
            });
        }
        header.engine_config()?;
        debug!(
            device = %device,
            tile_size = header.tile_size,
            capacity = header.capacity,
            "programmed"
        );
        Ok(ProgramHandle {
            id: self.next_id(),
            device: device.id,
            image: header,
        })
    }

    fn allocate_buffer(&self, len: usize, mode: AccessMode) -> Result<BufferHandle> {
        let id = self.next_id();
        self.memory()?.insert(id, vec![0; len]);
        self.allocations.fetch_add(1, Ordering::Relaxed);
        debug!(id, len, ?mode, "allocated device buffer");
        Ok(BufferHandle { id, len, mode })
    }

    fn release_buffer(&self, buffer: &BufferHandle) {
        match self.memory() {
            Ok(mut memory) => {
                memory.remove(&buffer.id);
            }
            Err(e) => warn!(id = buffer.id, "cannot release buffer: {e}"),
        }
    }

    fn transfer(&self, buffer: &BufferHandle, transfer: Transfer<'_>) -> Result<()> {
        if transfer.len() > buffer.len {
            return Err(RuntimeError::InvalidBuffer(format!(
                "{} transfer of {} elements into buffer {} of {}",
                transfer.direction(),
                transfer.len(),
                buffer.id,
                buffer.len
            )));
        }
        let direction = transfer.direction();
        let mut memory = self.memory()?;
        let data = memory
            .get_mut(&buffer.id)
            .ok_or_else(|| RuntimeError::InvalidBuffer(format!("unknown buffer {}", buffer.id)))?;
        let len = transfer.len();
        let region = data.get_mut(..len).ok_or_else(|| {
            RuntimeError::InvalidBuffer(format!("buffer {} is shorter than {len}", buffer.id))
        })?;
        match transfer {
            Transfer::ToDevice(src) => region.copy_from_slice(src),
            Transfer::ToHost(dst) => dst.copy_from_slice(region),
        }
        debug!(id = buffer.id, len, %direction, "transfer complete");
        Ok(())
    }

    fn enqueue_compute(
        &self,
        program: &ProgramHandle,
        args: &KernelArgs,
    ) -> Result<CompletionToken> {
        let device = self.device(program.device)?.clone();
        let readable = AccessMode::kernel_readable;
        let a_len = operand_len(&args.a, "a", args.a_rows, args.a_cols, readable)?;
        let b_len = operand_len(&args.b, "b", args.a_cols, args.b_cols, readable)?;
        operand_len(&args.c, "c", args.a_rows, args.b_cols, AccessMode::kernel_writable)?;

        let config = program.image.engine_config()?.with_parallel(self.parallel);
        let engine = TiledEngine::new(config)?;

        let (a, b) = {
            let memory = self.memory()?;
            let a = snapshot(&memory, &args.a, a_len)?;
            let b = snapshot(&memory, &args.b, b_len)?;
            (
                Matrix::new(a, args.a_rows, args.a_cols)?,
                Matrix::new(b, args.a_cols, args.b_cols)?,
            )
        };

        let (signal, token) = completion_pair();
        let memory = Arc::clone(&self.memory);
        let c_id = args.c.id;
        info!(device = %device.name, a = %a.shape(), b = %b.shape(), "enqueued compute");

        thread::Builder::new()
            .name(format!("{}-compute", device.name))
            .spawn(move || {
                if !device.latency.is_zero() {
                    thread::sleep(device.latency);
                }
                let outcome = match device.fault {
                    Some(message) => Err(message),
                    None => compute(&engine, &a, &b, &memory, c_id),
                };
                signal.complete(outcome);
            })?;
        Ok(token)
    }
}

fn lock_memory(
    memory: &Mutex<DeviceMemory>,
) -> std::result::Result<MutexGuard<'_, DeviceMemory>, String> {
    memory
        .lock()
        .map_err(|_| "device memory lock poisoned".to_string())
}

/// Check a kernel argument against its access mode and the operand extent;
/// returns the number of elements the kernel touches.
fn operand_len(
    buffer: &BufferHandle,
    operand: &str,
    rows: usize,
    cols: usize,
    allowed: fn(AccessMode) -> bool,
) -> Result<usize> {
    if !allowed(buffer.mode) {
        return Err(RuntimeError::InvalidBuffer(format!(
            "operand {operand} has access mode {:?}",
            buffer.mode
        )));
    }
    let len = rows.checked_mul(cols).ok_or_else(|| {
        RuntimeError::InvalidBuffer(format!("operand {operand} extent {rows}x{cols} overflows"))
    })?;
    if len > buffer.len {
        return Err(RuntimeError::InvalidBuffer(format!(
            "operand {operand} needs {len} elements, buffer {} holds {}",
            buffer.id, buffer.len
        )));
    }
    Ok(len)
}

fn snapshot(memory: &DeviceMemory, buffer: &BufferHandle, len: usize) -> Result<Vec<Elem>> {
    memory
        .get(&buffer.id)
        .and_then(|data| data.get(..len))
        .map(<[Elem]>::to_vec)
        .ok_or_else(|| RuntimeError::InvalidBuffer(format!("unknown buffer {}", buffer.id)))
}

fn compute(
    engine: &TiledEngine,
    a: &Matrix,
    b: &Matrix,
    memory: &Mutex<DeviceMemory>,
    c_id: u64,
) -> DeviceOutcome {
    let c = engine.multiply(a, b).map_err(|e| e.to_string())?;
    let mut memory = lock_memory(memory)?;
    let out = memory
        .get_mut(&c_id)
        .and_then(|data| data.get_mut(..c.data().len()))
        .ok_or_else(|| format!("output buffer {c_id} was released"))?;
    out.copy_from_slice(c.data());
    Ok(())
}
