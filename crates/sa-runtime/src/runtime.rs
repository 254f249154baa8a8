use std::fmt;

use sa_tensor::Elem;

use crate::completion::{CompletionToken, WaitOptions};
use crate::error::Result;
use crate::image::KernelImage;

/// Index of a device within one runtime's discovery list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub usize);

/// A device reported by [`AcceleratorRuntime::discover`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    /// Largest working buffer capacity, in elements, the device can be programmed with.
    pub max_capacity: usize,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device[{}]: {}", self.id.0, self.name)
    }
}

/// A device programmed with a kernel image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramHandle {
    pub id: u64,
    pub device: DeviceId,
    pub image: KernelImage,
}

/// Kernel-side access a device buffer is allocated with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl AccessMode {
    pub fn kernel_readable(self) -> bool {
        matches!(self, AccessMode::ReadOnly | AccessMode::ReadWrite)
    }

    pub fn kernel_writable(self) -> bool {
        matches!(self, AccessMode::WriteOnly | AccessMode::ReadWrite)
    }
}

/// A device buffer of `len` elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle {
    pub id: u64,
    pub len: usize,
    pub mode: AccessMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferDirection {
    HostToDevice,
    DeviceToHost,
}

impl fmt::Display for TransferDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferDirection::HostToDevice => write!(f, "host-to-device"),
            TransferDirection::DeviceToHost => write!(f, "device-to-host"),
        }
    }
}

/// Host memory taking part in one transfer. The variant fixes the direction.
#[derive(Debug)]
pub enum Transfer<'a> {
    ToDevice(&'a [Elem]),
    ToHost(&'a mut [Elem]),
}

impl Transfer<'_> {
    pub fn direction(&self) -> TransferDirection {
        match self {
            Transfer::ToDevice(_) => TransferDirection::HostToDevice,
            Transfer::ToHost(_) => TransferDirection::DeviceToHost,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Transfer::ToDevice(src) => src.len(),
            Transfer::ToHost(dst) => dst.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Arguments of the multiply kernel: `c = a x b` with `a` of
/// `a_rows x a_cols` and `b` of `a_cols x b_cols`, all row-major.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelArgs {
    pub a: BufferHandle,
    pub b: BufferHandle,
    pub c: BufferHandle,
    pub a_rows: usize,
    pub a_cols: usize,
    pub b_cols: usize,
}

/// Narrow interface to an accelerator: discovery, programming, buffers,
/// transfers and asynchronous compute.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait AcceleratorRuntime: Send + Sync + fmt::Debug {
    /// Human-readable runtime name (e.g. "emulated").
    fn name(&self) -> &str;

    /// List the devices this runtime can drive.
    fn discover(&self) -> Vec<DeviceInfo>;

    /// Program `device` with a kernel image.
    fn load_image(&self, device: &DeviceInfo, image: &[u8]) -> Result<ProgramHandle>;

    /// Allocate a zero-filled device buffer of `len` elements.
    fn allocate_buffer(&self, len: usize, mode: AccessMode) -> Result<BufferHandle>;

    /// Free a device buffer. Unknown handles are ignored.
    fn release_buffer(&self, buffer: &BufferHandle);

    /// Copy between host memory and the leading elements of `buffer`.
    fn transfer(&self, buffer: &BufferHandle, transfer: Transfer<'_>) -> Result<()>;

    /// Start the multiply kernel; completion is reported through the token.
    fn enqueue_compute(&self, program: &ProgramHandle, args: &KernelArgs)
        -> Result<CompletionToken>;

    /// Block until `token` completes, subject to `options`.
    fn wait(&self, token: CompletionToken, options: &WaitOptions) -> Result<()> {
        token.wait(options)
    }
}
