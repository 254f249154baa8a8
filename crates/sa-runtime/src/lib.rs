//! `sa-runtime` - Accelerator offload for the tiled multiply engine.
//!
//! This crate provides:
//! - `AcceleratorRuntime`, the narrow device interface (discover, program,
//!   allocate, transfer, enqueue, wait)
//! - `KernelImage`, the binary image header a device is programmed with
//! - `EmulatedRuntime`, a software device running `TiledEngine` on host threads
//! - `HostDriver`, the blocking offload sequence with a cancellable,
//!   timeout-bounded wait

pub mod completion;
pub mod driver;
pub mod emulated;
pub mod error;
pub mod image;
pub mod runtime;

pub use completion::{completion_pair, CancelFlag, CompletionSignal, CompletionToken, WaitOptions};
pub use driver::{DriverConfig, HostDriver, OffloadReport, OffloadTimings};
pub use emulated::{EmulatedDevice, EmulatedRuntime};
pub use error::{Result, RuntimeError};
pub use image::{KernelImage, IMAGE_MAGIC, IMAGE_VERSION};
pub use runtime::{
    AccessMode, AcceleratorRuntime, BufferHandle, DeviceId, DeviceInfo, KernelArgs,
    ProgramHandle, Transfer, TransferDirection,
};
