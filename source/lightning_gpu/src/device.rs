// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Execution substrates the state vector can live on.
//!
//! A [`Backend`] owns one device and one in-order command stream. Everything
//! issued through the same backend executes in issue order, which is the only
//! ordering guarantee the rest of the crate relies on.


pub mod gpu;
pub mod host;

use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::Result;
use crate::kernel::KernelOp;
use crate::precision::Precision;

pub use gpu::GpuBackend;
pub use host::HostBackend;

/// Identifies the device and the stream an allocation was made on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DevTag {
    pub device_id: u32,
    pub stream_id: u32,
}

impl DevTag {
    #[must_use]
    pub const fn new(device_id: u32, stream_id: u32) -> Self {
        Self {
            device_id,
            stream_id,
        }
    }
}

/// Whether a call waits for its device work to finish before returning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TransferMode {
    /// Block until the device has completed the work.
    #[default]
    Sync,
    /// Enqueue on the stream and return. Results are only visible to the host
    /// after a later synchronous call on the same stream or `synchronize`.
    Async,
}

// Device ids are process-wide so that buffers from two backends never compare equal.
static NEXT_DEVICE_ID: AtomicU32 = AtomicU32::new(0);

pub(crate) fn next_device_id() -> u32 {
    NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A device plus its command stream.
///
/// Backends are cheap handles (clones share the same device), so buffers keep
/// their own copy to issue transfers and to release memory.
pub trait Backend: Clone {
    /// Real type of the amplitudes kernels operate on.
    type Scalar: Precision;

    /// Raw device allocation. Dropping it releases the device memory.
    type Allocation;

    /// Device-side copy of data on its way back to the host.
    type Staging;

    fn tag(&self) -> DevTag;

    /// Human readable description of the device, used in logs.
    fn describe(&self) -> String;

    /// Allocate `bytes` bytes of device memory. Contents are zeroed.
    fn allocate(&self, bytes: usize) -> Result<Self::Allocation>;

    /// Copy `data` to the start of `dst`.
    fn write(&self, dst: &Self::Allocation, data: &[u8], mode: TransferMode) -> Result<()>;

    /// Copy the first `bytes` bytes of `src` to the start of `dst`.
    fn copy(
        &self,
        dst: &Self::Allocation,
        src: &Self::Allocation,
        bytes: usize,
        mode: TransferMode,
    ) -> Result<()>;

    /// Enqueue a copy of the first `bytes` bytes of `src` into host-readable memory.
    fn stage_read(&self, src: &Self::Allocation, bytes: usize) -> Result<Self::Staging>;

    /// Wait for a staged read and copy its contents into `out`.
    fn complete_read(&self, staging: Self::Staging, out: &mut [u8]) -> Result<()>;

    /// Apply `ops` in order to the state vector of `qubit_count` qubits held in `state`.
    fn launch(
        &self,
        state: &Self::Allocation,
        qubit_count: usize,
        ops: &[KernelOp<Self::Scalar>],
        mode: TransferMode,
    ) -> Result<()>;

    /// Block until all work issued on the stream has finished.
    fn synchronize(&self) -> Result<()>;

    /// Read the first `out.len()` bytes of `src` synchronously.
    fn read(&self, src: &Self::Allocation, out: &mut [u8]) -> Result<()> {
        let staging = self.stage_read(src, out.len())?;
        self.complete_read(staging, out)
    }
}
