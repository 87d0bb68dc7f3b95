// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytemuck::{cast_slice, cast_slice_mut, try_cast_slice_mut};
use log::{debug, trace};
use num_complex::Complex;

use super::{Backend, DevTag, TransferMode, next_device_id};
use crate::error::{Error, Result};
use crate::kernel::{KernelOp, apply_to_slice};
use crate::precision::Precision;

/// A device emulated in host memory.
///
/// Every command runs to completion before the call returns, so the stream is
/// trivially in order and `Async` transfers behave like `Sync` ones.
#[derive(Clone, Debug)]
pub struct HostBackend<P = f64> {
    device: Arc<HostDevice>,
    _precision: PhantomData<P>,
}

#[derive(Debug)]
struct HostDevice {
    tag: DevTag,
    memory_limit: Option<usize>,
    allocated: AtomicUsize,
}

/// Host memory standing in for a device allocation. Stored as `u64` words so
/// it can be reinterpreted as `Complex<f64>` without alignment issues.
#[derive(Debug)]
pub struct HostAllocation {
    words: Mutex<Vec<u64>>,
    bytes: usize,
    device: Arc<HostDevice>,
}

impl Drop for HostAllocation {
    fn drop(&mut self) {
        self.device.allocated.fetch_sub(self.bytes, Ordering::Relaxed);
        trace!(
            "released {} bytes on host device {}",
            self.bytes, self.device.tag.device_id
        );
    }
}

impl HostAllocation {
    fn lock(&self) -> Result<MutexGuard<'_, Vec<u64>>> {
        self.words
            .lock()
            .map_err(|_| Error::device("host allocation lock poisoned"))
    }
}

impl<P: Precision> Default for HostBackend<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Precision> HostBackend<P> {
    #[must_use]
    pub fn new() -> Self {
        Self::with_device(None)
    }

    /// A host device that refuses allocations once `bytes` are in use.
    #[must_use]
    pub fn with_memory_limit(bytes: usize) -> Self {
        Self::with_device(Some(bytes))
    }

    fn with_device(memory_limit: Option<usize>) -> Self {
        let tag = DevTag::new(next_device_id(), 0);
        debug!("created host device {} ({})", tag.device_id, P::NAME);
        Self {
            device: Arc::new(HostDevice {
                tag,
                memory_limit,
                allocated: AtomicUsize::new(0),
            }),
            _precision: PhantomData,
        }
    }

    /// Bytes currently allocated on this device.
    #[must_use]
    pub fn allocated_bytes(&self) -> usize {
        self.device.allocated.load(Ordering::Relaxed)
    }

    fn allocation_error(&self, bytes: usize, reason: impl Into<String>) -> Error {
        Error::Allocation {
            bytes,
            device_id: self.device.tag.device_id,
            reason: reason.into(),
        }
    }
}

impl<P: Precision> Backend for HostBackend<P> {
    type Scalar = P;
    type Allocation = HostAllocation;
    type Staging = Vec<u8>;

    fn tag(&self) -> DevTag {
        self.device.tag
    }

    fn describe(&self) -> String {
        format!("host device {} ({})", self.device.tag.device_id, P::NAME)
    }

    fn allocate(&self, bytes: usize) -> Result<HostAllocation> {
        if let Some(limit) = self.device.memory_limit {
            let in_use = self.allocated_bytes();
            if in_use.saturating_add(bytes) > limit {
                return Err(self.allocation_error(
                    bytes,
                    format!("memory limit of {limit} bytes reached ({in_use} in use)"),
                ));
            }
        }

        let word_count = bytes.div_ceil(std::mem::size_of::<u64>());
        let mut words = Vec::new();
        words
            .try_reserve_exact(word_count)
            .map_err(|e| self.allocation_error(bytes, e.to_string()))?;
        words.resize(word_count, 0);

        self.device.allocated.fetch_add(bytes, Ordering::Relaxed);
        trace!(
            "allocated {bytes} bytes on host device {}",
            self.device.tag.device_id
        );
        Ok(HostAllocation {
            words: Mutex::new(words),
            bytes,
            device: Arc::clone(&self.device),
        })
    }

    fn write(&self, dst: &HostAllocation, data: &[u8], _mode: TransferMode) -> Result<()> {
        if data.len() > dst.bytes {
            return Err(Error::size_mismatch("host write", data.len(), dst.bytes));
        }
        let mut words = dst.lock()?;
        cast_slice_mut::<u64, u8>(&mut words)[..data.len()].copy_from_slice(data);
        Ok(())
    }

    fn copy(
        &self,
        dst: &HostAllocation,
        src: &HostAllocation,
        bytes: usize,
        _mode: TransferMode,
    ) -> Result<()> {
        if bytes > src.bytes || bytes > dst.bytes {
            return Err(Error::size_mismatch(
                "host copy",
                bytes,
                src.bytes.min(dst.bytes),
            ));
        }
        if std::ptr::eq(dst, src) {
            return Ok(());
        }
        let src_words = src.lock()?;
        let mut dst_words = dst.lock()?;
        cast_slice_mut::<u64, u8>(&mut dst_words)[..bytes]
            .copy_from_slice(&cast_slice::<u64, u8>(&src_words)[..bytes]);
        Ok(())
    }

    fn stage_read(&self, src: &HostAllocation, bytes: usize) -> Result<Vec<u8>> {
        if bytes > src.bytes {
            return Err(Error::size_mismatch("host read", bytes, src.bytes));
        }
        let words = src.lock()?;
        Ok(cast_slice::<u64, u8>(&words)[..bytes].to_vec())
    }

    fn complete_read(&self, staging: Vec<u8>, out: &mut [u8]) -> Result<()> {
        if out.len() < staging.len() {
            return Err(Error::size_mismatch("host read", staging.len(), out.len()));
        }
        out[..staging.len()].copy_from_slice(&staging);
        Ok(())
    }

    fn launch(
        &self,
        state: &HostAllocation,
        qubit_count: usize,
        ops: &[KernelOp<P>],
        _mode: TransferMode,
    ) -> Result<()> {
        let mut words = state.lock()?;
        let amplitudes: &mut [Complex<P>] =
            try_cast_slice_mut(&mut words[..]).map_err(Error::device)?;
        let len = 1usize << qubit_count;
        if amplitudes.len() < len {
            return Err(Error::size_mismatch("kernel launch", len, amplitudes.len()));
        }
        for op in ops {
            trace!(
                "host kernel: controls {:?} targets {:?}",
                op.controls, op.targets
            );
            apply_to_slice(&mut amplitudes[..len], qubit_count, op);
        }
        Ok(())
    }

    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
}
