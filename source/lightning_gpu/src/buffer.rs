// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use std::marker::PhantomData;

use bytemuck::{Pod, cast_slice, cast_slice_mut};
use log::trace;

use crate::device::{Backend, DevTag, TransferMode};
use crate::error::{Error, Result};

/// A fixed-length array of `T` resident on one device.
///
/// The buffer exclusively owns its allocation and releases it on drop. It is
/// deliberately not `Clone`: duplicating device memory goes through
/// [`DeviceBuffer::assign_from`], and handing it over through
/// [`DeviceBuffer::take_from`].
pub struct DeviceBuffer<T, B: Backend> {
    backend: B,
    allocation: Option<B::Allocation>,
    length: usize,
    tag: DevTag,
    _element: PhantomData<T>,
}

impl<T: Pod, B: Backend> DeviceBuffer<T, B> {
    /// Allocate `length` zeroed elements on `backend`'s device and stream.
    ///
    /// A zero length is allowed and allocates nothing.
    pub fn new(backend: &B, length: usize) -> Result<Self> {
        let allocation = allocate::<T, B>(backend, length)?;
        Ok(Self {
            backend: backend.clone(),
            allocation,
            length,
            tag: backend.tag(),
            _element: PhantomData,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    #[must_use]
    pub fn size_in_bytes(&self) -> usize {
        self.length * size_of::<T>()
    }

    #[must_use]
    pub fn tag(&self) -> DevTag {
        self.tag
    }

    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn allocation(&self) -> Option<&B::Allocation> {
        self.allocation.as_ref()
    }

    /// Copy all of `src` into the start of this buffer.
    pub fn copy_from_device(&mut self, src: &Self, mode: TransferMode) -> Result<()> {
        if self.length < src.length {
            return Err(Error::size_mismatch(
                "device-to-device copy",
                src.length,
                self.length,
            ));
        }
        let (Some(dst_alloc), Some(src_alloc)) = (&self.allocation, &src.allocation) else {
            return Ok(());
        };
        transfer(
            (&self.backend, dst_alloc),
            (&src.backend, src_alloc),
            src.size_in_bytes(),
            mode,
        )
    }

    /// Copy `host` into the start of this buffer. The host element type may
    /// differ from `T`; sizes are compared in bytes.
    pub fn copy_from_host<H: Pod>(&mut self, host: &[H], mode: TransferMode) -> Result<()> {
        let bytes = size_of_val(host);
        if bytes > self.size_in_bytes() {
            return Err(Error::size_mismatch(
                "host-to-device copy",
                bytes,
                self.size_in_bytes(),
            ));
        }
        let Some(allocation) = &self.allocation else {
            return Ok(());
        };
        trace!("host-to-device copy of {bytes} bytes ({mode:?})");
        self.backend.write(allocation, cast_slice(host), mode)
    }

    /// Copy the whole buffer into the start of `host`.
    ///
    /// Host memory is only written once the data has arrived, so this returns
    /// after the transfer in both modes; `Async` merely avoids draining work
    /// queued after it. Use [`DeviceBuffer::copy_to_host_async`] to defer the wait.
    pub fn copy_to_host<H: Pod>(&self, host: &mut [H], mode: TransferMode) -> Result<()> {
        let bytes = self.size_in_bytes();
        if size_of_val(host) < bytes {
            return Err(Error::size_mismatch(
                "device-to-host copy",
                bytes,
                size_of_val(host),
            ));
        }
        let Some(allocation) = &self.allocation else {
            return Ok(());
        };
        trace!("device-to-host copy of {bytes} bytes ({mode:?})");
        self.backend
            .read(allocation, &mut cast_slice_mut::<H, u8>(host)[..bytes])
    }

    /// Enqueue a copy of the buffer towards the host and return without waiting.
    pub fn copy_to_host_async(&self) -> Result<PendingDownload<T, B>> {
        let staging = match &self.allocation {
            Some(allocation) => Some(self.backend.stage_read(allocation, self.size_in_bytes())?),
            None => None,
        };
        Ok(PendingDownload {
            backend: self.backend.clone(),
            staging,
            length: self.length,
            _element: PhantomData,
        })
    }

    /// Read the buffer back into a new vector.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        let mut host = vec![T::zeroed(); self.length];
        self.copy_to_host(&mut host, TransferMode::Sync)?;
        Ok(host)
    }

    /// Move assignment.
    ///
    /// On the same device the allocation changes hands without a copy. Across
    /// devices the contents are copied (through host memory) into a fresh
    /// allocation on this buffer's device. Either way `other` is left empty.
    pub fn take_from(&mut self, other: &mut Self) -> Result<()> {
        if self.tag.device_id == other.tag.device_id {
            self.allocation = other.allocation.take();
            self.length = other.length;
            self.tag = other.tag;
        } else {
            let mut moved = Self::new(&self.backend, other.length)?;
            moved.copy_from_device(other, TransferMode::Sync)?;
            *self = moved;
            other.allocation = None;
        }
        other.length = 0;
        other.tag = DevTag::default();
        Ok(())
    }

    /// Copy assignment: make this buffer an independent copy of `other` on
    /// this buffer's own device.
    pub fn assign_from(&mut self, other: &Self) -> Result<()> {
        if self.length != other.length {
            self.allocation = allocate::<T, B>(&self.backend, other.length)?;
            self.length = other.length;
        }
        self.copy_from_device(other, TransferMode::Sync)
    }

    /// Block until all work on this buffer's stream has completed.
    pub fn synchronize(&self) -> Result<()> {
        self.backend.synchronize()
    }
}

impl<T, B: Backend> std::fmt::Debug for DeviceBuffer<T, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("length", &self.length)
            .field("tag", &self.tag)
            .field("allocated", &self.allocation.is_some())
            .finish()
    }
}

fn allocate<T: Pod, B: Backend>(backend: &B, length: usize) -> Result<Option<B::Allocation>> {
    if length == 0 {
        return Ok(None);
    }
    let bytes = length
        .checked_mul(size_of::<T>())
        .ok_or_else(|| Error::Allocation {
            bytes: usize::MAX,
            device_id: backend.tag().device_id,
            reason: format!("{length} elements overflow the address space"),
        })?;
    backend.allocate(bytes).map(Some)
}

fn transfer<B: Backend>(
    (dst_backend, dst): (&B, &B::Allocation),
    (src_backend, src): (&B, &B::Allocation),
    bytes: usize,
    mode: TransferMode,
) -> Result<()> {
    if dst_backend.tag().device_id == src_backend.tag().device_id {
        trace!("device-to-device copy of {bytes} bytes ({mode:?})");
        return dst_backend.copy(dst, src, bytes, mode);
    }

    // Device memory cannot cross devices directly; stage through the host
    trace!(
        "staging {bytes} bytes from device {} to device {}",
        src_backend.tag().device_id,
        dst_backend.tag().device_id
    );
    let mut staged = vec![0u8; bytes];
    src_backend.read(src, &mut staged)?;
    dst_backend.write(dst, &staged, mode)
}

/// A device-to-host copy that has been enqueued but not waited on.
pub struct PendingDownload<T, B: Backend> {
    backend: B,
    staging: Option<B::Staging>,
    length: usize,
    _element: PhantomData<T>,
}

impl<T: Pod, B: Backend> PendingDownload<T, B> {
    /// Elements the download will deliver.
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Wait for the transfer and write it to the start of `host`.
    pub fn wait<H: Pod>(self, host: &mut [H]) -> Result<()> {
        let bytes = self.length * size_of::<T>();
        if size_of_val(host) < bytes {
            return Err(Error::size_mismatch(
                "device-to-host copy",
                bytes,
                size_of_val(host),
            ));
        }
        match self.staging {
            Some(staging) => self
                .backend
                .complete_read(staging, &mut cast_slice_mut::<H, u8>(host)[..bytes]),
            None => Ok(()),
        }
    }

    pub fn wait_into_vec(self) -> Result<Vec<T>> {
        let mut host = vec![T::zeroed(); self.length];
        self.wait(&mut host)?;
        Ok(host)
    }
}
