// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! A state-vector quantum simulator whose amplitudes live in device memory.
//!
//! A [`StateVector`] owns a [`DeviceBuffer`] of `2^n` complex amplitudes on a
//! [`Backend`] (a wgpu device, or host memory standing in for one) and applies
//! gates to it in place, either through typed calls such as
//! [`StateVector::apply_rx`] or by name through [`StateVector::apply_operation`].

pub mod buffer;
pub mod config;
pub mod device;
pub mod error;
pub mod gates;
pub mod host_state;
pub mod kernel;
pub mod precision;
pub mod state_vector;

#[cfg(test)]
mod test_utils;

pub use buffer::{DeviceBuffer, PendingDownload};
pub use config::BackendConfig;
pub use device::{Backend, DevTag, GpuBackend, HostBackend, TransferMode};
pub use error::{Error, Result};
pub use gates::{GateCache, GateKind};
pub use host_state::HostStateVector;
pub use precision::Precision;
pub use state_vector::{GateDescriptor, GateSource, StateVector};

/// Describe the GPU adapter a [`GpuBackend`] would run on, or why there is none.
pub fn try_create_gpu_adapter() -> std::result::Result<String, String> {
    let adapter = GpuBackend::try_get_adapter().map_err(|e| e.to_string())?;
    let info = adapter.get_info();
    Ok(format!("{info:?}"))
}
