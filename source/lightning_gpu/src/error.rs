// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the state-vector engine and the device layer beneath it.
///
/// Validation errors (`SizeMismatch`, `InvalidWire`, `InvalidParameterCount`,
/// `UnknownGate`) are raised before any device work is issued, so the device
/// state is unchanged when one is returned.
#[derive(Clone, Debug, Diagnostic, Error, PartialEq, Eq)]
pub enum Error {
    #[error("failed to allocate {bytes} bytes on device {device_id}: {reason}")]
    #[diagnostic(code("Lightning.Allocation"))]
    Allocation {
        bytes: usize,
        device_id: u32,
        reason: String,
    },

    #[error("size mismatch in {context}: {actual} available where {required} required")]
    #[diagnostic(
        code("Lightning.SizeMismatch"),
        help("the destination must be at least as large as the source")
    )]
    SizeMismatch {
        context: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("invalid wire: {0}")]
    #[diagnostic(code("Lightning.InvalidWire"))]
    InvalidWire(String),

    #[error("gate {gate} expects {expected} parameter(s) but {actual} were given")]
    #[diagnostic(code("Lightning.InvalidParameterCount"))]
    InvalidParameterCount {
        gate: String,
        expected: usize,
        actual: usize,
    },

    #[error("unknown gate `{0}`")]
    #[diagnostic(
        code("Lightning.UnknownGate"),
        help("gate names are case-sensitive; supply an explicit matrix for custom gates")
    )]
    UnknownGate(String),

    #[error("device error: {0}")]
    #[diagnostic(code("Lightning.Device"))]
    Device(String),
}

impl Error {
    pub(crate) fn size_mismatch(context: &'static str, required: usize, actual: usize) -> Self {
        Error::SizeMismatch {
            context,
            required,
            actual,
        }
    }

    pub(crate) fn device(message: impl std::fmt::Display) -> Self {
        Error::Device(message.to_string())
    }

    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(
            self,
            Error::SizeMismatch { .. }
                | Error::InvalidWire(..)
                | Error::InvalidParameterCount { .. }
                | Error::UnknownGate(..)
        )
    }
}
