// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use log::warn;

// On Windows, long runs of kernels in one command buffer can trip the driver
// timeout (TDR), so launches are split into chunks.
pub const DEFAULT_MAX_OPS_PER_SUBMIT: usize = 16;

pub const MAX_OPS_PER_SUBMIT_VAR: &str = "LIGHTNING_GPU_MAX_OPS_PER_SUBMIT";
pub const CAPTURE_VAR: &str = "LIGHTNING_GPU_CAPTURE";
pub const FORCE_HOST_VAR: &str = "LIGHTNING_GPU_FORCE_HOST";

/// Settings for creating a device backend.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    /// Gate launches recorded into a single command buffer before it is submitted.
    pub max_ops_per_submit: usize,
    /// Start a graphics debugger capture when the device is created.
    pub debug_capture: bool,
    /// Skip GPU adapter discovery and run on the host.
    pub force_host: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            max_ops_per_submit: DEFAULT_MAX_OPS_PER_SUBMIT,
            debug_capture: false,
            force_host: false,
        }
    }
}

impl BackendConfig {
    /// Defaults, overridden by any `LIGHTNING_GPU_*` environment variables that are set.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary variable source.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(value) = lookup(MAX_OPS_PER_SUBMIT_VAR) {
            match value.trim().parse::<usize>() {
                Ok(count) if count > 0 => config.max_ops_per_submit = count,
                _ => warn!(
                    "ignoring {MAX_OPS_PER_SUBMIT_VAR}={value}: expected a positive integer"
                ),
            }
        }
        config.debug_capture = lookup(CAPTURE_VAR).is_some();
        config.force_host = lookup(FORCE_HOST_VAR).is_some_and(|value| is_truthy(&value));
        config
    }

    #[must_use]
    pub fn with_max_ops_per_submit(mut self, count: usize) -> Self {
        self.max_ops_per_submit = count.max(1);
        self
    }

    #[must_use]
    pub fn with_debug_capture(mut self, enabled: bool) -> Self {
        self.debug_capture = enabled;
        self
    }

    #[must_use]
    pub fn with_force_host(mut self, enabled: bool) -> Self {
        self.force_host = enabled;
        self
    }
}

fn is_truthy(value: &str) -> bool {
    !matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "" | "0" | "false" | "no" | "off"
    )
}
