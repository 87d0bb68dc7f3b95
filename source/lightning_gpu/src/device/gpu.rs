// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod shader_types;

use std::num::NonZeroU64;
use std::sync::Arc;

use bytemuck::cast_slice;
use log::{debug, trace};
use wgpu::{
    Adapter, AdapterInfo, BindGroupLayout, Buffer, BufferDescriptor, BufferUsages,
    ComputePipeline, ComputePipelineDescriptor, Device, ErrorFilter, PollType, Queue,
};

use super::{Backend, DevTag, TransferMode, next_device_id};
use crate::config::BackendConfig;
use crate::error::{Error, Result};
use crate::kernel::KernelOp;
use shader_types::{
    GATE_OP_BINDING_SIZE, GATE_OP_STRIDE, GateOp, MAX_BUFFER_SIZE, dynamic_offsets,
};

// Buffer sizes and copy ranges must be multiples of this
const COPY_ALIGNMENT: usize = wgpu::COPY_BUFFER_ALIGNMENT as usize;

const STATE_BUF_BINDING: u32 = 0;
const OPS_BUF_BINDING: u32 = 1;

/// A wgpu device whose queue is the single execution stream.
///
/// Amplitudes are stored as interleaved `f32` pairs since WGSL has no portable
/// double precision.
#[derive(Clone, Debug)]
pub struct GpuBackend {
    device: Arc<GpuDevice>,
}

#[derive(Debug)]
struct GpuDevice {
    tag: DevTag,
    info: AdapterInfo,
    device: Device,
    queue: Queue,
    bind_group_layout: BindGroupLayout,
    apply_gate: ComputePipeline,
    max_buffer_size: u64,
    config: BackendConfig,
}

impl Drop for GpuDevice {
    fn drop(&mut self) {
        // If a device was capturing, stop the capture on drop
        if self.config.debug_capture {
            unsafe {
                self.device.stop_graphics_debugger_capture();
            }
        }
    }
}

/// A device buffer. Destroyed eagerly on drop rather than when wgpu's last
/// internal reference goes away.
#[derive(Debug)]
pub struct GpuAllocation {
    buffer: Buffer,
    bytes: usize,
}

impl Drop for GpuAllocation {
    fn drop(&mut self) {
        self.buffer.destroy();
    }
}

/// A mappable copy of device memory on its way to the host.
#[derive(Debug)]
pub struct GpuStaging {
    buffer: Buffer,
    bytes: usize,
}

impl GpuBackend {
    // NOTE: After migrating to wgpu v28 wasm32 and native will align on enumerate_adapters behavior
    // and also become async. See https://github.com/gfx-rs/wgpu/releases/tag/v28.0.0
    #[cfg(target_arch = "wasm32")]
    pub fn try_get_adapter() -> Result<Adapter> {
        Err(Error::device("wasm32 is not supported currently"))
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn try_get_adapter() -> Result<Adapter> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());

        let adapters = instance.enumerate_adapters(wgpu::Backends::PRIMARY);

        let score_adapter = |adapter: &Adapter| -> (u32, u32, u32) {
            let info = adapter.get_info();
            let device_score = match info.device_type {
                wgpu::DeviceType::DiscreteGpu => 8,
                wgpu::DeviceType::IntegratedGpu => 4,
                _ => 0,
            };
            let backend_score = match info.backend {
                wgpu::Backend::Vulkan | wgpu::Backend::Metal => 2,
                wgpu::Backend::Dx12 => 1,
                _ => 0,
            };
            (
                device_score,
                backend_score,
                adapter.limits().max_storage_buffer_binding_size,
            )
        };

        // Prefer discrete over integrated, Vulkan/Metal over DX12, then the largest storage bindings.
        // Software adapters are skipped; the host backend is the fallback for those machines.
        adapters
            .into_iter()
            .filter(|a| {
                let score = score_adapter(a);
                let compute = a
                    .get_downlevel_capabilities()
                    .flags
                    .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS);
                score.0 > 0 && score.1 > 0 && compute
            })
            .max_by_key(score_adapter)
            .ok_or_else(|| Error::device("No suitable GPU adapter found"))
    }

    /// Create a backend on the best available adapter, blocking until the device is ready.
    pub fn new(config: BackendConfig) -> Result<Self> {
        futures::executor::block_on(Self::create(config))
    }

    pub async fn create(config: BackendConfig) -> Result<Self> {
        let adapter = Self::try_get_adapter()?;
        let info = adapter.get_info();

        let adapter_limits = adapter.limits();
        let required_limits = wgpu::Limits {
            max_storage_buffer_binding_size: adapter_limits
                .max_storage_buffer_binding_size
                .min(1u32 << 30), // 1GB
            ..adapter_limits
        };
        let max_buffer_size = required_limits
            .max_buffer_size
            .min(u64::from(required_limits.max_storage_buffer_binding_size))
            .min(MAX_BUFFER_SIZE);

        let (device, queue): (Device, Queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Lightning GPU state vector"),
                required_features: wgpu::Features::empty(),
                required_limits,
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await
            .map_err(Error::device)?;

        if config.debug_capture {
            unsafe {
                device.start_graphics_debugger_capture();
            }
        }

        device.push_error_scope(ErrorFilter::Validation);
        let bind_group_layout = create_bind_group_layout(&device);
        let apply_gate = create_kernel(&device, &bind_group_layout);
        if let Some(error) = device.pop_error_scope().await {
            return Err(Error::device(format!("failed to build gate kernel: {error}")));
        }

        let tag = DevTag::new(next_device_id(), 0);
        debug!(
            "created GPU device {} on {} ({:?}), max buffer {max_buffer_size} bytes",
            tag.device_id, info.name, info.backend
        );

        Ok(Self {
            device: Arc::new(GpuDevice {
                tag,
                info,
                device,
                queue,
                bind_group_layout,
                apply_gate,
                max_buffer_size,
                config,
            }),
        })
    }

    #[must_use]
    pub fn adapter_info(&self) -> &AdapterInfo {
        &self.device.info
    }

    #[must_use]
    pub fn config(&self) -> &BackendConfig {
        &self.device.config
    }

    fn wait_idle(&self) -> Result<()> {
        self.device
            .device
            .poll(PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(Error::device)
    }

    fn finish_transfer(&self, mode: TransferMode) -> Result<()> {
        match mode {
            TransferMode::Sync => self.wait_idle(),
            TransferMode::Async => Ok(()),
        }
    }

    fn check_validation(&self) -> Result<()> {
        match futures::executor::block_on(self.device.device.pop_error_scope()) {
            Some(error) => Err(Error::device(error)),
            None => Ok(()),
        }
    }

    /// Upload `data` (length a multiple of [`COPY_ALIGNMENT`]) into `target` at `offset`.
    fn upload(&self, target: &Buffer, offset: u64, data: &[u8]) {
        let device = &self.device.device;
        let upload_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("Tmp Upload Buffer"),
            size: data.len() as u64,
            usage: BufferUsages::COPY_SRC | BufferUsages::MAP_WRITE,
            mapped_at_creation: true,
        });
        upload_buffer
            .slice(..)
            .get_mapped_range_mut()
            .copy_from_slice(data);
        upload_buffer.unmap();

        // Copy from the upload buffer to the GPU buffer
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Buffer Upload Copy Encoder"),
        });
        encoder.copy_buffer_to_buffer(&upload_buffer, 0, target, offset, data.len() as u64);
        self.device.queue.submit([encoder.finish()]);
    }

    /// Bytes `[aligned, aligned + 4)` of `buffer` read back synchronously, for
    /// merging partial words.
    fn read_word(&self, buffer: &Buffer, aligned: usize) -> Result<[u8; COPY_ALIGNMENT]> {
        let staging = self.stage_range(buffer, aligned, COPY_ALIGNMENT);
        let mut word = [0u8; COPY_ALIGNMENT];
        self.complete_read(staging, &mut word)?;
        Ok(word)
    }

    fn stage_range(&self, src: &Buffer, offset: usize, bytes: usize) -> GpuStaging {
        let device = &self.device.device;
        let padded = bytes.next_multiple_of(COPY_ALIGNMENT);
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some("Download buffer"),
            size: padded as u64,
            usage: BufferUsages::COPY_DST | BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Download Command Encoder"),
        });
        encoder.copy_buffer_to_buffer(src, offset as u64, &buffer, 0, padded as u64);
        self.device.queue.submit([encoder.finish()]);
        GpuStaging { buffer, bytes }
    }
}

impl Backend for GpuBackend {
    type Scalar = f32;
    type Allocation = GpuAllocation;
    type Staging = GpuStaging;

    fn tag(&self) -> DevTag {
        self.device.tag
    }

    fn describe(&self) -> String {
        format!(
            "GPU device {} ({}, {:?})",
            self.device.tag.device_id, self.device.info.name, self.device.info.backend
        )
    }

    fn allocate(&self, bytes: usize) -> Result<GpuAllocation> {
        let padded = bytes.next_multiple_of(COPY_ALIGNMENT) as u64;
        if padded > self.device.max_buffer_size {
            return Err(Error::Allocation {
                bytes,
                device_id: self.device.tag.device_id,
                reason: format!(
                    "exceeds the maximum GPU buffer size of {}",
                    self.device.max_buffer_size
                ),
            });
        }

        let device = &self.device.device;
        device.push_error_scope(ErrorFilter::OutOfMemory);
        let buffer = device.create_buffer(&BufferDescriptor {
            label: Some("StateVector Buffer"),
            size: padded,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_SRC | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        if let Some(error) = futures::executor::block_on(device.pop_error_scope()) {
            return Err(Error::Allocation {
                bytes,
                device_id: self.device.tag.device_id,
                reason: error.to_string(),
            });
        }

        trace!(
            "allocated {bytes} bytes on GPU device {}",
            self.device.tag.device_id
        );
        Ok(GpuAllocation { buffer, bytes })
    }

    fn write(&self, dst: &GpuAllocation, data: &[u8], mode: TransferMode) -> Result<()> {
        if data.len() > dst.bytes {
            return Err(Error::size_mismatch("gpu write", data.len(), dst.bytes));
        }
        if data.is_empty() {
            return Ok(());
        }

        let aligned = data.len() - data.len() % COPY_ALIGNMENT;
        if aligned > 0 {
            self.upload(&dst.buffer, 0, &data[..aligned]);
        }
        if aligned < data.len() {
            // Keep the bytes past the end of `data` in the final word intact
            let mut word = self.read_word(&dst.buffer, aligned)?;
            word[..data.len() - aligned].copy_from_slice(&data[aligned..]);
            self.upload(&dst.buffer, aligned as u64, &word);
        }
        self.finish_transfer(mode)
    }

    fn copy(
        &self,
        dst: &GpuAllocation,
        src: &GpuAllocation,
        bytes: usize,
        mode: TransferMode,
    ) -> Result<()> {
        if bytes > src.bytes || bytes > dst.bytes {
            return Err(Error::size_mismatch(
                "gpu copy",
                bytes,
                src.bytes.min(dst.bytes),
            ));
        }
        if bytes == 0 {
            return Ok(());
        }

        let aligned = bytes - bytes % COPY_ALIGNMENT;
        if aligned > 0 {
            let mut encoder =
                self.device
                    .device
                    .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                        label: Some("Device Copy Encoder"),
                    });
            encoder.copy_buffer_to_buffer(&src.buffer, 0, &dst.buffer, 0, aligned as u64);
            self.device.queue.submit([encoder.finish()]);
        }
        if aligned < bytes {
            let src_word = self.read_word(&src.buffer, aligned)?;
            let mut dst_word = self.read_word(&dst.buffer, aligned)?;
            let tail = bytes - aligned;
            dst_word[..tail].copy_from_slice(&src_word[..tail]);
            self.upload(&dst.buffer, aligned as u64, &dst_word);
        }
        self.finish_transfer(mode)
    }

    fn stage_read(&self, src: &GpuAllocation, bytes: usize) -> Result<GpuStaging> {
        if bytes > src.bytes {
            return Err(Error::size_mismatch("gpu read", bytes, src.bytes));
        }
        Ok(self.stage_range(&src.buffer, 0, bytes))
    }

    fn complete_read(&self, staging: GpuStaging, out: &mut [u8]) -> Result<()> {
        if out.len() < staging.bytes {
            return Err(Error::size_mismatch("gpu read", staging.bytes, out.len()));
        }
        if staging.bytes == 0 {
            return Ok(());
        }

        // Fetching the actual results is a real pain. For details, see:
        // https://github.com/gfx-rs/wgpu/blob/v26/examples/features/src/repeated_compute/mod.rs#L74
        let buffer_slice = staging.buffer.slice(..);
        let (sender, receiver) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        // Block until all pending GPU work (including the staged copy) is complete
        self.wait_idle()?;

        futures::executor::block_on(receiver)
            .map_err(|_| Error::device("buffer mapping was cancelled"))?
            .map_err(Error::device)?;

        let data = buffer_slice.get_mapped_range();
        out[..staging.bytes].copy_from_slice(&data[..staging.bytes]);
        drop(data);
        staging.buffer.unmap();
        Ok(())
    }

    fn launch(
        &self,
        state: &GpuAllocation,
        qubit_count: usize,
        ops: &[KernelOp<f32>],
        mode: TransferMode,
    ) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }
        let required = (1usize << qubit_count) * std::mem::size_of::<[f32; 2]>();
        if state.bytes < required {
            return Err(Error::size_mismatch("kernel launch", required, state.bytes));
        }

        let gate_ops = ops
            .iter()
            .map(|op| GateOp::from_kernel_op(qubit_count, op))
            .collect::<Result<Vec<_>>>()?;
        let offsets = dynamic_offsets(gate_ops.len())?;

        let device = &self.device.device;
        device.push_error_scope(ErrorFilter::Validation);

        let ops_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("Ops Buffer"),
            size: (gate_ops.len() as u64) * GATE_OP_STRIDE,
            usage: BufferUsages::STORAGE,
            mapped_at_creation: true,
        });
        ops_buffer
            .slice(..)
            .get_mapped_range_mut()
            .copy_from_slice(cast_slice(&gate_ops));
        ops_buffer.unmap();

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("StateVector Bind Group"),
            layout: &self.device.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: STATE_BUF_BINDING,
                    resource: state.buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: OPS_BUF_BINDING,
                    // Bind one op; dynamic offsets move this window along the buffer
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &ops_buffer,
                        offset: 0,
                        size: NonZeroU64::new(GATE_OP_BINDING_SIZE),
                    }),
                },
            ],
        });

        let max_ops_per_submit = self.device.config.max_ops_per_submit.max(1);
        for (chunk_idx, chunk) in gate_ops.chunks(max_ops_per_submit).enumerate() {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("StateVector Command Encoder"),
            });
            let mut compute_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("StateVector Compute Pass"),
                timestamp_writes: None,
            });
            compute_pass.set_pipeline(&self.device.apply_gate);

            for (idx, gate) in chunk.iter().enumerate() {
                let op_index = chunk_idx * max_ops_per_submit + idx;
                let (x, y) = gate.workgroup_grid();
                trace!(
                    "gpu kernel {op_index}: {} target(s), control mask {:#x}, grid {x}x{y}",
                    gate.target_count, gate.control_mask
                );
                compute_pass.set_bind_group(0, &bind_group, &[offsets[op_index]]);
                compute_pass.dispatch_workgroups(x, y, 1);
            }

            drop(compute_pass);
            self.device.queue.submit([encoder.finish()]);
        }

        self.check_validation()?;
        self.finish_transfer(mode)
    }

    fn synchronize(&self) -> Result<()> {
        self.wait_idle()
    }
}

fn create_bind_group_layout(device: &Device) -> BindGroupLayout {
    let entries = [
        wgpu::BindGroupLayoutEntry {
            binding: STATE_BUF_BINDING,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: false },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: OPS_BUF_BINDING,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only: true },
                has_dynamic_offset: true,
                min_binding_size: NonZeroU64::new(GATE_OP_BINDING_SIZE),
            },
            count: None,
        },
    ];

    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("StateVector bind group layout"),
        entries: &entries,
    })
}

fn create_kernel(device: &Device, bind_group_layout: &BindGroupLayout) -> ComputePipeline {
    let shader_module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("Gate Kernel Shader Module"),
        source: wgpu::ShaderSource::Wgsl(include_str!("gpu/kernel.wgsl").into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("Gate kernel pipeline layout"),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_compute_pipeline(&ComputePipelineDescriptor {
        label: Some("GPU kernel - apply_gate"),
        layout: Some(&pipeline_layout),
        module: &shader_module,
        entry_point: Some("apply_gate"),
        compilation_options: Default::default(),
        cache: None,
    })
}
