// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use bytemuck::{Pod, Zeroable};

use crate::error::{Error, Result};
use crate::kernel::{KernelOp, MAX_KERNEL_TARGETS, control_mask, wire_bit};

pub const THREADS_PER_WORKGROUP: u32 = 64; // Keep in sync with @workgroup_size in kernel.wgsl
pub const MAX_WORKGROUPS_PER_DIMENSION: u32 = 65535; // WebGPU default limit
pub const MAX_QUBIT_COUNT: usize = 27; // 2^27 complex f32 entries fill the 1GB storage binding limit
pub const MAX_BUFFER_SIZE: u64 = 1 << 30;

pub const MAX_MATRIX_ENTRIES: usize = 1 << (2 * MAX_KERNEL_TARGETS);

/// Bytes of a [`GateOp`] the shader reads; the rest is padding to the dynamic offset alignment.
pub const GATE_OP_BINDING_SIZE: u64 = 576;
pub const GATE_OP_STRIDE: u64 = 768;

/// One gate launch as laid out in the ops storage buffer. Must match `GateOp` in kernel.wgsl.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct GateOp {
    pub qubit_count: u32,
    pub target_count: u32,
    pub control_mask: u32,
    pub outer_count: u32,
    /// Bit positions of the targets in caller order (first target is the matrix MSB).
    pub target_bits: [u32; 4],
    /// The same bit positions sorted ascending, for spreading the outer index.
    pub sorted_bits: [u32; 4],
    pub reserved: [u32; 4],
    /// Row-major matrix of (re, im) pairs, `2^target_count` square.
    pub matrix: [[f32; 2]; MAX_MATRIX_ENTRIES],
    pub padding: [u32; 48],
}

// safety check to make sure GateOp is a multiple of the dynamic offset alignment at compile time
const _: () = assert!(std::mem::size_of::<GateOp>() as u64 == GATE_OP_STRIDE);
const _: () = assert!(GATE_OP_STRIDE % 256 == 0);

impl Default for GateOp {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl GateOp {
    pub fn from_kernel_op(qubit_count: usize, op: &KernelOp<f32>) -> Result<Self> {
        if op.targets.len() > MAX_KERNEL_TARGETS {
            return Err(Error::size_mismatch(
                "gpu kernel targets",
                op.targets.len(),
                MAX_KERNEL_TARGETS,
            ));
        }
        if qubit_count > MAX_QUBIT_COUNT {
            return Err(Error::device(format!(
                "qubit count {qubit_count} exceeds the GPU maximum of {MAX_QUBIT_COUNT}"
            )));
        }

        let mut gate = Self {
            qubit_count: to_u32(qubit_count),
            target_count: to_u32(op.targets.len()),
            control_mask: to_u32(control_mask(qubit_count, &op.controls)),
            outer_count: to_u32((1usize << qubit_count) >> op.targets.len()),
            ..Self::default()
        };

        let mut sorted: Vec<u32> = Vec::with_capacity(op.targets.len());
        for (slot, &wire) in op.targets.iter().enumerate() {
            let bit = to_u32(wire_bit(qubit_count, wire));
            gate.target_bits[slot] = bit;
            sorted.push(bit);
        }
        sorted.sort_unstable();
        gate.sorted_bits[..sorted.len()].copy_from_slice(&sorted);

        for (entry, value) in gate.matrix.iter_mut().zip(op.matrix.iter()) {
            *entry = [value.re, value.im];
        }
        Ok(gate)
    }

    /// Workgroups needed to cover every outer index, split over x and y to respect
    /// the per-dimension dispatch limit.
    #[must_use]
    pub fn workgroup_grid(&self) -> (u32, u32) {
        let groups = self.outer_count.div_ceil(THREADS_PER_WORKGROUP).max(1);
        let x = groups.min(MAX_WORKGROUPS_PER_DIMENSION);
        (x, groups.div_ceil(x))
    }
}

/// Dynamic offsets of `op_count` consecutive [`GateOp`] records in one ops buffer.
pub fn dynamic_offsets(op_count: usize) -> Result<Vec<u32>> {
    let to_offset = |index: usize| {
        u32::try_from(index as u64 * GATE_OP_STRIDE)
            .map_err(|_| Error::device(format!("{op_count} ops do not fit in one launch")))
    };
    to_offset(op_count.saturating_sub(1))?;
    (0..op_count).map(to_offset).collect()
}

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).expect("value should fit in u32 for qubit counts within MAX_QUBIT_COUNT")
}
