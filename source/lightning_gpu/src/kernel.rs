// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use std::sync::Arc;

use num_complex::Complex;
use num_traits::Zero;

use crate::precision::Precision;

/// Largest number of target wires a single kernel launch can contract over (an 8x8 matrix).
pub const MAX_KERNEL_TARGETS: usize = 3;

/// One gate application, fully resolved and validated.
///
/// `matrix` is row-major with dimension `2^targets.len()`. The first listed
/// target is the most significant bit of the matrix row/column index. The
/// matrix is only applied to amplitudes where every control wire is 1.
#[derive(Clone, Debug, PartialEq)]
pub struct KernelOp<P> {
    pub controls: Vec<usize>,
    pub targets: Vec<usize>,
    pub matrix: Arc<[Complex<P>]>,
}

impl<P: Precision> KernelOp<P> {
    #[must_use]
    pub fn new(matrix: Arc<[Complex<P>]>, controls: Vec<usize>, targets: Vec<usize>) -> Self {
        debug_assert_eq!(matrix.len(), 1 << (2 * targets.len()));
        Self {
            controls,
            targets,
            matrix,
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        1 << self.targets.len()
    }
}

/// Bit position of `wire` within a basis-state index. Wire 0 is the most significant bit.
#[must_use]
pub fn wire_bit(qubit_count: usize, wire: usize) -> usize {
    qubit_count - 1 - wire
}

#[must_use]
pub fn control_mask(qubit_count: usize, controls: &[usize]) -> usize {
    controls
        .iter()
        .fold(0, |mask, &wire| mask | (1 << wire_bit(qubit_count, wire)))
}

/// Spread the bits of `value` so a zero sits at each of `sorted_bits` (ascending).
#[must_use]
pub fn insert_zero_bits(mut value: usize, sorted_bits: &[usize]) -> usize {
    for &bit in sorted_bits {
        let low = value & ((1 << bit) - 1);
        value = ((value >> bit) << (bit + 1)) | low;
    }
    value
}

/// Offset added to an outer index for each row of the matrix.
#[must_use]
pub fn target_offsets(qubit_count: usize, targets: &[usize]) -> Vec<usize> {
    let count = targets.len();
    (0..1usize << count)
        .map(|row| {
            targets
                .iter()
                .enumerate()
                .filter(|(pos, _)| (row >> (count - 1 - pos)) & 1 == 1)
                .fold(0, |offset, (_, &wire)| {
                    offset | (1 << wire_bit(qubit_count, wire))
                })
        })
        .collect()
}

/// Conjugate transpose of a row-major square matrix.
#[must_use]
pub fn adjoint<P: Precision>(matrix: &[Complex<P>], dimension: usize) -> Vec<Complex<P>> {
    let mut result = Vec::with_capacity(matrix.len());
    for row in 0..dimension {
        for col in 0..dimension {
            result.push(matrix[col * dimension + row].conj());
        }
    }
    result
}

/// Contract `op` into `state` in place. This is the reference implementation
/// the host backend runs and the WGSL kernel mirrors.
pub fn apply_to_slice<P: Precision>(state: &mut [Complex<P>], qubit_count: usize, op: &KernelOp<P>) {
    let mut sorted_bits: Vec<usize> = op
        .targets
        .iter()
        .map(|&wire| wire_bit(qubit_count, wire))
        .collect();
    sorted_bits.sort_unstable();

    let mask = control_mask(qubit_count, &op.controls);
    let offsets = target_offsets(qubit_count, &op.targets);
    let dimension = op.dimension();
    let outer_count = state.len() >> op.targets.len();

    let mut gathered = vec![Complex::<P>::zero(); dimension];
    for outer in 0..outer_count {
        let base = insert_zero_bits(outer, &sorted_bits);
        if base & mask != mask {
            continue;
        }
        for (slot, offset) in gathered.iter_mut().zip(&offsets) {
            *slot = state[base | offset];
        }
        for (row, offset) in offsets.iter().enumerate() {
            let row_entries = &op.matrix[row * dimension..(row + 1) * dimension];
            state[base | offset] = row_entries
                .iter()
                .zip(&gathered)
                .fold(Complex::zero(), |acc, (m, a)| acc + m * a);
        }
    }
}
