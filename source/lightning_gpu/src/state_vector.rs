// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The device-resident state vector and the gate dispatcher that drives it.
//!
//! Wire 0 is the most significant bit of a basis-state index, so on three
//! qubits `|100>` is index 4. Every request is validated and resolved to
//! [`KernelOp`]s before any device work is issued, which means an error from
//! validation never leaves the state half-updated.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use log::{debug, trace};
use num_complex::Complex;
use num_traits::{One, Zero};

use crate::buffer::DeviceBuffer;
use crate::device::{Backend, DevTag, TransferMode};
use crate::error::{Error, Result};
use crate::gates::{GateCache, GateKind};
use crate::kernel::{self, KernelOp, MAX_KERNEL_TARGETS};

/// Where the matrix of a gate comes from.
#[derive(Clone, Debug, PartialEq)]
pub enum GateSource<P> {
    Named(GateKind),
    /// A caller-supplied row-major matrix over the target wires. The name is
    /// informational only.
    Custom {
        name: String,
        matrix: Vec<Complex<P>>,
    },
}

/// One gate application request.
#[derive(Clone, Debug, PartialEq)]
pub struct GateDescriptor<P> {
    pub source: GateSource<P>,
    /// Controls in addition to any the gate carries itself.
    pub control_wires: Vec<usize>,
    /// For named gates, the gate's flat wire list: intrinsic controls first.
    pub target_wires: Vec<usize>,
    pub adjoint: bool,
    pub params: Vec<f64>,
}

impl<P> GateDescriptor<P> {
    #[must_use]
    pub fn named(kind: GateKind, wires: &[usize], adjoint: bool, params: &[f64]) -> Self {
        Self {
            source: GateSource::Named(kind),
            control_wires: Vec::new(),
            target_wires: wires.to_vec(),
            adjoint,
            params: params.to_vec(),
        }
    }

    #[must_use]
    pub fn custom(
        name: impl Into<String>,
        matrix: Vec<Complex<P>>,
        wires: &[usize],
        adjoint: bool,
    ) -> Self {
        Self {
            source: GateSource::Custom {
                name: name.into(),
                matrix,
            },
            control_wires: Vec::new(),
            target_wires: wires.to_vec(),
            adjoint,
            params: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_controls(mut self, control_wires: &[usize]) -> Self {
        self.control_wires = control_wires.to_vec();
        self
    }
}

/// `2^n` amplitudes held in device memory, mutated in place by gates.
pub struct StateVector<B: Backend> {
    qubit_count: usize,
    buffer: DeviceBuffer<Complex<B::Scalar>, B>,
    cache: GateCache<B::Scalar>,
}

impl<B: Backend> StateVector<B> {
    /// Allocate a state vector on `backend` initialised to `|0...0>`.
    pub fn new(backend: &B, qubit_count: usize) -> Result<Self> {
        let length = state_len(backend, qubit_count)?;
        let buffer = DeviceBuffer::new(backend, length)?;
        let mut state = Self {
            qubit_count,
            buffer,
            cache: GateCache::new(),
        };
        state.reset()?;
        debug!(
            "allocated {qubit_count}-qubit state vector on {}",
            backend.describe()
        );
        Ok(state)
    }

    /// Allocate a state vector seeded with `amplitudes`, which must hold exactly `2^n` entries.
    pub fn from_amplitudes(
        backend: &B,
        qubit_count: usize,
        amplitudes: &[Complex<B::Scalar>],
    ) -> Result<Self> {
        let length = state_len(backend, qubit_count)?;
        if amplitudes.len() != length {
            return Err(Error::size_mismatch(
                "initial state",
                length,
                amplitudes.len(),
            ));
        }
        let mut buffer = DeviceBuffer::new(backend, length)?;
        buffer.copy_from_host(amplitudes, TransferMode::Sync)?;
        Ok(Self {
            qubit_count,
            buffer,
            cache: GateCache::new(),
        })
    }

    #[must_use]
    pub fn qubit_count(&self) -> usize {
        self.qubit_count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[must_use]
    pub fn tag(&self) -> DevTag {
        self.buffer.tag()
    }

    #[must_use]
    pub fn buffer(&self) -> &DeviceBuffer<Complex<B::Scalar>, B> {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut DeviceBuffer<Complex<B::Scalar>, B> {
        &mut self.buffer
    }

    #[must_use]
    pub fn gate_cache(&self) -> &GateCache<B::Scalar> {
        &self.cache
    }

    /// Copy the amplitudes back to the host.
    pub fn amplitudes(&self) -> Result<Vec<Complex<B::Scalar>>> {
        self.buffer.to_vec()
    }

    /// Return to `|0...0>`.
    pub fn reset(&mut self) -> Result<()> {
        let mut zero_state = vec![Complex::<B::Scalar>::zero(); self.buffer.len()];
        let Some(first) = zero_state.first_mut() else {
            return Err(Error::device("state vector has no device allocation"));
        };
        *first = Complex::one();
        self.buffer.copy_from_host(&zero_state, TransferMode::Sync)
    }

    pub fn synchronize(&self) -> Result<()> {
        self.buffer.synchronize()
    }

    /// Apply the gate called `name`.
    ///
    /// `target_wires` is the gate's flat wire list, its leading
    /// [`GateKind::control_count`] entries being the gate's own controls.
    /// `control_wires` adds further controls on top of those.
    pub fn apply_named_gate(
        &mut self,
        name: &str,
        control_wires: &[usize],
        target_wires: &[usize],
        adjoint: bool,
        params: &[f64],
    ) -> Result<()> {
        let kind = GateKind::from_name(name)?;
        self.apply_gate(kind, control_wires, target_wires, adjoint, params)
    }

    /// [`StateVector::apply_named_gate`] without extra controls.
    pub fn apply_operation(
        &mut self,
        name: &str,
        wires: &[usize],
        adjoint: bool,
        params: &[f64],
    ) -> Result<()> {
        self.apply_named_gate(name, &[], wires, adjoint, params)
    }

    /// Apply a named gate, or `matrix` over `wires` when `name` is not a known gate.
    pub fn apply_operation_with_matrix(
        &mut self,
        name: &str,
        wires: &[usize],
        adjoint: bool,
        params: &[f64],
        matrix: &[Complex<B::Scalar>],
    ) -> Result<()> {
        match GateKind::from_name(name) {
            Ok(kind) => self.apply_gate(kind, &[], wires, adjoint, params),
            Err(err) if matrix.is_empty() => Err(err),
            Err(_) => {
                trace!("applying `{name}` as a custom matrix");
                self.apply_matrix(matrix, &[], wires, adjoint)
            }
        }
    }

    pub fn apply_gate(
        &mut self,
        kind: GateKind,
        control_wires: &[usize],
        wires: &[usize],
        adjoint: bool,
        params: &[f64],
    ) -> Result<()> {
        let op = self.resolve_named(kind, control_wires, wires, adjoint, params)?;
        self.launch(&[op])
    }

    /// Apply an explicit row-major matrix without consulting the gate cache.
    ///
    /// A `2^|T|` matrix acts on `target_wires` where every control is set. A
    /// `2^(|C|+|T|)` matrix is instead taken as dense over the controls
    /// followed by the targets (for example a 4x4 `CNOT` over one control and
    /// one target).
    pub fn apply_matrix(
        &mut self,
        matrix: &[Complex<B::Scalar>],
        control_wires: &[usize],
        target_wires: &[usize],
        adjoint: bool,
    ) -> Result<()> {
        let op = self.resolve_matrix(matrix, control_wires, target_wires, adjoint)?;
        self.launch(&[op])
    }

    /// Apply `gates` strictly in order. Every gate is validated before the
    /// first one runs.
    pub fn apply_batch(&mut self, gates: &[GateDescriptor<B::Scalar>]) -> Result<()> {
        let ops = gates
            .iter()
            .map(|gate| self.resolve(gate))
            .collect::<Result<Vec<_>>>()?;
        self.launch(&ops)
    }

    /// List form of [`StateVector::apply_batch`] over named gates. `params` may
    /// be empty when no gate takes parameters.
    pub fn apply_operations(
        &mut self,
        names: &[&str],
        wires: &[Vec<usize>],
        adjoints: &[bool],
        params: &[Vec<f64>],
    ) -> Result<()> {
        if wires.len() != names.len() {
            return Err(Error::size_mismatch("operation wires", names.len(), wires.len()));
        }
        if adjoints.len() != names.len() {
            return Err(Error::size_mismatch(
                "operation adjoint flags",
                names.len(),
                adjoints.len(),
            ));
        }
        if !params.is_empty() && params.len() != names.len() {
            return Err(Error::size_mismatch(
                "operation parameters",
                names.len(),
                params.len(),
            ));
        }

        let ops = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let kind = GateKind::from_name(name)?;
                let gate_params = params.get(i).map_or(&[][..], Vec::as_slice);
                self.resolve_named(kind, &[], &wires[i], adjoints[i], gate_params)
            })
            .collect::<Result<Vec<_>>>()?;
        self.launch(&ops)
    }

    fn resolve(&mut self, gate: &GateDescriptor<B::Scalar>) -> Result<KernelOp<B::Scalar>> {
        match &gate.source {
            GateSource::Named(kind) => self.resolve_named(
                *kind,
                &gate.control_wires,
                &gate.target_wires,
                gate.adjoint,
                &gate.params,
            ),
            GateSource::Custom { matrix, .. } => self.resolve_matrix(
                matrix,
                &gate.control_wires,
                &gate.target_wires,
                gate.adjoint,
            ),
        }
    }

    fn resolve_named(
        &mut self,
        kind: GateKind,
        control_wires: &[usize],
        wires: &[usize],
        adjoint: bool,
        params: &[f64],
    ) -> Result<KernelOp<B::Scalar>> {
        if wires.len() != kind.wire_count() {
            return Err(Error::InvalidWire(format!(
                "{kind} acts on {} wire(s) but {} were given",
                kind.wire_count(),
                wires.len()
            )));
        }
        let (own_controls, targets) = wires.split_at(kind.control_count());
        let controls = [control_wires, own_controls].concat();
        self.check_wires(&controls, targets)?;
        kind.check_params(params)?;

        let matrix = self.cache.get_matrix(kind, params, adjoint)?;
        Ok(KernelOp::new(matrix, controls, targets.to_vec()))
    }

    fn resolve_matrix(
        &self,
        matrix: &[Complex<B::Scalar>],
        control_wires: &[usize],
        target_wires: &[usize],
        adjoint: bool,
    ) -> Result<KernelOp<B::Scalar>> {
        self.check_wires(control_wires, target_wires)?;

        let target_entries = 1usize << (2 * target_wires.len());
        let (controls, targets) = if matrix.len() == target_entries {
            (control_wires.to_vec(), target_wires.to_vec())
        } else if !control_wires.is_empty()
            && matrix.len() == 1usize << (2 * (control_wires.len() + target_wires.len()))
        {
            (Vec::new(), [control_wires, target_wires].concat())
        } else {
            return Err(Error::size_mismatch(
                "gate matrix",
                target_entries,
                matrix.len(),
            ));
        };

        if targets.len() > MAX_KERNEL_TARGETS {
            return Err(Error::InvalidWire(format!(
                "at most {MAX_KERNEL_TARGETS} matrix wires are supported but {} were given",
                targets.len()
            )));
        }

        let dimension = 1 << targets.len();
        let matrix: Arc<[Complex<B::Scalar>]> = if adjoint {
            kernel::adjoint(matrix, dimension).into()
        } else {
            matrix.into()
        };
        Ok(KernelOp::new(matrix, controls, targets))
    }

    fn check_wires(&self, controls: &[usize], targets: &[usize]) -> Result<()> {
        if targets.is_empty() {
            return Err(Error::InvalidWire("no target wires given".to_string()));
        }
        let mut seen = vec![false; self.qubit_count];
        for &wire in controls.iter().chain(targets) {
            if wire >= self.qubit_count {
                return Err(Error::InvalidWire(format!(
                    "wire {wire} is out of range for {} qubit(s)",
                    self.qubit_count
                )));
            }
            if std::mem::replace(&mut seen[wire], true) {
                return Err(Error::InvalidWire(format!(
                    "wire {wire} is used more than once"
                )));
            }
        }
        Ok(())
    }

    fn launch(&self, ops: &[KernelOp<B::Scalar>]) -> Result<()> {
        let Some(allocation) = self.buffer.allocation() else {
            return Err(Error::device("state vector has no device allocation"));
        };
        trace!("launching {} gate kernel(s)", ops.len());
        self.buffer
            .backend()
            .launch(allocation, self.qubit_count, ops, TransferMode::Sync)
    }
}

// Typed gate surface. Each method resolves through the same path as the name dispatcher.
impl<B: Backend> StateVector<B> {
    pub fn apply_identity(&mut self, wires: &[usize], adjoint: bool) -> Result<()> {
        self.apply_gate(GateKind::Identity, &[], wires, adjoint, &[])
    }

    pub fn apply_pauli_x(&mut self, wires: &[usize], adjoint: bool) -> Result<()> {
        self.apply_gate(GateKind::PauliX, &[], wires, adjoint, &[])
    }

    pub fn apply_pauli_y(&mut self, wires: &[usize], adjoint: bool) -> Result<()> {
        self.apply_gate(GateKind::PauliY, &[], wires, adjoint, &[])
    }

    pub fn apply_pauli_z(&mut self, wires: &[usize], adjoint: bool) -> Result<()> {
        self.apply_gate(GateKind::PauliZ, &[], wires, adjoint, &[])
    }

    pub fn apply_hadamard(&mut self, wires: &[usize], adjoint: bool) -> Result<()> {
        self.apply_gate(GateKind::Hadamard, &[], wires, adjoint, &[])
    }

    pub fn apply_s(&mut self, wires: &[usize], adjoint: bool) -> Result<()> {
        self.apply_gate(GateKind::S, &[], wires, adjoint, &[])
    }

    pub fn apply_t(&mut self, wires: &[usize], adjoint: bool) -> Result<()> {
        self.apply_gate(GateKind::T, &[], wires, adjoint, &[])
    }

    pub fn apply_sx(&mut self, wires: &[usize], adjoint: bool) -> Result<()> {
        self.apply_gate(GateKind::SX, &[], wires, adjoint, &[])
    }

    pub fn apply_rx(&mut self, wires: &[usize], adjoint: bool, angle: f64) -> Result<()> {
        self.apply_gate(GateKind::RX, &[], wires, adjoint, &[angle])
    }

    pub fn apply_ry(&mut self, wires: &[usize], adjoint: bool, angle: f64) -> Result<()> {
        self.apply_gate(GateKind::RY, &[], wires, adjoint, &[angle])
    }

    pub fn apply_rz(&mut self, wires: &[usize], adjoint: bool, angle: f64) -> Result<()> {
        self.apply_gate(GateKind::RZ, &[], wires, adjoint, &[angle])
    }

    pub fn apply_phase_shift(&mut self, wires: &[usize], adjoint: bool, angle: f64) -> Result<()> {
        self.apply_gate(GateKind::PhaseShift, &[], wires, adjoint, &[angle])
    }

    pub fn apply_controlled_phase_shift(
        &mut self,
        wires: &[usize],
        adjoint: bool,
        angle: f64,
    ) -> Result<()> {
        self.apply_gate(GateKind::ControlledPhaseShift, &[], wires, adjoint, &[angle])
    }

    pub fn apply_rot(
        &mut self,
        wires: &[usize],
        adjoint: bool,
        phi: f64,
        theta: f64,
        omega: f64,
    ) -> Result<()> {
        self.apply_gate(GateKind::Rot, &[], wires, adjoint, &[phi, theta, omega])
    }

    pub fn apply_crot(
        &mut self,
        wires: &[usize],
        adjoint: bool,
        phi: f64,
        theta: f64,
        omega: f64,
    ) -> Result<()> {
        self.apply_gate(GateKind::CRot, &[], wires, adjoint, &[phi, theta, omega])
    }

    pub fn apply_cnot(&mut self, wires: &[usize], adjoint: bool) -> Result<()> {
        self.apply_gate(GateKind::CNOT, &[], wires, adjoint, &[])
    }

    pub fn apply_cy(&mut self, wires: &[usize], adjoint: bool) -> Result<()> {
        self.apply_gate(GateKind::CY, &[], wires, adjoint, &[])
    }

    pub fn apply_cz(&mut self, wires: &[usize], adjoint: bool) -> Result<()> {
        self.apply_gate(GateKind::CZ, &[], wires, adjoint, &[])
    }

    pub fn apply_crx(&mut self, wires: &[usize], adjoint: bool, angle: f64) -> Result<()> {
        self.apply_gate(GateKind::CRX, &[], wires, adjoint, &[angle])
    }

    pub fn apply_cry(&mut self, wires: &[usize], adjoint: bool, angle: f64) -> Result<()> {
        self.apply_gate(GateKind::CRY, &[], wires, adjoint, &[angle])
    }

    pub fn apply_crz(&mut self, wires: &[usize], adjoint: bool, angle: f64) -> Result<()> {
        self.apply_gate(GateKind::CRZ, &[], wires, adjoint, &[angle])
    }

    pub fn apply_swap(&mut self, wires: &[usize], adjoint: bool) -> Result<()> {
        self.apply_gate(GateKind::SWAP, &[], wires, adjoint, &[])
    }

    pub fn apply_cswap(&mut self, wires: &[usize], adjoint: bool) -> Result<()> {
        self.apply_gate(GateKind::CSWAP, &[], wires, adjoint, &[])
    }

    pub fn apply_toffoli(&mut self, wires: &[usize], adjoint: bool) -> Result<()> {
        self.apply_gate(GateKind::Toffoli, &[], wires, adjoint, &[])
    }

    pub fn apply_ising_xx(&mut self, wires: &[usize], adjoint: bool, angle: f64) -> Result<()> {
        self.apply_gate(GateKind::IsingXX, &[], wires, adjoint, &[angle])
    }

    pub fn apply_ising_yy(&mut self, wires: &[usize], adjoint: bool, angle: f64) -> Result<()> {
        self.apply_gate(GateKind::IsingYY, &[], wires, adjoint, &[angle])
    }

    pub fn apply_ising_zz(&mut self, wires: &[usize], adjoint: bool, angle: f64) -> Result<()> {
        self.apply_gate(GateKind::IsingZZ, &[], wires, adjoint, &[angle])
    }
}

impl<B: Backend> std::fmt::Debug for StateVector<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateVector")
            .field("qubit_count", &self.qubit_count)
            .field("buffer", &self.buffer)
            .finish_non_exhaustive()
    }
}

fn state_len<B: Backend>(backend: &B, qubit_count: usize) -> Result<usize> {
    u32::try_from(qubit_count)
        .ok()
        .and_then(|shift| 1usize.checked_shl(shift))
        .filter(|len| len.checked_mul(size_of::<Complex<B::Scalar>>()).is_some())
        .ok_or_else(|| Error::Allocation {
            bytes: usize::MAX,
            device_id: backend.tag().device_id,
            reason: format!("a {qubit_count}-qubit state vector does not fit in memory"),
        })
}
