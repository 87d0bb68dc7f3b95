// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The closed set of named gates and their dense matrices.
//!
//! Matrices are built in double precision over the gate's *target* wires only;
//! intrinsic controls (the `C` in `CNOT`, `CRot`, `Toffoli`, ...) are applied by
//! the kernel through its control mask.


pub mod cache;

use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::LazyLock;

use nalgebra::{Complex, DMatrix, dmatrix};

use crate::error::{Error, Result};

pub use cache::GateCache;

type C64 = Complex<f64>;

/// Every gate recognised by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GateKind {
    Identity,
    PauliX,
    PauliY,
    PauliZ,
    Hadamard,
    S,
    T,
    SX,
    RX,
    RY,
    RZ,
    PhaseShift,
    Rot,
    CNOT,
    CY,
    CZ,
    SWAP,
    ControlledPhaseShift,
    CRX,
    CRY,
    CRZ,
    CRot,
    IsingXX,
    IsingYY,
    IsingZZ,
    Toffoli,
    CSWAP,
}

impl GateKind {
    pub const ALL: [GateKind; 27] = [
        GateKind::Identity,
        GateKind::PauliX,
        GateKind::PauliY,
        GateKind::PauliZ,
        GateKind::Hadamard,
        GateKind::S,
        GateKind::T,
        GateKind::SX,
        GateKind::RX,
        GateKind::RY,
        GateKind::RZ,
        GateKind::PhaseShift,
        GateKind::Rot,
        GateKind::CNOT,
        GateKind::CY,
        GateKind::CZ,
        GateKind::SWAP,
        GateKind::ControlledPhaseShift,
        GateKind::CRX,
        GateKind::CRY,
        GateKind::CRZ,
        GateKind::CRot,
        GateKind::IsingXX,
        GateKind::IsingYY,
        GateKind::IsingZZ,
        GateKind::Toffoli,
        GateKind::CSWAP,
    ];

    /// Resolve an exact, case-sensitive gate name.
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == name)
            .ok_or_else(|| Error::UnknownGate(name.to_string()))
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            GateKind::Identity => "Identity",
            GateKind::PauliX => "PauliX",
            GateKind::PauliY => "PauliY",
            GateKind::PauliZ => "PauliZ",
            GateKind::Hadamard => "Hadamard",
            GateKind::S => "S",
            GateKind::T => "T",
            GateKind::SX => "SX",
            GateKind::RX => "RX",
            GateKind::RY => "RY",
            GateKind::RZ => "RZ",
            GateKind::PhaseShift => "PhaseShift",
            GateKind::Rot => "Rot",
            GateKind::CNOT => "CNOT",
            GateKind::CY => "CY",
            GateKind::CZ => "CZ",
            GateKind::SWAP => "SWAP",
            GateKind::ControlledPhaseShift => "ControlledPhaseShift",
            GateKind::CRX => "CRX",
            GateKind::CRY => "CRY",
            GateKind::CRZ => "CRZ",
            GateKind::CRot => "CRot",
            GateKind::IsingXX => "IsingXX",
            GateKind::IsingYY => "IsingYY",
            GateKind::IsingZZ => "IsingZZ",
            GateKind::Toffoli => "Toffoli",
            GateKind::CSWAP => "CSWAP",
        }
    }

    /// Leading wires of the flat wire list that act as controls.
    #[must_use]
    pub fn control_count(self) -> usize {
        match self {
            GateKind::CNOT
            | GateKind::CY
            | GateKind::CZ
            | GateKind::ControlledPhaseShift
            | GateKind::CRX
            | GateKind::CRY
            | GateKind::CRZ
            | GateKind::CRot
            | GateKind::CSWAP => 1,
            GateKind::Toffoli => 2,
            _ => 0,
        }
    }

    /// Wires the matrix acts on.
    #[must_use]
    pub fn target_count(self) -> usize {
        match self {
            GateKind::SWAP
            | GateKind::CSWAP
            | GateKind::IsingXX
            | GateKind::IsingYY
            | GateKind::IsingZZ => 2,
            _ => 1,
        }
    }

    #[must_use]
    pub fn wire_count(self) -> usize {
        self.control_count() + self.target_count()
    }

    #[must_use]
    pub fn param_count(self) -> usize {
        match self {
            GateKind::RX
            | GateKind::RY
            | GateKind::RZ
            | GateKind::PhaseShift
            | GateKind::ControlledPhaseShift
            | GateKind::CRX
            | GateKind::CRY
            | GateKind::CRZ
            | GateKind::IsingXX
            | GateKind::IsingYY
            | GateKind::IsingZZ => 1,
            GateKind::Rot | GateKind::CRot => 3,
            _ => 0,
        }
    }

    pub(crate) fn check_params(self, params: &[f64]) -> Result<()> {
        if params.len() == self.param_count() {
            Ok(())
        } else {
            Err(Error::InvalidParameterCount {
                gate: self.name().to_string(),
                expected: self.param_count(),
                actual: params.len(),
            })
        }
    }
}

impl Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for GateKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s)
    }
}

fn c(re: f64, im: f64) -> C64 {
    Complex::new(re, im)
}

static IDENTITY: LazyLock<DMatrix<C64>> = LazyLock::new(|| DMatrix::identity(2, 2));

static PAULI_X: LazyLock<DMatrix<C64>> = LazyLock::new(|| {
    dmatrix![c(0., 0.), c(1., 0.);
             c(1., 0.), c(0., 0.)]
});

static PAULI_Y: LazyLock<DMatrix<C64>> = LazyLock::new(|| {
    dmatrix![c(0., 0.), c(0., -1.);
             c(0., 1.), c(0., 0.)]
});

static PAULI_Z: LazyLock<DMatrix<C64>> = LazyLock::new(|| {
    dmatrix![c(1., 0.), c(0., 0.);
             c(0., 0.), c(-1., 0.)]
});

static HADAMARD: LazyLock<DMatrix<C64>> = LazyLock::new(|| {
    let f = std::f64::consts::FRAC_1_SQRT_2;
    dmatrix![c(f, 0.), c(f, 0.);
             c(f, 0.), c(-f, 0.)]
});

static S: LazyLock<DMatrix<C64>> = LazyLock::new(|| {
    dmatrix![c(1., 0.), c(0., 0.);
             c(0., 0.), c(0., 1.)]
});

static T: LazyLock<DMatrix<C64>> = LazyLock::new(|| {
    let phase = (Complex::i() * std::f64::consts::FRAC_PI_4).exp();
    dmatrix![c(1., 0.), c(0., 0.);
             c(0., 0.), phase]
});

static SX: LazyLock<DMatrix<C64>> = LazyLock::new(|| {
    dmatrix![c(0.5, 0.5), c(0.5, -0.5);
             c(0.5, -0.5), c(0.5, 0.5)]
});

static SWAP: LazyLock<DMatrix<C64>> = LazyLock::new(|| {
    let (o, l) = (c(0., 0.), c(1., 0.));
    dmatrix![l, o, o, o;
             o, o, l, o;
             o, l, o, o;
             o, o, o, l]
});

fn fixed(kind: GateKind) -> Option<&'static DMatrix<C64>> {
    let matrix = match kind {
        GateKind::Identity => &IDENTITY,
        GateKind::PauliX | GateKind::CNOT | GateKind::Toffoli => &PAULI_X,
        GateKind::PauliY | GateKind::CY => &PAULI_Y,
        GateKind::PauliZ | GateKind::CZ => &PAULI_Z,
        GateKind::Hadamard => &HADAMARD,
        GateKind::S => &S,
        GateKind::T => &T,
        GateKind::SX => &SX,
        GateKind::SWAP | GateKind::CSWAP => &SWAP,
        _ => return None,
    };
    Some(LazyLock::force(matrix))
}

fn rx(angle: f64) -> DMatrix<C64> {
    let (sin, cos) = (angle / 2.0).sin_cos();
    dmatrix![c(cos, 0.), c(0., -sin);
             c(0., -sin), c(cos, 0.)]
}

fn ry(angle: f64) -> DMatrix<C64> {
    let (sin, cos) = (angle / 2.0).sin_cos();
    dmatrix![c(cos, 0.), c(-sin, 0.);
             c(sin, 0.), c(cos, 0.)]
}

fn rz(angle: f64) -> DMatrix<C64> {
    let i = Complex::i();
    let a = (-i * angle / 2.0).exp();
    let b = (i * angle / 2.0).exp();
    dmatrix![a, c(0., 0.);
             c(0., 0.), b]
}

fn phase_shift(angle: f64) -> DMatrix<C64> {
    dmatrix![c(1., 0.), c(0., 0.);
             c(0., 0.), Complex::from_polar(1.0, angle)]
}

/// `RZ(omega) RY(theta) RZ(phi)`
fn rot(phi: f64, theta: f64, omega: f64) -> DMatrix<C64> {
    let (sin, cos) = (theta / 2.0).sin_cos();
    let sum = (phi + omega) / 2.0;
    let diff = (phi - omega) / 2.0;
    dmatrix![Complex::from_polar(cos, -sum), -Complex::from_polar(sin, diff);
             Complex::from_polar(sin, -diff), Complex::from_polar(cos, sum)]
}

fn ising_xx(angle: f64) -> DMatrix<C64> {
    let (sin, cos) = (angle / 2.0).sin_cos();
    let (o, a, b) = (c(0., 0.), c(0., -sin), c(cos, 0.));
    dmatrix![b, o, o, a;
             o, b, a, o;
             o, a, b, o;
             a, o, o, b]
}

fn ising_yy(angle: f64) -> DMatrix<C64> {
    let (sin, cos) = (angle / 2.0).sin_cos();
    let (o, a, b) = (c(0., 0.), c(0., sin), c(cos, 0.));
    dmatrix![b, o, o, a;
             o, b, -a, o;
             o, -a, b, o;
             a, o, o, b]
}

fn ising_zz(angle: f64) -> DMatrix<C64> {
    let i = Complex::i();
    let a = (-i * angle / 2.0).exp();
    let b = (i * angle / 2.0).exp();
    let o = c(0., 0.);
    dmatrix![a, o, o, o;
             o, b, o, o;
             o, o, b, o;
             o, o, o, a]
}

/// Matrix of `kind` over its target wires, conjugate-transposed when `adjoint` is set.
///
/// Parametrized families derive their adjoint from the parameters: single-angle
/// gates negate the angle, `Rot`/`CRot` map `(phi, theta, omega)` to
/// `(-omega, -theta, -phi)`.
pub fn gate_matrix(kind: GateKind, params: &[f64], adjoint: bool) -> Result<DMatrix<C64>> {
    kind.check_params(params)?;

    if let Some(matrix) = fixed(kind) {
        return Ok(if adjoint {
            matrix.adjoint()
        } else {
            matrix.clone()
        });
    }

    let sign = if adjoint { -1.0 } else { 1.0 };
    let matrix = match kind {
        GateKind::RX | GateKind::CRX => rx(sign * params[0]),
        GateKind::RY | GateKind::CRY => ry(sign * params[0]),
        GateKind::RZ | GateKind::CRZ => rz(sign * params[0]),
        GateKind::PhaseShift | GateKind::ControlledPhaseShift => phase_shift(sign * params[0]),
        GateKind::IsingXX => ising_xx(sign * params[0]),
        GateKind::IsingYY => ising_yy(sign * params[0]),
        GateKind::IsingZZ => ising_zz(sign * params[0]),
        GateKind::Rot | GateKind::CRot => {
            let (phi, theta, omega) = (params[0], params[1], params[2]);
            if adjoint {
                rot(-omega, -theta, -phi)
            } else {
                rot(phi, theta, omega)
            }
        }
        _ => unreachable!("fixed gates are resolved above"),
    };
    Ok(matrix)
}

/// Flatten a square matrix into row-major order.
#[must_use]
pub fn row_major(matrix: &DMatrix<C64>) -> Vec<C64> {
    matrix.transpose().iter().copied().collect()
}
