// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::f64::consts::FRAC_1_SQRT_2;

use expect_test::expect;
use num_complex::Complex;
use proptest::prelude::*;
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{GateDescriptor, StateVector};
use crate::buffer::DeviceBuffer;
use crate::config::BackendConfig;
use crate::device::{Backend, GpuBackend, HostBackend};
use crate::error::{Error, Result};
use crate::gates::GateKind;
use crate::test_utils::{
    TOLERANCE, assert_approx_eq, c64, format_probabilities, uniform_superposition,
};

type HostState = StateVector<HostBackend>;

fn zero_state(qubit_count: usize) -> HostState {
    StateVector::new(&HostBackend::new(), qubit_count).expect("state vector should allocate")
}

fn seeded(qubit_count: usize, amplitudes: &[Complex<f64>]) -> HostState {
    StateVector::from_amplitudes(&HostBackend::new(), qubit_count, amplitudes)
        .expect("state vector should allocate")
}

fn plus_state(qubit_count: usize) -> HostState {
    let mut sv = zero_state(qubit_count);
    let names = vec!["Hadamard"; qubit_count];
    let wires: Vec<Vec<usize>> = (0..qubit_count).map(|w| vec![w]).collect();
    sv.apply_operations(&names, &wires, &vec![false; qubit_count], &[])
        .expect("hadamards should apply");
    sv
}

fn read(sv: &HostState) -> Vec<Complex<f64>> {
    sv.amplitudes().expect("readback should succeed")
}

fn random_state(qubit_count: usize, seed: u64) -> Vec<Complex<f64>> {
    let mut rng = StdRng::seed_from_u64(seed);
    let raw: Vec<Complex<f64>> = (0..1 << qubit_count)
        .map(|_| c64(rng.gen_range(-1.0..1.0), rng.gen_range(-1.0..1.0)))
        .collect();
    let norm = raw.iter().map(Complex::norm_sqr).sum::<f64>().sqrt();
    raw.into_iter().map(|a| a / norm).collect()
}

/// Call the typed method for `kind`.
fn apply_direct<B: Backend>(
    sv: &mut StateVector<B>,
    kind: GateKind,
    wires: &[usize],
    adjoint: bool,
    p: &[f64],
) -> Result<()> {
    match kind {
        GateKind::Identity => sv.apply_identity(wires, adjoint),
        GateKind::PauliX => sv.apply_pauli_x(wires, adjoint),
        GateKind::PauliY => sv.apply_pauli_y(wires, adjoint),
        GateKind::PauliZ => sv.apply_pauli_z(wires, adjoint),
        GateKind::Hadamard => sv.apply_hadamard(wires, adjoint),
        GateKind::S => sv.apply_s(wires, adjoint),
        GateKind::T => sv.apply_t(wires, adjoint),
        GateKind::SX => sv.apply_sx(wires, adjoint),
        GateKind::RX => sv.apply_rx(wires, adjoint, p[0]),
        GateKind::RY => sv.apply_ry(wires, adjoint, p[0]),
        GateKind::RZ => sv.apply_rz(wires, adjoint, p[0]),
        GateKind::PhaseShift => sv.apply_phase_shift(wires, adjoint, p[0]),
        GateKind::Rot => sv.apply_rot(wires, adjoint, p[0], p[1], p[2]),
        GateKind::CNOT => sv.apply_cnot(wires, adjoint),
        GateKind::CY => sv.apply_cy(wires, adjoint),
        GateKind::CZ => sv.apply_cz(wires, adjoint),
        GateKind::SWAP => sv.apply_swap(wires, adjoint),
        GateKind::ControlledPhaseShift => sv.apply_controlled_phase_shift(wires, adjoint, p[0]),
        GateKind::CRX => sv.apply_crx(wires, adjoint, p[0]),
        GateKind::CRY => sv.apply_cry(wires, adjoint, p[0]),
        GateKind::CRZ => sv.apply_crz(wires, adjoint, p[0]),
        GateKind::CRot => sv.apply_crot(wires, adjoint, p[0], p[1], p[2]),
        GateKind::IsingXX => sv.apply_ising_xx(wires, adjoint, p[0]),
        GateKind::IsingYY => sv.apply_ising_yy(wires, adjoint, p[0]),
        GateKind::IsingZZ => sv.apply_ising_zz(wires, adjoint, p[0]),
        GateKind::Toffoli => sv.apply_toffoli(wires, adjoint),
        GateKind::CSWAP => sv.apply_cswap(wires, adjoint),
    }
}

#[test]
fn new_state_is_all_zeros_basis_state() {
    let sv = zero_state(3);
    assert_eq!(sv.qubit_count(), 3);
    assert_eq!(sv.len(), 8);
    let mut expected = vec![c64(0., 0.); 8];
    expected[0] = c64(1., 0.);
    assert_eq!(read(&sv), expected);
}

#[test]
fn seeding_with_the_wrong_length_fails() {
    let err = StateVector::from_amplitudes(&HostBackend::<f64>::new(), 2, &[c64(1., 0.); 3])
        .expect_err("three amplitudes cannot seed two qubits");
    assert_eq!(
        err,
        Error::SizeMismatch {
            context: "initial state",
            required: 4,
            actual: 3
        }
    );
}

#[test]
fn rx_matches_reference_values() {
    let angles = [0.1, 0.6];
    let expected = [
        [c64(0.998_750_260_394_966_3, 0.0), c64(0.0, -0.049_979_169_270_678_34)],
        [c64(0.955_336_489_125_606_1, 0.0), c64(0.0, -0.295_520_206_661_339_5)],
    ];

    for adjoint in [false, true] {
        for (angle, expected) in angles.iter().zip(&expected) {
            let expected: Vec<_> = expected
                .iter()
                .map(|v| if adjoint { v.conj() } else { *v })
                .collect();

            let mut direct = zero_state(1);
            direct.apply_rx(&[0], adjoint, *angle).expect("RX");
            assert_approx_eq(&read(&direct), &expected, TOLERANCE);

            let mut dispatched = zero_state(1);
            dispatched
                .apply_operation("RX", &[0], adjoint, &[*angle])
                .expect("RX");
            assert_approx_eq(&read(&dispatched), &expected, TOLERANCE);
        }
    }
}

fn ry_reference(adjoint: bool) -> Vec<[Complex<f64>; 2]> {
    let forward = [
        [c64(0.873_198_304_456_281_7, 0.047_862_689_546_603_39), c64(0.087_612_065_543_192_4, -0.477_030_407_851_843_03)],
        [c64(0.824_377_111_910_512_2, 0.164_393_966_025_530_08), c64(0.300_921_136_333_346_8, -0.450_359_268_806_946_04)],
        [c64(0.105_751_129_056_298_31, 0.475_931_960_407_585_34), c64(0.871_187_609_896_621_5, -0.057_772_105_107_247_7)],
    ];
    forward
        .iter()
        .map(|[a, b]| {
            if adjoint {
                [a.conj(), c64(-b.re, b.im)]
            } else {
                [*a, *b]
            }
        })
        .collect()
}

#[test]
fn ry_matches_reference_values() {
    let init = [c64(0.877_582_561_890_372_8, 0.0), c64(0.0, -0.479_425_538_604_203_06)];
    let angles = [0.2, 0.7, 2.9];

    for adjoint in [false, true] {
        for (angle, expected) in angles.iter().zip(ry_reference(adjoint)) {
            let mut direct = seeded(1, &init);
            direct.apply_ry(&[0], adjoint, *angle).expect("RY");
            assert_approx_eq(&read(&direct), &expected, 1e-6);

            let mut dispatched = seeded(1, &init);
            dispatched
                .apply_operation("RY", &[0], adjoint, &[*angle])
                .expect("RY");
            assert_approx_eq(&read(&dispatched), &expected, 1e-6);
        }
    }
}

#[test]
fn ry_matches_reference_values_in_single_precision() {
    let backend = HostBackend::<f32>::new();
    let init = [Complex::new(0.877_582_56_f32, 0.0), Complex::new(0.0, -0.479_425_55_f32)];
    for (angle, expected) in [0.2, 0.7, 2.9].iter().zip(ry_reference(false)) {
        let mut sv = StateVector::from_amplitudes(&backend, 1, &init).expect("state vector");
        sv.apply_ry(&[0], false, *angle).expect("RY");
        let actual: Vec<Complex<f64>> = sv
            .amplitudes()
            .expect("readback")
            .iter()
            .map(|a| c64(f64::from(a.re), f64::from(a.im)))
            .collect();
        assert_approx_eq(&actual, &expected, 1e-6);
    }
}

/// Diagonal gate `diag(d0, d1)` applied to `wire` of `|+++>`.
fn diagonal_on_plus(wire: usize, d0: Complex<f64>, d1: Complex<f64>) -> Vec<Complex<f64>> {
    let coef = 1.0 / (2.0 * 2.0_f64.sqrt());
    (0..8)
        .map(|index| {
            let bit = (index >> (2 - wire)) & 1;
            (if bit == 0 { d0 } else { d1 }) * coef
        })
        .collect()
}

#[test]
fn rz_on_each_wire_of_plus_state_applies_diagonal_phases() {
    let angles = [0.2, 0.7, 2.9];
    for (wire, angle) in angles.iter().enumerate() {
        let expected = diagonal_on_plus(
            wire,
            Complex::from_polar(1.0, -angle / 2.0),
            Complex::from_polar(1.0, angle / 2.0),
        );

        let mut direct = plus_state(3);
        direct.apply_rz(&[wire], false, *angle).expect("RZ");
        assert_approx_eq(&read(&direct), &expected, TOLERANCE);

        let mut dispatched = plus_state(3);
        dispatched
            .apply_operation("RZ", &[wire], false, &[*angle])
            .expect("RZ");
        assert_approx_eq(&read(&dispatched), &expected, TOLERANCE);
    }
}

#[test]
fn phase_shift_on_each_wire_of_plus_state() {
    let angles = [0.3, 0.8, 2.4];
    for (wire, angle) in angles.iter().enumerate() {
        let expected = diagonal_on_plus(wire, c64(1., 0.), Complex::from_polar(1.0, *angle));

        let mut direct = plus_state(3);
        direct.apply_phase_shift(&[wire], false, *angle).expect("PhaseShift");
        assert_approx_eq(&read(&direct), &expected, TOLERANCE);

        let mut dispatched = plus_state(3);
        dispatched
            .apply_operation("PhaseShift", &[wire], false, &[*angle])
            .expect("PhaseShift");
        assert_approx_eq(&read(&dispatched), &expected, TOLERANCE);
    }
}

#[test]
fn controlled_phase_shift_only_touches_the_control_subspace() {
    let coef = 1.0 / (2.0 * 2.0_f64.sqrt());
    let one = c64(coef, 0.0);
    let cases = [
        ([0, 1], 0.3, [6, 7]),
        ([1, 2], 2.4, [3, 7]),
    ];
    for (wires, angle, phased) in cases {
        let mut expected = vec![one; 8];
        for index in phased {
            expected[index] = Complex::from_polar(coef, angle);
        }

        let mut direct = plus_state(3);
        direct
            .apply_controlled_phase_shift(&wires, false, angle)
            .expect("ControlledPhaseShift");
        assert_approx_eq(&read(&direct), &expected, TOLERANCE);

        let mut dispatched = plus_state(3);
        dispatched
            .apply_operation("ControlledPhaseShift", &wires, false, &[angle])
            .expect("ControlledPhaseShift");
        assert_approx_eq(&read(&dispatched), &expected, TOLERANCE);
    }
}

/// First column of `Rot(phi, theta, omega)`.
fn rot_column(phi: f64, theta: f64, omega: f64) -> (Complex<f64>, Complex<f64>) {
    let (sin, cos) = (theta / 2.0).sin_cos();
    (
        Complex::from_polar(cos, -(phi + omega) / 2.0),
        Complex::from_polar(sin, -(phi - omega) / 2.0),
    )
}

#[test]
fn rot_on_each_wire_of_zero_state() {
    let angles = [[0.3, 0.8, 2.4], [0.5, 1.1, 3.0], [2.3, 0.1, 0.4]];
    for (wire, [phi, theta, omega]) in angles.into_iter().enumerate() {
        let (top, bottom) = rot_column(phi, theta, omega);
        let mut expected = vec![c64(0., 0.); 8];
        expected[0] = top;
        expected[1 << (2 - wire)] = bottom;

        let mut direct = zero_state(3);
        direct.apply_rot(&[wire], false, phi, theta, omega).expect("Rot");
        assert_approx_eq(&read(&direct), &expected, 1e-6);

        let mut dispatched = zero_state(3);
        dispatched
            .apply_operation("Rot", &[wire], false, &[phi, theta, omega])
            .expect("Rot");
        assert_approx_eq(&read(&dispatched), &expected, 1e-6);
    }
}

#[test]
fn crot_acts_only_when_the_control_is_set() {
    let (phi, theta, omega) = (0.3, 0.8, 2.4);

    let mut untouched = zero_state(3);
    untouched.apply_crot(&[0, 1], false, phi, theta, omega).expect("CRot");
    assert_eq!(read(&untouched), read(&zero_state(3)));

    let (top, bottom) = rot_column(phi, theta, omega);
    let mut expected = vec![c64(0., 0.); 8];
    expected[0b100] = top;
    expected[0b110] = bottom;

    let mut direct = zero_state(3);
    direct.apply_operation("PauliX", &[0], false, &[]).expect("X");
    direct.apply_crot(&[0, 1], false, phi, theta, omega).expect("CRot");
    assert_approx_eq(&read(&direct), &expected, 1e-6);

    let mut dispatched = zero_state(3);
    dispatched.apply_operation("PauliX", &[0], false, &[]).expect("X");
    dispatched
        .apply_operation("CRot", &[0, 1], false, &[phi, theta, omega])
        .expect("CRot");
    assert_approx_eq(&read(&dispatched), &expected, 1e-6);
}

#[test]
fn two_pauli_sequence_equals_custom_product_matrix_on_every_wire() {
    let (o, l, i) = (c64(0., 0.), c64(1., 0.), c64(0., 1.));
    // Name lists the gates in application order; the matrix is their product
    let cases = [
        ("XZ", ["PauliX", "PauliZ"], [o, l, -l, o]),
        ("ZX", ["PauliZ", "PauliX"], [o, -l, l, o]),
        ("XY", ["PauliX", "PauliY"], [-i, o, o, i]),
        ("YX", ["PauliY", "PauliX"], [i, o, o, -i]),
        ("YZ", ["PauliY", "PauliZ"], [o, -i, -i, o]),
        ("ZY", ["PauliZ", "PauliY"], [o, i, i, o]),
    ];
    let qubit_count = 5;
    let init = random_state(qubit_count, 7);

    for (name, [first, second], matrix) in cases {
        let mut custom = seeded(qubit_count, &init);
        let mut expected = seeded(qubit_count, &init);
        for wire in 0..qubit_count {
            expected
                .apply_operations(&[first, second], &[vec![wire], vec![wire]], &[false, false], &[])
                .expect("pauli pair");
            custom
                .apply_operation_with_matrix(name, &[wire], false, &[0.0], &matrix)
                .expect("custom matrix");
        }
        assert_approx_eq(&read(&custom), &read(&expected), TOLERANCE);
    }
}

#[test]
fn custom_cz_matches_hadamard_cnot_hadamard() {
    let (o, l) = (c64(0., 0.), c64(1., 0.));
    let cz = [
        l, o, o, o, //
        o, l, o, o, //
        o, o, l, o, //
        o, o, o, -l,
    ];
    let init = uniform_superposition(3);

    let mut expected = seeded(3, &init);
    expected
        .apply_operations(
            &["Hadamard", "CNOT", "Hadamard"],
            &[vec![1], vec![0, 1], vec![1]],
            &[false, false, false],
            &[],
        )
        .expect("H CNOT H");

    let mut custom = seeded(3, &init);
    custom
        .apply_operation_with_matrix("CZmat", &[0, 1], false, &[0.0], &cz)
        .expect("custom CZ");

    assert_approx_eq(&read(&custom), &read(&expected), TOLERANCE);
}

#[test]
fn dense_controlled_matrix_matches_named_gate() {
    let (o, l) = (c64(0., 0.), c64(1., 0.));
    let cnot = [
        l, o, o, o, //
        o, l, o, o, //
        o, o, o, l, //
        o, o, l, o,
    ];
    let init = random_state(3, 11);

    let mut named = seeded(3, &init);
    named.apply_cnot(&[2, 0], false).expect("CNOT");

    let mut dense = seeded(3, &init);
    dense.apply_matrix(&cnot, &[2], &[0], false).expect("dense CNOT");

    assert_approx_eq(&read(&dense), &read(&named), 0.0);
}

#[test]
fn target_sized_matrix_with_controls_matches_toffoli() {
    let x = [c64(0., 0.), c64(1., 0.), c64(1., 0.), c64(0., 0.)];
    let init = random_state(4, 3);

    let mut named = seeded(4, &init);
    named.apply_toffoli(&[3, 0, 1], false).expect("Toffoli");

    let mut custom = seeded(4, &init);
    custom.apply_matrix(&x, &[3, 0], &[1], false).expect("controlled X");

    assert_approx_eq(&read(&custom), &read(&named), 0.0);
}

#[test]
fn adjoint_custom_matrix_undoes_the_matrix() {
    let s = [c64(1., 0.), c64(0., 0.), c64(0., 0.), c64(0., 1.)];
    let init = random_state(2, 5);
    let mut sv = seeded(2, &init);
    sv.apply_matrix(&s, &[], &[1], false).expect("S");
    sv.apply_matrix(&s, &[], &[1], true).expect("S adjoint");
    assert_approx_eq(&read(&sv), &init, TOLERANCE);
}

#[test]
fn matrix_of_the_wrong_size_is_rejected() {
    let mut sv = zero_state(2);
    let err = sv
        .apply_matrix(&[c64(1., 0.); 9], &[], &[0], false)
        .expect_err("nine entries is not a square power of two");
    assert_eq!(
        err,
        Error::SizeMismatch {
            context: "gate matrix",
            required: 4,
            actual: 9
        }
    );
}

#[test]
fn more_than_three_matrix_wires_are_rejected() {
    let mut sv = zero_state(4);
    let err = sv
        .apply_matrix(&vec![c64(0., 0.); 256], &[], &[0, 1, 2, 3], false)
        .expect_err("four target wires exceed the kernel limit");
    assert!(matches!(err, Error::InvalidWire(_)));
}

#[test]
fn validation_errors_leave_the_state_unchanged() {
    let init = random_state(3, 13);
    let mut sv = seeded(3, &init);

    let failures = [
        sv.apply_operation("RX", &[3], false, &[0.1]),
        sv.apply_operation("CNOT", &[1, 1], false, &[]),
        sv.apply_operation("CNOT", &[0], false, &[]),
        sv.apply_operation("RX", &[0], false, &[]),
        sv.apply_operation("Rot", &[0], false, &[0.1, 0.2]),
        sv.apply_operation("rx", &[0], false, &[0.1]),
        sv.apply_named_gate("PauliX", &[0], &[0], false, &[]),
        sv.apply_matrix(&[c64(1., 0.); 4], &[], &[], false),
    ];

    let messages = failures
        .into_iter()
        .map(|result| {
            let err = result.expect_err("request should be rejected");
            assert!(err.is_validation_error());
            err.to_string()
        })
        .collect::<Vec<_>>()
        .join("\n");
    expect![[r#"
        invalid wire: wire 3 is out of range for 3 qubit(s)
        invalid wire: wire 1 is used more than once
        invalid wire: CNOT acts on 2 wire(s) but 1 were given
        gate RX expects 1 parameter(s) but 0 were given
        gate Rot expects 3 parameter(s) but 2 were given
        unknown gate `rx`
        invalid wire: wire 0 is used more than once
        invalid wire: no target wires given"#]]
    .assert_eq(&messages);

    assert_eq!(read(&sv), init);
}

#[test]
fn batch_is_validated_before_anything_runs() {
    let mut sv = zero_state(2);
    let err = sv
        .apply_batch(&[
            GateDescriptor::named(GateKind::Hadamard, &[0], false, &[]),
            GateDescriptor::named(GateKind::CNOT, &[0, 1], false, &[]),
            GateDescriptor::named(GateKind::RX, &[5], false, &[0.1]),
        ])
        .expect_err("last gate has an invalid wire");
    assert!(matches!(err, Error::InvalidWire(_)));
    assert_eq!(read(&sv), read(&zero_state(2)));
}

#[test]
fn batch_applies_gates_in_order() {
    let mut h_then_z = zero_state(1);
    h_then_z
        .apply_batch(&[
            GateDescriptor::named(GateKind::Hadamard, &[0], false, &[]),
            GateDescriptor::named(GateKind::PauliZ, &[0], false, &[]),
        ])
        .expect("batch");
    assert_approx_eq(
        &read(&h_then_z),
        &[c64(FRAC_1_SQRT_2, 0.), c64(-FRAC_1_SQRT_2, 0.)],
        TOLERANCE,
    );

    let mut z_then_h = zero_state(1);
    z_then_h
        .apply_batch(&[
            GateDescriptor::named(GateKind::PauliZ, &[0], false, &[]),
            GateDescriptor::named(GateKind::Hadamard, &[0], false, &[]),
        ])
        .expect("batch");
    assert_approx_eq(
        &read(&z_then_h),
        &[c64(FRAC_1_SQRT_2, 0.), c64(FRAC_1_SQRT_2, 0.)],
        TOLERANCE,
    );
}

#[test]
fn batch_accepts_custom_and_extra_controlled_gates() {
    let x = vec![c64(0., 0.), c64(1., 0.), c64(1., 0.), c64(0., 0.)];
    let mut batched = zero_state(3);
    batched
        .apply_batch(&[
            GateDescriptor::named(GateKind::PauliX, &[0], false, &[]),
            GateDescriptor::named(GateKind::PauliX, &[1], false, &[]),
            GateDescriptor::custom("X", x, &[2], false).with_controls(&[0, 1]),
        ])
        .expect("batch");
    let mut expected = vec![c64(0., 0.); 8];
    expected[0b111] = c64(1., 0.);
    assert_eq!(read(&batched), expected);
}

#[test]
fn operation_lists_must_have_matching_lengths() {
    let mut sv = zero_state(2);
    assert!(matches!(
        sv.apply_operations(&["PauliX", "PauliY"], &[vec![0]], &[false, false], &[]),
        Err(Error::SizeMismatch { .. })
    ));
    assert!(matches!(
        sv.apply_operations(&["RX"], &[vec![0]], &[false], &[vec![0.1], vec![0.2]]),
        Err(Error::SizeMismatch { .. })
    ));
}

#[test]
fn extra_controls_stack_on_intrinsic_ones() {
    let init = random_state(3, 17);

    let mut crx = seeded(3, &init);
    crx.apply_crx(&[2, 0], false, 0.4).expect("CRX");
    let mut controlled_rx = seeded(3, &init);
    controlled_rx
        .apply_named_gate("RX", &[2], &[0], false, &[0.4])
        .expect("controlled RX");
    assert_eq!(read(&controlled_rx), read(&crx));

    let mut toffoli = seeded(3, &init);
    toffoli.apply_toffoli(&[0, 1, 2], false).expect("Toffoli");
    let mut controlled_cnot = seeded(3, &init);
    controlled_cnot
        .apply_named_gate("CNOT", &[0], &[1, 2], false, &[])
        .expect("controlled CNOT");
    assert_eq!(read(&controlled_cnot), read(&toffoli));
}

#[test]
fn direct_calls_match_the_dispatcher_for_every_gate() {
    let init = random_state(4, 19);
    let params = [0.3, 0.8, 2.4];
    let wires = [3, 1, 0];

    for kind in GateKind::ALL {
        let wires = &wires[..kind.wire_count()];
        let params = &params[..kind.param_count()];
        for adjoint in [false, true] {
            let mut direct = seeded(4, &init);
            apply_direct(&mut direct, kind, wires, adjoint, params).expect("direct call");

            let mut dispatched = seeded(4, &init);
            dispatched
                .apply_operation(kind.name(), wires, adjoint, params)
                .expect("dispatched call");

            assert_eq!(read(&direct), read(&dispatched), "{kind} adjoint={adjoint}");
        }
    }
}

#[test]
fn every_gate_followed_by_its_adjoint_is_the_identity() {
    let init = random_state(4, 23);
    let params = [0.5, -1.1, 2.0];
    let wires = [2, 0, 3];

    for kind in GateKind::ALL {
        let wires = &wires[..kind.wire_count()];
        let params = &params[..kind.param_count()];
        let mut sv = seeded(4, &init);
        sv.apply_gate(kind, &[], wires, false, params).expect("gate");
        sv.apply_gate(kind, &[], wires, true, params).expect("adjoint");
        assert_approx_eq(&read(&sv), &init, TOLERANCE);
    }
}

#[test]
fn swap_family_moves_amplitudes_between_wires() {
    let mut sv = zero_state(3);
    sv.apply_pauli_x(&[2], false).expect("X");
    sv.apply_swap(&[0, 2], false).expect("SWAP");
    let mut expected = vec![c64(0., 0.); 8];
    expected[0b100] = c64(1., 0.);
    assert_eq!(read(&sv), expected);

    // Control on wire 1 is 0, so CSWAP does nothing
    sv.apply_cswap(&[1, 0, 2], false).expect("CSWAP");
    assert_eq!(read(&sv), expected);

    sv.apply_pauli_x(&[1], false).expect("X");
    sv.apply_cswap(&[1, 0, 2], false).expect("CSWAP");
    expected[0b100] = c64(0., 0.);
    expected[0b011] = c64(1., 0.);
    assert_eq!(read(&sv), expected);
}

#[test]
fn bell_state_probabilities() {
    let mut sv = zero_state(2);
    sv.apply_hadamard(&[0], false).expect("H");
    sv.apply_cnot(&[0, 1], false).expect("CNOT");
    expect![[r#"
        |00⟩: 0.500000
        |11⟩: 0.500000
    "#]]
    .assert_eq(&format_probabilities(&read(&sv)));
}

#[test]
fn ghz_state_with_ising_and_phase_gates() {
    let mut sv = zero_state(3);
    sv.apply_hadamard(&[0], false).expect("H");
    sv.apply_cnot(&[0, 1], false).expect("CNOT");
    sv.apply_cnot(&[1, 2], false).expect("CNOT");
    sv.apply_ising_zz(&[0, 2], false, 1.3).expect("IsingZZ");
    sv.apply_t(&[1], false).expect("T");
    expect![[r#"
        |000⟩: 0.500000
        |111⟩: 0.500000
    "#]]
    .assert_eq(&format_probabilities(&read(&sv)));
}

#[test]
fn reset_returns_to_zero_state() {
    let mut sv = plus_state(3);
    sv.reset().expect("reset");
    assert_eq!(read(&sv), read(&zero_state(3)));
}

#[test]
fn reset_without_an_allocation_is_an_error() {
    let mut sv = plus_state(2);
    let mut moved = DeviceBuffer::new(sv.buffer().backend(), 0).expect("empty buffer");
    moved.take_from(sv.buffer_mut()).expect("move");
    assert_eq!(sv.len(), 0);
    assert!(matches!(sv.reset(), Err(Error::Device(_))));
}

#[test]
fn unknown_name_without_a_matrix_is_an_unknown_gate() {
    let mut sv = zero_state(2);
    let err = sv
        .apply_operation_with_matrix("Foo", &[0], false, &[], &[])
        .expect_err("no matrix to fall back on");
    assert_eq!(err, Error::UnknownGate("Foo".to_string()));
    assert_eq!(read(&sv), read(&zero_state(2)));
}

#[test]
fn repeated_angles_hit_the_gate_cache() {
    let mut sv = zero_state(2);
    for wire in [0, 1, 0] {
        sv.apply_rx(&[wire], false, 0.25).expect("RX");
    }
    sv.apply_rx(&[0], true, 0.25).expect("RX adjoint");
    sv.apply_operation("Hadamard", &[1], false, &[]).expect("H");

    let cache = sv.gate_cache();
    assert_eq!(cache.len(), 3);
    assert_eq!(cache.misses(), 3);
    assert_eq!(cache.hits(), 2);
}

fn sample_circuit<B: Backend>(sv: &mut StateVector<B>) -> Result<()> {
    sv.apply_hadamard(&[0], false)?;
    sv.apply_cnot(&[0, 3], false)?;
    sv.apply_crot(&[3, 1], false, 0.3, 0.8, 2.4)?;
    sv.apply_ising_xx(&[1, 2], false, 0.7)?;
    sv.apply_toffoli(&[0, 1, 2], false)
}

#[test]
fn runs_on_the_gpu_when_one_is_available() {
    let gpu = match GpuBackend::new(BackendConfig::default()) {
        Ok(gpu) => gpu,
        Err(err) => {
            eprintln!("skipping GPU test: {err}");
            return;
        }
    };
    let host = HostBackend::<f32>::new();

    let mut on_gpu = StateVector::new(&gpu, 4).expect("gpu state vector");
    sample_circuit(&mut on_gpu).expect("gpu circuit");
    let mut on_host = StateVector::new(&host, 4).expect("host state vector");
    sample_circuit(&mut on_host).expect("host circuit");

    let gpu_amplitudes = on_gpu.amplitudes().expect("gpu readback");
    let host_amplitudes = on_host.amplitudes().expect("host readback");
    assert_approx_eq(&gpu_amplitudes, &host_amplitudes, 1e-5);
}

proptest! {
    #[test]
    fn rotation_adjoint_is_an_inverse(
        angle in -7.0f64..7.0,
        wire in 0usize..3,
        seed in any::<u64>(),
        adjoint_first in any::<bool>(),
        kind in prop::sample::select(vec![GateKind::RX, GateKind::RY, GateKind::RZ, GateKind::PhaseShift]),
    ) {
        let init = random_state(3, seed);
        let mut sv = seeded(3, &init);
        sv.apply_gate(kind, &[], &[wire], adjoint_first, &[angle]).expect("gate");
        sv.apply_gate(kind, &[], &[wire], !adjoint_first, &[angle]).expect("gate");
        let actual = read(&sv);
        for (a, e) in actual.iter().zip(&init) {
            prop_assert!((a - e).norm() < 1e-10);
        }
    }
}
