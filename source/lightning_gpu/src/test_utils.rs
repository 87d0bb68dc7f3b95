// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Write;

use num_complex::Complex;

use crate::precision::Precision;

pub const TOLERANCE: f64 = 1e-7;

pub fn c64(re: f64, im: f64) -> Complex<f64> {
    Complex::new(re, im)
}

/// Assert two amplitude vectors agree element-wise within `tolerance`.
#[track_caller]
pub fn assert_approx_eq<P: Precision>(actual: &[Complex<P>], expected: &[Complex<P>], tolerance: f64) {
    assert_eq!(actual.len(), expected.len(), "length mismatch");
    for (index, (a, e)) in actual.iter().zip(expected).enumerate() {
        let distance = (a - e).norm().as_f64();
        assert!(
            distance <= tolerance,
            "amplitude {index} differs: got {a}, expected {e} (distance {distance:e})\nactual: {actual:?}\nexpected: {expected:?}"
        );
    }
}

/// `|+...+>` on `qubit_count` qubits.
pub fn uniform_superposition(qubit_count: usize) -> Vec<Complex<f64>> {
    let amplitude = 1.0 / f64::from(1u32 << qubit_count).sqrt();
    vec![c64(amplitude, 0.0); 1 << qubit_count]
}

/// One line per basis state with non-negligible probability, for snapshots.
pub fn format_probabilities<P: Precision>(amplitudes: &[Complex<P>]) -> String {
    let qubit_count = amplitudes.len().trailing_zeros() as usize;
    let mut out = String::new();
    for (index, amplitude) in amplitudes.iter().enumerate() {
        let probability = amplitude.norm_sqr().as_f64();
        if probability > 1e-9 {
            writeln!(out, "|{index:0qubit_count$b}⟩: {probability:.6}")
                .expect("writing to a string should succeed");
        }
    }
    out
}
