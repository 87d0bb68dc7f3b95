// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::{Debug, Display};

use bytemuck::Pod;
use num_complex::Complex;
use num_traits::{Float, FloatConst};

/// Floating point type backing the real and imaginary parts of an amplitude.
///
/// Implemented for `f32` (the only width WGSL kernels can portably use) and
/// `f64` (available on the host backend).
pub trait Precision:
    Float + FloatConst + Pod + Debug + Display + Default + Send + Sync + 'static
{
    const NAME: &'static str;

    fn from_f64(value: f64) -> Self;

    fn as_f64(self) -> f64;

    /// Bit pattern used to key memoised gate matrices.
    fn key_bits(self) -> u64;
}

impl Precision for f32 {
    const NAME: &'static str = "f32";

    #[allow(clippy::cast_possible_truncation)]
    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn as_f64(self) -> f64 {
        f64::from(self)
    }

    fn key_bits(self) -> u64 {
        // -0.0 and 0.0 produce the same matrix, so share a cache slot
        if self == 0.0 {
            0
        } else {
            u64::from(self.to_bits())
        }
    }
}

impl Precision for f64 {
    const NAME: &'static str = "f64";

    fn from_f64(value: f64) -> Self {
        value
    }

    fn as_f64(self) -> f64 {
        self
    }

    fn key_bits(self) -> u64 {
        if self == 0.0 { 0 } else { self.to_bits() }
    }
}

/// Convert a double precision complex value to the given precision.
pub fn cast_complex<P: Precision>(value: Complex<f64>) -> Complex<P> {
    Complex::new(P::from_f64(value.re), P::from_f64(value.im))
}
