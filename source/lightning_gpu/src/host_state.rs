// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.


use num_complex::Complex;
use num_traits::{One, Zero};

use crate::device::{Backend, TransferMode};
use crate::error::{Error, Result};
use crate::precision::Precision;
use crate::state_vector::StateVector;

/// Host-resident amplitudes, used to seed a [`StateVector`] and to inspect it.
#[derive(Clone, Debug, PartialEq)]
pub struct HostStateVector<P> {
    qubit_count: usize,
    amplitudes: Vec<Complex<P>>,
}

impl<P: Precision> HostStateVector<P> {
    /// The all-zeros basis state.
    #[must_use]
    pub fn new(qubit_count: usize) -> Self {
        let mut amplitudes = vec![Complex::zero(); 1 << qubit_count];
        amplitudes[0] = Complex::one();
        Self {
            qubit_count,
            amplitudes,
        }
    }

    pub fn from_amplitudes(qubit_count: usize, amplitudes: Vec<Complex<P>>) -> Result<Self> {
        let required = 1usize << qubit_count;
        if amplitudes.len() != required {
            return Err(Error::size_mismatch(
                "host state vector",
                required,
                amplitudes.len(),
            ));
        }
        Ok(Self {
            qubit_count,
            amplitudes,
        })
    }

    #[must_use]
    pub fn qubit_count(&self) -> usize {
        self.qubit_count
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.amplitudes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.amplitudes.is_empty()
    }

    #[must_use]
    pub fn amplitudes(&self) -> &[Complex<P>] {
        &self.amplitudes
    }

    pub fn amplitudes_mut(&mut self) -> &mut [Complex<P>] {
        &mut self.amplitudes
    }

    #[must_use]
    pub fn into_amplitudes(self) -> Vec<Complex<P>> {
        self.amplitudes
    }

    /// Overwrite the device state with these amplitudes.
    pub fn to_device<B>(&self, state: &mut StateVector<B>) -> Result<()>
    where
        B: Backend<Scalar = P>,
    {
        self.check_qubit_count(state.qubit_count())?;
        state
            .buffer_mut()
            .copy_from_host(&self.amplitudes, TransferMode::Sync)
    }

    /// Replace these amplitudes with the current device state.
    pub fn from_device<B>(&mut self, state: &StateVector<B>) -> Result<()>
    where
        B: Backend<Scalar = P>,
    {
        self.check_qubit_count(state.qubit_count())?;
        state
            .buffer()
            .copy_to_host(&mut self.amplitudes, TransferMode::Sync)
    }

    /// `|a_i|^2` for every basis state.
    #[must_use]
    pub fn probabilities(&self) -> Vec<P> {
        self.amplitudes.iter().map(Complex::norm_sqr).collect()
    }

    #[must_use]
    pub fn norm_squared(&self) -> P {
        self.amplitudes
            .iter()
            .fold(P::zero(), |acc, amplitude| acc + amplitude.norm_sqr())
    }

    fn check_qubit_count(&self, qubit_count: usize) -> Result<()> {
        if qubit_count == self.qubit_count {
            Ok(())
        } else {
            Err(Error::size_mismatch(
                "host mirror transfer",
                1 << qubit_count,
                self.amplitudes.len(),
            ))
        }
    }
}
