// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use lightning_gpu::{Backend, BackendConfig, GpuBackend, HostBackend, Precision, Result, StateVector};
use log::{info, warn};

const NUM_QUBITS: usize = 3;

fn run_ghz<B: Backend>(backend: &B) -> Result<Vec<f64>> {
    let mut sv = StateVector::new(backend, NUM_QUBITS)?;
    sv.apply_hadamard(&[0], false)?;
    for wire in 1..NUM_QUBITS {
        sv.apply_operation("CNOT", &[0, wire], false, &[])?;
    }
    sv.apply_rz(&[NUM_QUBITS - 1], false, 0.5)?;

    let probabilities = sv
        .amplitudes()?
        .iter()
        .map(|amplitude| amplitude.norm_sqr().as_f64())
        .collect();
    Ok(probabilities)
}

fn main() -> miette::Result<()> {
    env_logger::init();
    let config = BackendConfig::from_env();

    let probabilities = if config.force_host {
        info!("host backend requested");
        run_ghz(&HostBackend::<f64>::new())?
    } else {
        match GpuBackend::new(config) {
            Ok(gpu) => {
                info!("running on {}", gpu.describe());
                run_ghz(&gpu)?
            }
            Err(err) => {
                warn!("no usable GPU ({err}), falling back to the host backend");
                run_ghz(&HostBackend::<f64>::new())?
            }
        }
    };

    println!("GPU Runner");
    let width = NUM_QUBITS;
    for (index, probability) in probabilities.iter().enumerate() {
        println!("|{index:0width$b}⟩: {probability:.6}");
    }
    Ok(())
}
