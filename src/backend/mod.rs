//! Execution backends
//!
//! A [`Backend`] accepts a circuit and returns a [`Job`] that resolves to a
//! [`SamplerResult`]. Two implementations exist:
//!
//! - [`LocalSimulator`]: ideal, runs any circuit synchronously
//! - [`EmulatedDevice`]: a noisy device that only accepts circuits already
//!   transpiled to its basis and coupling map, executed on a worker thread
//!
//! [`QuantumService`] is the catalog used to pick a device.

mod device;
mod job;
mod local;
mod service;

pub use device::EmulatedDevice;
pub use job::{Job, JobStatus};
pub use local::LocalSimulator;
pub use service::QuantumService;

use crate::circuit::QuantumCircuit;
use crate::error::BackendError;
use crate::transpiler::Target;
use serde::Serialize;

/// Upper bound on shots per job.
pub const MAX_SHOTS: usize = 100_000;

/// Static and dynamic properties of a backend.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct BackendInfo {
    pub name: String,
    pub num_qubits: usize,
    pub simulator: bool,
    pub operational: bool,
    pub pending_jobs: usize,
    pub basis_gates: Vec<String>,
    pub coupling_map: Vec<(usize, usize)>,
}

/// Trait for circuit execution backends.
pub trait Backend: Send + Sync {
    fn info(&self) -> BackendInfo;

    /// Gates and connectivity circuits must respect to run here.
    fn target(&self) -> Target;

    /// Submits `circuit` for `shots` shots.
    fn run(&self, circuit: &QuantumCircuit, shots: usize) -> Result<Job, BackendError>;

    fn name(&self) -> String {
        self.info().name
    }
}

/// Rejects shot counts outside `1..=MAX_SHOTS`.
pub(crate) fn validate_shots(shots: usize) -> Result<(), BackendError> {
    if shots == 0 || shots > MAX_SHOTS {
        return Err(BackendError::InvalidShots {
            got: shots,
            max: MAX_SHOTS,
        });
    }
    Ok(())
}

/// Rejects circuits wider than the backend.
pub(crate) fn validate_width(
    info: &BackendInfo,
    circuit: &QuantumCircuit,
) -> Result<(), BackendError> {
    if circuit.num_qubits() > info.num_qubits {
        return Err(BackendError::CircuitTooWide {
            backend: info.name.clone(),
            required: circuit.num_qubits(),
            available: info.num_qubits,
        });
    }
    Ok(())
}
