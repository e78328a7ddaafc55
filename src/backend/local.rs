use super::{Backend, BackendInfo, Job, validate_shots, validate_width};
use crate::circuit::QuantumCircuit;
use crate::error::BackendError;
use crate::sampler::{Sampler, SamplingMode};
use crate::transpiler::Target;
use tracing::debug;

const LOCAL_SIMULATOR_NAME: &str = "local_simulator";

/// Every gate the circuit IR can express.
const LOCAL_BASIS: [&str; 14] = [
    "id", "x", "y", "z", "h", "s", "t", "sx", "rx", "ry", "rz", "u", "cx", "swap",
];

/// Ideal simulator backend. Runs any circuit synchronously, no transpilation needed.
#[derive(Debug, Clone)]
pub struct LocalSimulator {
    sampler: Sampler,
    max_qubits: usize,
}

impl LocalSimulator {
    pub fn new() -> Self {
        Self {
            sampler: Sampler::new(),
            max_qubits: 12,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.sampler = self.sampler.with_seed(seed);
        self
    }

    pub fn with_mode(mut self, mode: SamplingMode) -> Self {
        self.sampler = self.sampler.with_mode(mode);
        self
    }
}

impl Default for LocalSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for LocalSimulator {
    fn info(&self) -> BackendInfo {
        let target = self.target();
        BackendInfo {
            name: LOCAL_SIMULATOR_NAME.to_string(),
            num_qubits: self.max_qubits,
            simulator: true,
            operational: true,
            pending_jobs: 0,
            basis_gates: target.basis_gates,
            coupling_map: target.coupling_map,
        }
    }

    fn target(&self) -> Target {
        let coupling_map = (0..self.max_qubits)
            .flat_map(|a| (a + 1..self.max_qubits).map(move |b| (a, b)))
            .collect();
        Target {
            num_qubits: self.max_qubits,
            basis_gates: LOCAL_BASIS.iter().map(|g| g.to_string()).collect(),
            coupling_map,
        }
    }

    fn run(&self, circuit: &QuantumCircuit, shots: usize) -> Result<Job, BackendError> {
        validate_shots(shots)?;
        validate_width(&self.info(), circuit)?;

        let job_id = Job::next_id("local");
        debug!(job_id = %job_id, circuit = circuit.name(), shots, "running on local simulator");

        let output = self.sampler.run(circuit, shots).map_err(BackendError::from);
        Ok(Job::completed(
            job_id,
            LOCAL_SIMULATOR_NAME.to_string(),
            output,
        ))
    }
}
