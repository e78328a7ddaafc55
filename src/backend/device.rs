use super::job::set_status;
use super::{Backend, BackendInfo, Job, JobStatus, validate_shots, validate_width};
use crate::circuit::{Instruction, QuantumCircuit};
use crate::config::DeviceConfig;
use crate::error::BackendError;
use crate::noise::NoiseModel;
use crate::sampler::{Sampler, SamplingMode};
use crate::transpiler::Target;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

/// A noisy device that only runs circuits in its native form.
///
/// Jobs execute on a worker thread. The pending-job counter starts at the
/// configured queue length and follows the jobs this device is running.
#[derive(Debug)]
pub struct EmulatedDevice {
    name: String,
    target: Target,
    operational: bool,
    pending_jobs: Arc<AtomicUsize>,
    sampler: Sampler,
}

impl EmulatedDevice {
    pub fn from_config(
        config: &DeviceConfig,
        seed: Option<u64>,
        mode: SamplingMode,
    ) -> Result<Self, BackendError> {
        let noise = NoiseModel::from_config(&config.noise)?;
        let target = Target::new(
            config.num_qubits,
            config.basis_gates.clone(),
            config.coupling_map.clone(),
        )?;

        let mut sampler = Sampler::new().with_noise(noise).with_mode(mode);
        if let Some(seed) = seed {
            sampler = sampler.with_seed(seed);
        }

        Ok(Self {
            name: config.name.clone(),
            target,
            operational: config.operational,
            pending_jobs: Arc::new(AtomicUsize::new(config.pending_jobs)),
            sampler,
        })
    }

    /// Checks that every gate is native and every `cx` acts on coupled qubits.
    fn validate_native(&self, circuit: &QuantumCircuit) -> Result<(), BackendError> {
        for instruction in circuit.instructions() {
            let Instruction::Gate { kind, qubits, .. } = instruction else {
                continue;
            };
            if !self.target.supports(kind.name()) {
                return Err(BackendError::UnsupportedGate {
                    backend: self.name.clone(),
                    gate: kind.name().to_string(),
                });
            }
            if let [control, target] = qubits[..] {
                if !self.target.are_coupled(control, target) {
                    return Err(BackendError::UncoupledQubits {
                        backend: self.name.clone(),
                        control,
                        target,
                    });
                }
            }
        }
        Ok(())
    }
}

impl Backend for EmulatedDevice {
    fn info(&self) -> BackendInfo {
        BackendInfo {
            name: self.name.clone(),
            num_qubits: self.target.num_qubits,
            simulator: false,
            operational: self.operational,
            pending_jobs: self.pending_jobs.load(Ordering::SeqCst),
            basis_gates: self.target.basis_gates.clone(),
            coupling_map: self.target.coupling_map.clone(),
        }
    }

    fn target(&self) -> Target {
        self.target.clone()
    }

    fn run(&self, circuit: &QuantumCircuit, shots: usize) -> Result<Job, BackendError> {
        if !self.operational {
            return Err(BackendError::NotOperational(self.name.clone()));
        }
        validate_shots(shots)?;
        validate_width(&self.info(), circuit)?;
        self.validate_native(circuit)?;

        let job_id = Job::next_id(&self.name);
        let status = Arc::new(Mutex::new(JobStatus::Queued));
        self.pending_jobs.fetch_add(1, Ordering::SeqCst);
        info!(job_id = %job_id, backend = %self.name, shots, "job submitted");

        let worker_status = Arc::clone(&status);
        let pending = Arc::clone(&self.pending_jobs);
        let sampler = self.sampler.clone();
        let circuit = circuit.clone();
        let worker_job_id = job_id.clone();

        let handle = std::thread::spawn(move || {
            set_status(&worker_status, JobStatus::Running);
            debug!(job_id = %worker_job_id, "job running");

            let output = sampler
                .run(&circuit, shots)
                .map_err(|err| BackendError::JobFailed {
                    job_id: worker_job_id.clone(),
                    reason: err.to_string(),
                });

            match &output {
                Ok(_) => set_status(&worker_status, JobStatus::Done),
                Err(err) => {
                    warn!(job_id = %worker_job_id, error = %err, "job failed");
                    set_status(&worker_status, JobStatus::Error);
                }
            }
            pending.fetch_sub(1, Ordering::SeqCst);
            output
        });

        Ok(Job::spawned(job_id, self.name.clone(), status, handle))
    }
}
