//! The three teleportation experiments.
//!
//! 1. Ideal protocol on the local simulator
//! 2. Protocol without Bob's corrections on the local simulator
//! 3. Ideal protocol transpiled and run on the least busy emulated device

use crate::backend::{Backend, LocalSimulator, QuantumService};
use crate::circuit::QuantumCircuit;
use crate::config::ExperimentConfig;
use crate::error::Result;
use crate::protocols::teleportation::{
    self, ALICE_REGISTER, BOB_REGISTER, TeleportationStats, UNCORRECTED_ALICE_REGISTER,
    UNCORRECTED_BOB_REGISTER,
};
use crate::report::{ExperimentReport, RunSummary, write_artifacts};
use crate::result::{Counts, SamplerResult};
use crate::transpiler::transpile;
use tracing::{error, info, info_span};

/// How the histogram counts of a report are derived.
enum HistogramSource {
    /// `int(p * shots)` over all classical bits.
    RescaledProbabilities,
    /// Raw counts of Bob's register.
    VerificationRegister,
}

struct ReportInput<'a> {
    index: usize,
    title: &'a str,
    circuit: &'a QuantumCircuit,
    backend: String,
    job_id: Option<String>,
    alice_register: &'a str,
    bob_register: &'a str,
    histogram: HistogramSource,
    expected_fidelity: Option<f64>,
}

fn build_report(input: ReportInput<'_>, result: &SamplerResult) -> Result<ExperimentReport> {
    let shots = result.shots();
    let probabilities = result.quasi_probabilities();
    let verification_counts = result.register_counts(input.bob_register)?;
    let stats = TeleportationStats::from_result(result, input.alice_register, input.bob_register)?;

    let counts = match input.histogram {
        HistogramSource::RescaledProbabilities => Counts::from_probabilities(&probabilities, shots),
        HistogramSource::VerificationRegister => verification_counts.clone(),
    };
    let fidelity = if shots == 0 {
        0.0
    } else {
        verification_counts.get("0") as f64 / shots as f64
    };

    Ok(ExperimentReport {
        index: input.index,
        title: input.title.to_string(),
        backend: input.backend,
        job_id: input.job_id,
        shots,
        circuit_depth: input.circuit.depth(),
        circuit_ops: input.circuit.count_ops(),
        circuit_diagram: input.circuit.draw(),
        registers: result
            .register_names()
            .into_iter()
            .map(str::to_string)
            .collect(),
        probabilities,
        counts,
        verification_counts,
        fidelity,
        expected_fidelity: input.expected_fidelity,
        stats,
    })
}

fn local_simulator(config: &ExperimentConfig) -> LocalSimulator {
    let simulator = LocalSimulator::new().with_mode(config.sampling_mode);
    match config.seed {
        Some(seed) => simulator.with_seed(seed),
        None => simulator,
    }
}

/// Runs `circuit` on the ideal simulator, returning the backend name with the result.
fn run_local(
    config: &ExperimentConfig,
    circuit: &QuantumCircuit,
) -> Result<(String, SamplerResult)> {
    let job = local_simulator(config).run(circuit, config.shots)?;
    let backend = job.backend_name().to_string();
    Ok((backend, job.result()?))
}

/// Experiment 1: teleportation with corrections on the ideal simulator.
pub fn run_ideal(config: &ExperimentConfig) -> Result<ExperimentReport> {
    let _span = info_span!("experiment", index = 1).entered();
    info!("starting ideal protocol");

    let circuit = teleportation::ideal_circuit(config.theta)?;
    let (backend, result) = run_local(config, &circuit)?;

    let report = build_report(
        ReportInput {
            index: 1,
            title: "Ideal protocol",
            circuit: &circuit,
            backend,
            job_id: None,
            alice_register: ALICE_REGISTER,
            bob_register: BOB_REGISTER,
            histogram: HistogramSource::RescaledProbabilities,
            expected_fidelity: Some(1.0),
        },
        &result,
    )?;
    info!(fidelity = report.fidelity, "ideal protocol finished");
    Ok(report)
}

/// Experiment 2: teleportation without Bob's corrections.
pub fn run_uncorrected(config: &ExperimentConfig) -> Result<ExperimentReport> {
    let _span = info_span!("experiment", index = 2).entered();
    info!("starting uncorrected protocol");

    let circuit = teleportation::uncorrected_circuit(config.theta)?;
    let (backend, result) = run_local(config, &circuit)?;

    let report = build_report(
        ReportInput {
            index: 2,
            title: "Probabilistic protocol (no correction)",
            circuit: &circuit,
            backend,
            job_id: None,
            alice_register: UNCORRECTED_ALICE_REGISTER,
            bob_register: UNCORRECTED_BOB_REGISTER,
            histogram: HistogramSource::RescaledProbabilities,
            expected_fidelity: Some(teleportation::expected_uncorrected_verification(
                config.theta,
            )),
        },
        &result,
    )?;
    info!(
        fidelity = report.fidelity,
        protocol_success = report.stats.protocol_success_rate,
        "uncorrected protocol finished"
    );
    Ok(report)
}

/// Experiment 3: the ideal circuit on the least busy operational device.
pub fn run_hardware(config: &ExperimentConfig, service: &QuantumService) -> Result<ExperimentReport> {
    let _span = info_span!("experiment", index = 3).entered();
    info!("starting hardware run");

    let backend = service.least_busy(config.min_num_qubits, true, false)?;
    info!(backend = %backend.name(), "backend chosen");

    let circuit = teleportation::ideal_circuit(config.theta)?;
    let transpiled = transpile(&circuit, &backend.target(), config.optimization_level)?;

    info!("submitting circuit to device");
    let job = backend.run(&transpiled, config.shots)?;
    let job_id = job.job_id().to_string();
    info!(job_id = %job_id, "waiting for results");
    let result = job.result()?;
    info!(registers = ?result.register_names(), "results received");

    let report = build_report(
        ReportInput {
            index: 3,
            title: "Emulated hardware",
            circuit: &transpiled,
            backend: backend.name(),
            job_id: Some(job_id),
            alice_register: ALICE_REGISTER,
            bob_register: BOB_REGISTER,
            histogram: HistogramSource::VerificationRegister,
            expected_fidelity: None,
        },
        &result,
    )?;
    info!(fidelity = report.fidelity, "hardware run finished");
    Ok(report)
}

/// Runs all experiments and writes artifacts.
///
/// Failures of the hardware experiment are recorded in the summary instead of aborting the run.
pub fn run_all(config: &ExperimentConfig) -> Result<RunSummary> {
    let mut experiments = vec![run_ideal(config)?, run_uncorrected(config)?];

    let hardware = QuantumService::from_config(config)
        .map_err(Into::into)
        .and_then(|service| run_hardware(config, &service));
    let hardware_error = match hardware {
        Ok(report) => {
            experiments.push(report);
            None
        }
        Err(err) => {
            error!(error = %err, "hardware experiment failed");
            Some(err.to_string())
        }
    };

    let summary = RunSummary {
        theta: config.theta,
        shots: config.shots,
        seed: config.seed,
        experiments,
        hardware_error,
    };

    if config.write_artifacts {
        write_artifacts(&summary, &config.output_dir)?;
    }
    Ok(summary)
}
