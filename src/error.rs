//! Error types above the simulation core.
//!
//! - `CircuitError`: malformed circuits (bad indices, registers, conditions)
//! - `TranspileError`: circuits that cannot be mapped onto a target
//! - `BackendError`: device selection, validation and job execution
//! - `ConfigError`: configuration loading and validation
//! - `TeleportError`: top-level error returned by the experiment runner

use crate::core::errors::{ChannelError, StateError};
use crate::logging::LoggingError;
use std::path::PathBuf;
use thiserror::Error;

/// Result alias for the experiment runner.
pub type Result<T> = std::result::Result<T, TeleportError>;

#[derive(Error, Debug, Clone)]
pub enum CircuitError {
    #[error("Qubit {qubit} out of range for a {num_qubits}-qubit circuit")]
    QubitOutOfRange { qubit: usize, num_qubits: usize },

    #[error("Classical bit {clbit} out of range ({num_clbits} classical bits)")]
    ClbitOutOfRange { clbit: usize, num_clbits: usize },

    #[error("Bit {index} out of range for register '{register}' of size {size}")]
    RegisterIndexOutOfRange {
        register: String,
        index: usize,
        size: usize,
    },

    #[error("A classical register named '{0}' already exists")]
    DuplicateRegister(String),

    #[error("No classical register named '{0}'")]
    UnknownRegister(String),

    #[error("Duplicate qubit index found: {0}")]
    DuplicateQubit(usize),

    #[error("Gate '{gate}' expects {expected} qubits, got {got}")]
    ArityMismatch {
        gate: String,
        expected: usize,
        got: usize,
    },

    #[error("Cannot measure {qubits} qubits into a register of size {register_size}")]
    RegisterSizeMismatch { qubits: usize, register_size: usize },

    #[error("Gate parameters must be finite, got {0}")]
    InvalidParameter(f64),

    #[error("Amplitudes are not normalized. Norm squared: {0}")]
    InvalidAmplitudes(f64),

    #[error("Only gates can be classically conditioned, found '{0}'")]
    UnsupportedConditional(String),

    #[error("Circuits support at most 64 classical bits, requested {0}")]
    TooManyClbits(usize),

    #[error("Simulation error: {0}")]
    Simulation(#[from] StateError),
}

#[derive(Error, Debug, Clone)]
pub enum TranspileError {
    #[error("Circuit needs {required} qubits but the target only has {available}")]
    TooManyQubits { required: usize, available: usize },

    #[error("Target basis must contain '{0}'")]
    MissingBasisGate(String),

    #[error("Physical qubits {from} and {to} are not connected by the coupling map")]
    Disconnected { from: usize, to: usize },

    #[error("Coupling map references qubit {qubit} on a {num_qubits}-qubit target")]
    InvalidCouplingMap { qubit: usize, num_qubits: usize },

    #[error("Circuit error: {0}")]
    Circuit(#[from] CircuitError),
}

#[derive(Error, Debug, Clone)]
pub enum BackendError {
    #[error(
        "No backend matches the request (min_num_qubits={min_num_qubits}, operational={operational}, simulator={simulator})"
    )]
    NoBackendAvailable {
        min_num_qubits: usize,
        operational: bool,
        simulator: bool,
    },

    #[error("Unknown backend '{0}'")]
    UnknownBackend(String),

    #[error("Backend '{0}' is not operational")]
    NotOperational(String),

    #[error("Backend '{backend}' does not support gate '{gate}'. Transpile the circuit first")]
    UnsupportedGate { backend: String, gate: String },

    #[error("Backend '{backend}' has no coupling between qubits {control} and {target}")]
    UncoupledQubits {
        backend: String,
        control: usize,
        target: usize,
    },

    #[error("Circuit needs {required} qubits but backend '{backend}' only has {available}")]
    CircuitTooWide {
        backend: String,
        required: usize,
        available: usize,
    },

    #[error("Number of shots must be between 1 and {max}, got {got}")]
    InvalidShots { got: usize, max: usize },

    #[error("Job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("Invalid device noise parameters: {0}")]
    Noise(#[from] ChannelError),

    #[error("Invalid device target: {0}")]
    Target(#[from] TranspileError),

    #[error("Circuit error: {0}")]
    Circuit(#[from] CircuitError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

#[derive(Error, Debug)]
pub enum TeleportError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Circuit error: {0}")]
    Circuit(#[from] CircuitError),

    #[error("Transpilation error: {0}")]
    Transpile(#[from] TranspileError),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] StateError),

    #[error("Logging setup error: {0}")]
    Logging(#[from] LoggingError),

    #[error("Failed to write {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
