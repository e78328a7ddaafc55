//! Quantum teleportation experiments on a density-matrix simulator.
//!
//! The library layer provides the simulation core, a circuit IR with classical
//! registers, a transpiler and execution backends. The [`experiments`] module
//! runs the ideal, uncorrected and emulated-hardware teleportation experiments.

pub mod backend;
pub mod circuit;
pub mod config;
mod core;
pub mod error;
pub mod experiments;
pub mod logging;
pub mod noise;
pub mod protocols;
pub mod report;
pub mod result;
pub mod sampler;
pub mod transpiler;

pub use crate::backend::{Backend, BackendInfo, Job, JobStatus, QuantumService};
pub use crate::circuit::{ClassicalRegister, Condition, GateKind, Instruction, QuantumCircuit};
pub use crate::config::ExperimentConfig;
pub use crate::core::{
    Gate, Measurement, MeasurementResult, QuantumChannel, QuantumState, errors, utils,
};
pub use crate::error::{Result, TeleportError};
pub use crate::result::{Counts, Distribution, SamplerResult};
pub use crate::sampler::{Sampler, SamplingMode};
pub use crate::transpiler::{Target, transpile};
