//! Experiment configuration.
//!
//! ## Sources (later wins)
//! 1. Built-in defaults
//! 2. JSON file named by `QTELEPORT_CONFIG`
//! 3. Environment overrides: `QTELEPORT_THETA`, `QTELEPORT_SHOTS`,
//!    `QTELEPORT_SEED`, `QTELEPORT_OUTPUT_DIR`, `QTELEPORT_LOG_FORMAT`

use crate::error::ConfigError;
use crate::logging::{LogFormat, LoggingConfig};
use crate::noise::NoiseConfig;
use crate::sampler::SamplingMode;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::info;

pub const CONFIG_PATH_VAR: &str = "QTELEPORT_CONFIG";

/// One emulated device in the service catalog.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub name: String,
    pub num_qubits: usize,
    pub coupling_map: Vec<(usize, usize)>,
    #[serde(default = "default_basis_gates")]
    pub basis_gates: Vec<String>,
    #[serde(default)]
    pub pending_jobs: usize,
    #[serde(default = "default_true")]
    pub operational: bool,
    #[serde(default)]
    pub noise: NoiseConfig,
}

fn default_basis_gates() -> Vec<String> {
    crate::transpiler::default_basis()
}

fn default_true() -> bool {
    true
}

impl DeviceConfig {
    /// Device with a linear coupling map and default noise.
    pub fn line(name: impl Into<String>, num_qubits: usize, pending_jobs: usize) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            coupling_map: (1..num_qubits).map(|q| (q - 1, q)).collect(),
            basis_gates: default_basis_gates(),
            pending_jobs,
            operational: true,
            noise: NoiseConfig::default(),
        }
    }
}

/// Devices available when no catalog is configured.
pub fn default_devices() -> Vec<DeviceConfig> {
    let heavy_hex = DeviceConfig {
        name: "emulated_heavyhex_7q".to_string(),
        num_qubits: 7,
        coupling_map: vec![(0, 1), (1, 2), (1, 3), (3, 5), (4, 5), (5, 6)],
        basis_gates: default_basis_gates(),
        pending_jobs: 4,
        operational: true,
        noise: NoiseConfig::default(),
    };
    let maintenance = DeviceConfig {
        operational: false,
        ..DeviceConfig::line("emulated_maintenance_3q", 3, 0)
    };

    vec![
        DeviceConfig::line("emulated_line_5q", 5, 12),
        heavy_hex,
        maintenance,
    ]
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Preparation angle of the teleported state.
    pub theta: f64,
    pub shots: usize,
    /// Seed for every sampler and device. `None` draws from the OS.
    pub seed: Option<u64>,
    pub output_dir: PathBuf,
    pub write_artifacts: bool,
    pub optimization_level: u8,
    pub sampling_mode: SamplingMode,
    /// Smallest device accepted for the hardware run.
    pub min_num_qubits: usize,
    pub devices: Vec<DeviceConfig>,
    pub logging: LoggingConfig,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            theta: PI / 3.0,
            shots: 4096,
            seed: None,
            output_dir: PathBuf::from("."),
            write_artifacts: true,
            optimization_level: 1,
            sampling_mode: SamplingMode::default(),
            min_num_qubits: 3,
            devices: default_devices(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ExperimentConfig {
    /// Loads configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Loads configuration, reading variables through `lookup`.
    pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup(CONFIG_PATH_VAR) {
            Some(path) if !path.trim().is_empty() => Self::from_file(Path::new(&path))?,
            _ => Self::default(),
        };

        if let Some(theta) = lookup("QTELEPORT_THETA") {
            config.theta = parse_value("QTELEPORT_THETA", &theta)?;
        }
        if let Some(shots) = lookup("QTELEPORT_SHOTS") {
            config.shots = parse_value("QTELEPORT_SHOTS", &shots)?;
        }
        if let Some(seed) = lookup("QTELEPORT_SEED") {
            config.seed = Some(parse_value("QTELEPORT_SEED", &seed)?);
        }
        if let Some(dir) = lookup("QTELEPORT_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(format) = lookup("QTELEPORT_LOG_FORMAT") {
            config.logging.format =
                LogFormat::parse(&format).ok_or_else(|| ConfigError::InvalidValue {
                    key: "QTELEPORT_LOG_FORMAT".to_string(),
                    value: format.clone(),
                })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Logs the effective settings. Call once the subscriber is installed.
    pub fn log_loaded(&self) {
        info!(
            theta = self.theta,
            shots = self.shots,
            seed = ?self.seed,
            devices = self.devices.len(),
            output_dir = %self.output_dir.display(),
            "configuration loaded"
        );
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parses a JSON document. Missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.theta.is_finite() {
            return Err(invalid("theta", self.theta));
        }
        if self.shots == 0 || self.shots > crate::backend::MAX_SHOTS {
            return Err(invalid("shots", self.shots));
        }
        if self.optimization_level > 3 {
            return Err(invalid("optimization_level", self.optimization_level));
        }
        for device in &self.devices {
            if let Some(&(a, b)) = device
                .coupling_map
                .iter()
                .find(|&&(a, b)| a >= device.num_qubits || b >= device.num_qubits || a == b)
            {
                return Err(ConfigError::InvalidValue {
                    key: format!("devices.{}.coupling_map", device.name),
                    value: format!("({a}, {b})"),
                });
            }
        }
        Ok(())
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(key, raw))
}
