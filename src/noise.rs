//! Device noise: gate depolarization, thermal relaxation and readout flips.

use crate::core::QuantumChannel;
use crate::core::errors::ChannelError;
use serde::{Deserialize, Serialize};

/// Calibration-style noise parameters of a device.
///
/// Times are in microseconds. Leaving `t1_us` unset disables thermal relaxation,
/// and `t2_us` then must be unset too. `t2_us = None` with a `t1_us` means `T2 = 2 T1`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Depolarizing probability after each physical single-qubit gate.
    pub single_qubit_error: f64,
    /// Depolarizing probability applied to each qubit of a two-qubit gate.
    pub two_qubit_error: f64,
    /// Probability that a measured bit is reported flipped.
    pub readout_error: f64,
    pub t1_us: Option<f64>,
    pub t2_us: Option<f64>,
    pub single_qubit_gate_time_us: f64,
    pub two_qubit_gate_time_us: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            single_qubit_error: 2.5e-4,
            two_qubit_error: 7.5e-3,
            readout_error: 1.5e-2,
            t1_us: Some(150.0),
            t2_us: Some(110.0),
            single_qubit_gate_time_us: 0.035,
            two_qubit_gate_time_us: 0.45,
        }
    }
}

impl NoiseConfig {
    /// No errors at all.
    pub fn ideal() -> Self {
        Self {
            single_qubit_error: 0.0,
            two_qubit_error: 0.0,
            readout_error: 0.0,
            t1_us: None,
            t2_us: None,
            single_qubit_gate_time_us: 0.0,
            two_qubit_gate_time_us: 0.0,
        }
    }
}

/// Channels applied during execution, derived from a [`NoiseConfig`].
#[derive(Clone, Debug)]
pub struct NoiseModel {
    single_qubit: Option<QuantumChannel>,
    two_qubit: Option<QuantumChannel>,
    readout_error: f64,
}

impl NoiseModel {
    pub fn ideal() -> Self {
        Self {
            single_qubit: None,
            two_qubit: None,
            readout_error: 0.0,
        }
    }

    pub fn from_config(config: &NoiseConfig) -> Result<Self, ChannelError> {
        if !(0.0..=1.0).contains(&config.readout_error) {
            return Err(ChannelError::InvalidProbability(config.readout_error));
        }

        let single_qubit = Self::gate_channel(
            config.single_qubit_error,
            config,
            config.single_qubit_gate_time_us,
        )?;
        let two_qubit = Self::gate_channel(
            config.two_qubit_error,
            config,
            config.two_qubit_gate_time_us,
        )?;

        Ok(Self {
            single_qubit,
            two_qubit,
            readout_error: config.readout_error,
        })
    }

    /// Depolarization followed by relaxation over the gate duration; `None` when error-free.
    fn gate_channel(
        error: f64,
        config: &NoiseConfig,
        duration: f64,
    ) -> Result<Option<QuantumChannel>, ChannelError> {
        let depolarizing = QuantumChannel::depolarizing(error)?;

        let relaxation = match (config.t1_us, config.t2_us) {
            (Some(t1), Some(t2)) if duration > 0.0 => {
                Some(QuantumChannel::thermal_relaxation(t1, t2, duration)?)
            }
            (Some(t1), None) if duration > 0.0 => {
                Some(QuantumChannel::thermal_relaxation(t1, 2.0 * t1, duration)?)
            }
            (None, Some(t2)) => return Err(ChannelError::MissingT1(t2)),
            _ => None,
        };

        Ok(match relaxation {
            Some(relax) => Some(depolarizing.compose(&relax)?),
            None if error > 0.0 => Some(depolarizing),
            None => None,
        })
    }

    /// Channel applied to every qubit after a gate acting on `arity` qubits.
    pub fn after_gate(&self, arity: usize) -> Option<&QuantumChannel> {
        if arity >= 2 {
            self.two_qubit.as_ref()
        } else {
            self.single_qubit.as_ref()
        }
    }

    pub fn readout_error(&self) -> f64 {
        self.readout_error
    }

    pub fn is_ideal(&self) -> bool {
        self.single_qubit.is_none() && self.two_qubit.is_none() && self.readout_error == 0.0
    }
}

impl Default for NoiseModel {
    fn default() -> Self {
        Self::ideal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::utils;

    #[test]
    fn test_ideal_config_gives_ideal_model() {
        let model = NoiseModel::from_config(&NoiseConfig::ideal()).unwrap();
        assert!(model.is_ideal());
        assert!(model.after_gate(1).is_none());
    }

    #[test]
    fn test_default_config_channels_are_trace_preserving() {
        let model = NoiseModel::from_config(&NoiseConfig::default()).unwrap();
        for arity in [1, 2] {
            let channel = model.after_gate(arity).unwrap();
            assert!(utils::check_completeness(&channel.kraus_ops, 2));
        }
        assert!(!model.is_ideal());
    }

    #[test]
    fn test_t2_without_t1_rejected() {
        let config = NoiseConfig {
            t1_us: None,
            ..NoiseConfig::default()
        };
        assert!(matches!(
            NoiseModel::from_config(&config),
            Err(ChannelError::MissingT1(_))
        ));
    }

    #[test]
    fn test_invalid_readout_rejected() {
        let config = NoiseConfig {
            readout_error: 1.2,
            ..NoiseConfig::default()
        };
        assert!(matches!(
            NoiseModel::from_config(&config),
            Err(ChannelError::InvalidProbability(_))
        ));
    }
}
