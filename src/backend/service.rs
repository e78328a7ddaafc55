use super::{Backend, EmulatedDevice, LocalSimulator};
use crate::config::ExperimentConfig;
use crate::error::BackendError;
use tracing::{debug, info};

/// Catalog of available backends.
pub struct QuantumService {
    backends: Vec<Box<dyn Backend>>,
}

impl QuantumService {
    pub fn new(backends: Vec<Box<dyn Backend>>) -> Self {
        Self { backends }
    }

    /// Local simulator plus one emulated device per configured entry.
    pub fn from_config(config: &ExperimentConfig) -> Result<Self, BackendError> {
        let mut local = LocalSimulator::new().with_mode(config.sampling_mode);
        if let Some(seed) = config.seed {
            local = local.with_seed(seed);
        }

        let mut backends: Vec<Box<dyn Backend>> = vec![Box::new(local)];
        for device in &config.devices {
            backends.push(Box::new(EmulatedDevice::from_config(
                device,
                config.seed,
                config.sampling_mode,
            )?));
        }
        debug!(count = backends.len(), "service catalog ready");
        Ok(Self::new(backends))
    }

    pub fn backends(&self) -> impl Iterator<Item = &dyn Backend> {
        self.backends.iter().map(|b| b.as_ref())
    }

    pub fn backend(&self, name: &str) -> Result<&dyn Backend, BackendError> {
        self.backends()
            .find(|b| b.info().name == name)
            .ok_or_else(|| BackendError::UnknownBackend(name.to_string()))
    }

    /// Matching backend with the fewest pending jobs. Ties keep catalog order.
    pub fn least_busy(
        &self,
        min_num_qubits: usize,
        operational: bool,
        simulator: bool,
    ) -> Result<&dyn Backend, BackendError> {
        let chosen = self
            .backends()
            .map(|backend| (backend, backend.info()))
            .filter(|(_, info)| {
                info.num_qubits >= min_num_qubits
                    && info.operational == operational
                    && info.simulator == simulator
            })
            .min_by_key(|(_, info)| info.pending_jobs)
            .map(|(backend, _)| backend)
            .ok_or(BackendError::NoBackendAvailable {
                min_num_qubits,
                operational,
                simulator,
            })?;

        info!(backend = %chosen.name(), "least busy backend selected");
        Ok(chosen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeviceConfig;

    fn service(devices: Vec<DeviceConfig>) -> QuantumService {
        let config = ExperimentConfig {
            devices,
            ..ExperimentConfig::default()
        };
        QuantumService::from_config(&config).unwrap()
    }

    #[test]
    fn test_least_busy_default_catalog() {
        let service = service(crate::config::default_devices());
        let backend = service.least_busy(3, true, false).unwrap();
        assert_eq!(backend.name(), "emulated_heavyhex_7q");
    }

    #[test]
    fn test_least_busy_respects_filters() {
        let service = service(vec![
            DeviceConfig::line("small", 2, 0),
            DeviceConfig::line("busy", 5, 9),
            DeviceConfig::line("idle", 5, 1),
        ]);
        assert_eq!(service.least_busy(3, true, false).unwrap().name(), "idle");
        assert_eq!(service.least_busy(2, true, false).unwrap().name(), "small");
        assert_eq!(
            service.least_busy(3, true, true).unwrap().name(),
            "local_simulator"
        );
    }

    #[test]
    fn test_least_busy_no_match() {
        let service = service(vec![DeviceConfig::line("tiny", 2, 0)]);
        assert!(matches!(
            service.least_busy(3, true, false),
            Err(BackendError::NoBackendAvailable {
                min_num_qubits: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_backend_lookup() {
        let service = service(crate::config::default_devices());
        assert_eq!(service.backends().count(), 4);
        assert!(service.backend("emulated_line_5q").is_ok());
        assert!(matches!(
            service.backend("nope"),
            Err(BackendError::UnknownBackend(_))
        ));
    }
}
