use crate::circuit::{GateKind, Instruction, QuantumCircuit};
use crate::core::{Measurement, QuantumState, errors::StateError};
use crate::error::CircuitError;
use crate::noise::NoiseModel;
use crate::result::{Distribution, SamplerResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Branches less likely than this are dropped from exact distributions.
const BRANCH_EPSILON: f64 = 1e-12;

/// How shots are produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    /// Compute the exact outcome distribution once, then draw every shot from it.
    #[default]
    Distribution,
    /// Simulate each shot independently, collapsing the state at every measurement.
    Trajectory,
}

/// A simulator for sampling quantum circuits.
///
/// The `Sampler` runs a circuit for a number of shots, optionally under a
/// device `NoiseModel`. Qubits that no instruction touches are not simulated.
#[derive(Debug, Clone, Default)]
pub struct Sampler {
    noise: NoiseModel,
    seed: Option<u64>,
    mode: SamplingMode,
}

/// One possible history of the classical bits together with its weight and state.
struct Branch {
    probability: f64,
    state: QuantumState,
    clbits: u64,
}

impl Sampler {
    /// Creates a new `Sampler` instance with no noise.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_noise(mut self, noise: NoiseModel) -> Self {
        self.noise = noise;
        self
    }

    /// Makes sampling reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_mode(mut self, mode: SamplingMode) -> Self {
        self.mode = mode;
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }

    /// Samples `circuit` `shots` times.
    ///
    /// # Returns
    ///
    /// A `SamplerResult` holding the packed classical bits of every shot,
    /// or a `CircuitError` if the simulation fails.
    pub fn run(&self, circuit: &QuantumCircuit, shots: usize) -> Result<SamplerResult, CircuitError> {
        debug!(
            circuit = circuit.name(),
            shots,
            mode = ?self.mode,
            ideal = self.noise.is_ideal(),
            "sampling circuit"
        );
        let mut rng = self.rng();

        let memory = match self.mode {
            SamplingMode::Distribution => {
                let distribution = self.exact_distribution(circuit)?;
                Self::draw(&distribution, shots, &mut rng)
            }
            SamplingMode::Trajectory => {
                let layout = ActiveLayout::of(circuit);
                (0..shots)
                    .map(|_| self.run_trajectory(circuit, &layout, &mut rng))
                    .collect::<Result<Vec<_>, _>>()?
            }
        };

        Ok(SamplerResult::new(
            circuit.num_clbits(),
            circuit.registers().to_vec(),
            memory,
        ))
    }

    /// Draws `shots` outcomes from a distribution using a precomputed CDF.
    fn draw(distribution: &Distribution, shots: usize, rng: &mut StdRng) -> Vec<u64> {
        let outcomes: Vec<(u64, f64)> = distribution.iter().collect();
        let total = distribution.total();

        let mut cdf = Vec::with_capacity(outcomes.len());
        let mut current_sum = 0.0;
        for &(_, p) in &outcomes {
            current_sum += p / total;
            cdf.push(current_sum);
        }

        (0..shots)
            .map(|_| {
                let r: f64 = rng.random();
                let idx = cdf
                    .iter()
                    .position(|&cumulative| r < cumulative)
                    .unwrap_or(outcomes.len().saturating_sub(1));
                outcomes.get(idx).map_or(0, |&(outcome, _)| outcome)
            })
            .collect()
    }

    /// Exact probability of every classical outcome, branching at each measurement.
    pub fn exact_distribution(&self, circuit: &QuantumCircuit) -> Result<Distribution, CircuitError> {
        let layout = ActiveLayout::of(circuit);
        let mut branches = vec![Branch {
            probability: 1.0,
            state: QuantumState::new(layout.width()),
            clbits: 0,
        }];

        for instruction in circuit.instructions() {
            if let Instruction::Measure { qubit, clbit } = instruction {
                branches = self.split_on_measurement(branches, layout.map(*qubit), *clbit)?;
            } else {
                for branch in &mut branches {
                    self.apply(&mut branch.state, instruction, &layout, branch.clbits)?;
                }
            }
        }

        let mut distribution = Distribution::new(circuit.num_clbits());
        for branch in branches {
            distribution.add(branch.clbits, branch.probability);
        }
        Ok(distribution)
    }

    fn split_on_measurement(
        &self,
        branches: Vec<Branch>,
        qubit: usize,
        clbit: usize,
    ) -> Result<Vec<Branch>, StateError> {
        let flip = self.noise.readout_error();
        let mut next = Vec::with_capacity(branches.len() * 2);

        for branch in branches {
            for (result, p, post) in branch
                .state
                .measurement_branches(&Measurement::z_basis(), &[qubit])?
            {
                let measured = result.index == 1;
                let weight = branch.probability * p;

                for (reported, readout_p) in [(measured, 1.0 - flip), (!measured, flip)] {
                    let probability = weight * readout_p;
                    if probability < BRANCH_EPSILON {
                        continue;
                    }
                    next.push(Branch {
                        probability,
                        state: post.clone(),
                        clbits: set_bit(branch.clbits, clbit, reported),
                    });
                }
            }
        }
        Ok(next)
    }

    fn run_trajectory(
        &self,
        circuit: &QuantumCircuit,
        layout: &ActiveLayout,
        rng: &mut StdRng,
    ) -> Result<u64, CircuitError> {
        let mut state = QuantumState::new(layout.width());
        let mut clbits = 0u64;

        for instruction in circuit.instructions() {
            if let Instruction::Measure { qubit, clbit } = instruction {
                let result = state.measure_with(&Measurement::z_basis(), &[layout.map(*qubit)], rng)?;
                let mut reported = result.index == 1;
                let flip = self.noise.readout_error();
                if flip > 0.0 && rng.random_bool(flip) {
                    reported = !reported;
                }
                clbits = set_bit(clbits, *clbit, reported);
            } else {
                self.apply(&mut state, instruction, layout, clbits)?;
            }
        }
        Ok(clbits)
    }

    /// Applies every non-measurement instruction, followed by the gate noise.
    fn apply(
        &self,
        state: &mut QuantumState,
        instruction: &Instruction,
        layout: &ActiveLayout,
        clbits: u64,
    ) -> Result<(), StateError> {
        match instruction {
            Instruction::Gate {
                kind,
                qubits,
                condition,
            } => {
                if condition.is_some_and(|c| !c.is_satisfied(clbits)) {
                    return Ok(());
                }
                let targets: Vec<usize> = qubits.iter().map(|&q| layout.map(q)).collect();
                state.apply(&kind.to_gate(), &targets)?;

                // Frame changes are virtual on hardware and take no time
                if !matches!(kind, GateKind::RZ(_)) {
                    self.apply_gate_noise(state, &targets)?;
                }
            }
            Instruction::Initialize { qubit, amplitudes } => {
                let target = layout.map(*qubit);
                state.initialize_qubit(target, *amplitudes)?;
                self.apply_gate_noise(state, &[target])?;
            }
            Instruction::Reset { qubit } => state.reset_qubit(layout.map(*qubit))?,
            Instruction::Barrier { .. } | Instruction::Measure { .. } => {}
        }
        Ok(())
    }

    fn apply_gate_noise(&self, state: &mut QuantumState, targets: &[usize]) -> Result<(), StateError> {
        if let Some(channel) = self.noise.after_gate(targets.len()) {
            for &q in targets {
                state.apply_channel(channel, &[q])?;
            }
        }
        Ok(())
    }
}

fn set_bit(value: u64, bit: usize, on: bool) -> u64 {
    if on {
        value | (1 << bit)
    } else {
        value & !(1 << bit)
    }
}

/// Dense re-indexing of the qubits a circuit actually uses.
struct ActiveLayout {
    dense: Vec<usize>,
    width: usize,
}

impl ActiveLayout {
    fn of(circuit: &QuantumCircuit) -> Self {
        let active = circuit.active_qubits();
        let mut dense = vec![0; circuit.num_qubits()];
        for (i, &q) in active.iter().enumerate() {
            dense[q] = i;
        }
        Self {
            dense,
            width: active.len(),
        }
    }

    fn map(&self, qubit: usize) -> usize {
        self.dense[qubit]
    }

    fn width(&self) -> usize {
        self.width
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Condition;
    use crate::noise::NoiseConfig;
    use approx::assert_abs_diff_eq;

    fn bell() -> QuantumCircuit {
        let mut qc = QuantumCircuit::new(2);
        let c = qc.add_register("c", 2).unwrap();
        qc.h(0).unwrap().cx(0, 1).unwrap();
        qc.measure_register(&[0, 1], &c).unwrap();
        qc
    }

    #[test]
    fn test_bell_exact_distribution() {
        let dist = Sampler::new().exact_distribution(&bell()).unwrap();
        assert_abs_diff_eq!(dist.probability(0b00), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(dist.probability(0b11), 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(dist.probability(0b01), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let sampler = Sampler::new().with_seed(42);
        let a = sampler.run(&bell(), 500).unwrap();
        let b = sampler.run(&bell(), 500).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.shots(), 500);
        assert_eq!(a.counts().total(), 500);
    }

    #[test]
    fn test_trajectory_mode_keeps_correlations() {
        let result = Sampler::new()
            .with_seed(3)
            .with_mode(SamplingMode::Trajectory)
            .run(&bell(), 200)
            .unwrap();
        let counts = result.counts();
        assert_eq!(counts.get("01") + counts.get("10"), 0);
        assert_eq!(counts.get("00") + counts.get("11"), 200);
    }

    #[test]
    fn test_conditioned_gate_uses_measured_bit() {
        // Measure |1>, then flip qubit 1 only if the bit is set
        let mut qc = QuantumCircuit::new(2);
        let c = qc.add_register("c", 2).unwrap();
        qc.x(0).unwrap();
        qc.measure(0, c.bit(0).unwrap()).unwrap();
        qc.if_test(Condition::new(c.bit(0).unwrap(), true), |body| {
            body.x(1)?;
            Ok(())
        })
        .unwrap();
        qc.measure(1, c.bit(1).unwrap()).unwrap();

        let dist = Sampler::new().exact_distribution(&qc).unwrap();
        assert_abs_diff_eq!(dist.probability(0b11), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_readout_error_flips_bits() {
        let mut qc = QuantumCircuit::new(1);
        let c = qc.add_register("c", 1).unwrap();
        qc.measure(0, c.bit(0).unwrap()).unwrap();

        let config = NoiseConfig {
            readout_error: 0.1,
            ..NoiseConfig::ideal()
        };
        let noise = NoiseModel::from_config(&config).unwrap();
        let dist = Sampler::new().with_noise(noise).exact_distribution(&qc).unwrap();
        assert_abs_diff_eq!(dist.probability(1), 0.1, epsilon = 1e-12);
        assert_abs_diff_eq!(dist.total(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_idle_qubits_are_not_simulated() {
        let mut qc = QuantumCircuit::new(12);
        let c = qc.add_register("c", 1).unwrap();
        qc.barrier().unwrap();
        qc.x(11).unwrap();
        qc.measure(11, c.bit(0).unwrap()).unwrap();

        let dist = Sampler::new().exact_distribution(&qc).unwrap();
        assert_abs_diff_eq!(dist.probability(1), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_zero_shots_gives_empty_result() {
        let result = Sampler::new().run(&bell(), 0).unwrap();
        assert_eq!(result.shots(), 0);
        assert!(result.counts().is_empty());
    }
}
