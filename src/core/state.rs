use crate::core::channels::QuantumChannel;
use crate::core::errors::{ChannelError, MeasurementError, StateError};
use crate::core::gates::Gate;
use crate::core::measurements::{Measurement, MeasurementResult};
use crate::core::utils::{dagger, find_duplicate, trace};
use ndarray::{Array1, Array2};
use num_complex::Complex64;
use rand::Rng;

/// Probabilities below this are treated as impossible outcomes.
const PROBABILITY_EPSILON: f64 = 1e-12;

#[derive(Clone, Debug)]
pub struct QuantumState {
    pub density_matrix: Array2<Complex64>,
    pub num_qubits: usize,
}

impl QuantumState {
    /// Creates a new quantum state initialized to |0...0>.
    pub fn new(num_qubits: usize) -> Self {
        let dim = 1 << num_qubits;
        let mut density_matrix = Array2::<Complex64>::zeros((dim, dim));
        density_matrix[[0, 0]] = Complex64::new(1.0, 0.0);

        Self {
            density_matrix,
            num_qubits,
        }
    }

    /// Validates that the input vector is a valid quantum state.
    fn check_vector_state(vector: &Array1<Complex64>) -> Result<(), StateError> {
        let dim = vector.len();

        if !dim.is_power_of_two() {
            return Err(StateError::InvalidDimensions);
        }

        // Sum of squared amplitudes must be 1.
        let norm_sqr: f64 = vector.iter().map(|c| c.norm_sqr()).sum();

        if (norm_sqr - 1.0).abs() > 1e-10 {
            return Err(StateError::NotNormalized(norm_sqr));
        }

        Ok(())
    }

    /// Checks the validity of a density matrix
    fn check_density_matrix(matrix: &Array2<Complex64>) -> Result<(), StateError> {
        let (rows, cols) = matrix.dim();

        if rows != cols {
            return Err(StateError::DimensionMismatch {
                expected: rows,
                got_rows: rows,
                got_cols: cols,
            });
        }
        if !rows.is_power_of_two() {
            return Err(StateError::InvalidDimensions);
        }

        let tr = trace(matrix);
        if (tr - Complex64::new(1.0, 0.0)).norm() > 1e-10 {
            return Err(StateError::InvalidTrace(tr));
        }

        Ok(())
    }

    /// Apply an operator already expanded to the whole system
    fn apply_operator(&mut self, u: &Array2<Complex64>) -> Result<(), StateError> {
        let (rows, cols) = u.dim();
        let dim = 1 << self.num_qubits;

        if rows != dim || cols != dim {
            return Err(StateError::DimensionMismatch {
                expected: dim,
                got_rows: rows,
                got_cols: cols,
            });
        }

        self.density_matrix = u.dot(&self.density_matrix).dot(&dagger(u));

        Ok(())
    }

    /// Checks if a given index is within the system QuantumState's range
    fn validate_qubit_index(&self, index: usize) -> Result<(), StateError> {
        if index >= self.num_qubits {
            return Err(StateError::IndexOutOfBounds {
                index,
                num_qubits: self.num_qubits,
            });
        }
        Ok(())
    }

    /// Creates a QuantumState from a generic vector state.
    pub fn from_state_vector(vector: Array1<Complex64>) -> Result<Self, StateError> {
        Self::check_vector_state(&vector)?;

        let dim = vector.len();
        let num_qubits = dim.trailing_zeros() as usize;

        // rho = |psi><psi|
        let mut matrix = Array2::<Complex64>::zeros((dim, dim));
        for (i, a) in vector.iter().enumerate() {
            for (j, b) in vector.iter().enumerate() {
                matrix[[i, j]] = a * b.conj();
            }
        }

        Ok(Self {
            density_matrix: matrix,
            num_qubits,
        })
    }

    /// Creates a QuantumState from a generic density matrix.
    pub fn from_density_matrix(matrix: Array2<Complex64>) -> Result<Self, StateError> {
        Self::check_density_matrix(&matrix)?;
        let (rows, _) = matrix.dim();
        // log_2 as rows is power of two
        let num_qubits = rows.trailing_zeros() as usize;

        Ok(Self {
            density_matrix: matrix,
            num_qubits,
        })
    }

    /// Checks if a QuantumState is valid.
    pub fn is_valid(&self) -> Result<(), StateError> {
        Self::check_density_matrix(&self.density_matrix)?;
        Ok(())
    }

    /// Probability of each computational basis state, indexed with qubit `k` at bit `k`.
    pub fn probabilities(&self) -> Vec<f64> {
        self.density_matrix
            .diag()
            .iter()
            .map(|c| c.re.max(0.0))
            .collect()
    }

    /// Applies non controlled quantum gate
    pub fn apply(&mut self, gate: &Gate, target_qubits: &[usize]) -> Result<(), StateError> {
        self.apply_controlled(gate, target_qubits, None)
    }

    /// Applies generic quantum gate
    pub fn apply_controlled(
        &mut self,
        gate: &Gate,
        target_qubits: &[usize],
        control_qubits: Option<&[usize]>,
    ) -> Result<(), StateError> {
        if gate.num_qubits != target_qubits.len() {
            return Err(StateError::DimensionMismatch {
                expected: gate.num_qubits,
                got_rows: target_qubits.len(),
                got_cols: 0,
            });
        }

        for &q in target_qubits {
            self.validate_qubit_index(q)?;
        }

        let controls = control_qubits.unwrap_or(&[]);
        for &q in controls {
            self.validate_qubit_index(q)?;
        }

        let full_gate_operator = Gate::expand_gate(self.num_qubits, gate, target_qubits, controls)?;

        self.apply_operator(&full_gate_operator.matrix)
    }

    /// Returns the probability of each operator expanded to the whole system
    pub fn set_measurement(
        &self,
        measurement: &Measurement,
        target_qubits: &[usize],
    ) -> Result<(Vec<f64>, Vec<Array2<Complex64>>), StateError> {
        for &q in target_qubits {
            self.validate_qubit_index(q)?;
        }

        if let Some(dup) = find_duplicate(target_qubits) {
            return Err(StateError::MeasurementError(
                MeasurementError::DuplicateQubit(dup),
            ));
        }

        let expanded_ops = measurement.get_expanded_operators(self.num_qubits, target_qubits)?;

        let mut probs: Vec<f64> = expanded_ops
            .iter()
            .map(|op| {
                let unnormalized_rho_prime = op.dot(&self.density_matrix).dot(&dagger(op));
                trace(&unnormalized_rho_prime).re.max(0.0)
            })
            .collect();

        // Renormalise so accumulated float error does not break completeness
        let sum_probs: f64 = probs.iter().sum();
        if sum_probs > 0.0 {
            for p in &mut probs {
                *p /= sum_probs;
            }
        }

        Ok((probs, expanded_ops))
    }

    /// Randomly selects an operator index weighted by `probs`
    fn pick_outcome<R: Rng>(probs: &[f64], rng: &mut R) -> usize {
        let roll: f64 = rng.random();

        let mut cumulative = 0.0;
        for (i, &p) in probs.iter().enumerate() {
            cumulative += p;
            if roll < cumulative {
                return i;
            }
        }
        // Rounding left the roll past the last bucket
        probs
            .iter()
            .rposition(|&p| p > PROBABILITY_EPSILON)
            .unwrap_or(0)
    }

    /// rho' = (M_k * rho * M_k†) / p_k
    fn collapse(&mut self, m_k: &Array2<Complex64>, p_k: f64) {
        let numerator = m_k.dot(&self.density_matrix).dot(&dagger(m_k));
        self.density_matrix = numerator.mapv(|val| val / p_k);
    }

    /// Physical measurement using the thread-local RNG
    pub fn measure(
        &mut self,
        measurement: &Measurement,
        target_qubits: &[usize],
    ) -> Result<MeasurementResult, StateError> {
        self.measure_with(measurement, target_qubits, &mut rand::rng())
    }

    /// Physical measurement which changes the state irretrievably
    pub fn measure_with<R: Rng>(
        &mut self,
        measurement: &Measurement,
        target_qubits: &[usize],
        rng: &mut R,
    ) -> Result<MeasurementResult, StateError> {
        let (probs, ops) = self.set_measurement(measurement, target_qubits)?;

        let outcome_idx = Self::pick_outcome(&probs, rng);
        let p_selected = probs[outcome_idx];

        if p_selected <= PROBABILITY_EPSILON {
            return Err(StateError::ZeroProbabilityOutcome);
        }
        self.collapse(&ops[outcome_idx], p_selected);

        Ok(MeasurementResult {
            index: outcome_idx,
            value: measurement.values[outcome_idx],
        })
    }

    /// Every possible outcome of a measurement with its probability and post-measurement state.
    ///
    /// Outcomes with negligible probability are omitted.
    pub fn measurement_branches(
        &self,
        measurement: &Measurement,
        target_qubits: &[usize],
    ) -> Result<Vec<(MeasurementResult, f64, QuantumState)>, StateError> {
        let (probs, ops) = self.set_measurement(measurement, target_qubits)?;

        Ok(probs
            .iter()
            .zip(ops.iter())
            .enumerate()
            .filter(|(_, (p, _))| **p > PROBABILITY_EPSILON)
            .map(|(index, (&p, op))| {
                let mut branch = self.clone();
                branch.collapse(op, p);
                let result = MeasurementResult {
                    index,
                    value: measurement.values[index],
                };
                (result, p, branch)
            })
            .collect())
    }

    /// Apply QuantumChannel to QuantumState
    pub fn apply_channel(
        &mut self,
        channel: &QuantumChannel,
        target_qubits: &[usize],
    ) -> Result<(), StateError> {
        if let Some(dup) = find_duplicate(target_qubits) {
            return Err(StateError::ChannelError(ChannelError::DuplicateQubit(dup)));
        }
        for &q in target_qubits {
            self.validate_qubit_index(q)?;
        }

        let ops = channel.get_expanded_operators(self.num_qubits, target_qubits)?;

        let dim = self.density_matrix.nrows();
        self.density_matrix = ops
            .iter()
            .fold(Array2::<Complex64>::zeros((dim, dim)), |acc, k| {
                acc + k.dot(&self.density_matrix).dot(&dagger(k))
            });

        Ok(())
    }

    /// Resets one qubit to |0>, leaving the others untouched.
    pub fn reset_qubit(&mut self, qubit: usize) -> Result<(), StateError> {
        self.apply_channel(&QuantumChannel::reset(), &[qubit])
    }

    /// Resets `qubit` and prepares it in the pure state `a|0> + b|1>`.
    pub fn initialize_qubit(
        &mut self,
        qubit: usize,
        amplitudes: [Complex64; 2],
    ) -> Result<(), StateError> {
        Self::check_vector_state(&Array1::from(amplitudes.to_vec()))?;
        self.reset_qubit(qubit)?;

        let [a, b] = amplitudes;
        // First column maps |0> onto the requested amplitudes
        let prep = Gate::new(ndarray::arr2(&[[a, -b.conj()], [b, a.conj()]]))?;
        self.apply(&prep, &[qubit])
    }
}
