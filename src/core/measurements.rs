use crate::core::errors::MeasurementError;
use crate::core::utils;
use ndarray::{Array1, Array2, array};
use num_complex::Complex64;

#[derive(Clone, Debug)]
pub struct Measurement {
    /// List of measurement operators
    pub operators: Vec<Array2<Complex64>>,
    /// Value associated with each outcome
    pub values: Vec<f64>,
    /// Number of qubits the measurement acts on
    pub num_qubits: usize,
}

impl Measurement {
    pub fn new(
        operators: Vec<Array2<Complex64>>,
        values: Vec<f64>,
    ) -> Result<Self, MeasurementError> {
        if operators.len() != values.len() {
            return Err(MeasurementError::CountMismatch {
                ops: operators.len(),
                vals: values.len(),
            });
        }

        if operators.is_empty() {
            return Err(MeasurementError::InvalidDimensions);
        }

        let (rows, cols) = operators[0].dim();
        if rows != cols || !rows.is_power_of_two() {
            return Err(MeasurementError::InvalidDimensions);
        }
        // log_2 as rows is power of two
        let num_qubits = rows.trailing_zeros() as usize;

        for op in &operators {
            if op.dim() != (rows, cols) {
                return Err(MeasurementError::InvalidDimensions);
            }
        }

        if !utils::check_completeness(&operators, rows) {
            return Err(MeasurementError::NotComplete);
        }

        Ok(Self {
            operators,
            values,
            num_qubits,
        })
    }

    /// Builds a projective measurement from an orthonormal basis, one outcome per vector.
    fn from_basis(vectors: [Array1<Complex64>; 2]) -> Measurement {
        let operators = vectors
            .iter()
            .map(|v| utils::outer_product(v, v))
            .collect();
        Measurement {
            operators,
            values: vec![0.0, 1.0],
            num_qubits: 1,
        }
    }

    /// Expands measurement operators to a larger system
    pub fn get_expanded_operators(
        &self,
        num_total_qubits: usize,
        targets: &[usize],
    ) -> Result<Vec<Array2<Complex64>>, MeasurementError> {
        if targets.len() != self.num_qubits {
            return Err(MeasurementError::TargetMismatch {
                expected: self.num_qubits,
                got: targets.len(),
            });
        }

        Ok(self
            .operators
            .iter()
            .map(|op| utils::expand_operator(num_total_qubits, op, targets, &[]))
            .collect())
    }

    /// Z basis (Computational) -> {|0>, |1>}.
    pub fn z_basis() -> Measurement {
        Self::from_basis([
            array![Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            array![Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)],
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementResult {
    /// Applied measurement operator index
    pub index: usize,
    /// Measurement value
    pub value: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_z_basis_is_complete() {
        let m = Measurement::z_basis();
        assert!(utils::check_completeness(&m.operators, 2));
        assert_eq!(m.num_qubits, 1);
        assert_eq!(m.values, vec![0.0, 1.0]);
    }

    #[test]
    fn test_new_rejects_count_mismatch() {
        let z = Measurement::z_basis();
        let err = Measurement::new(z.operators, vec![0.0]).unwrap_err();
        assert!(matches!(
            err,
            MeasurementError::CountMismatch { ops: 2, vals: 1 }
        ));
    }

    #[test]
    fn test_expansion_target_mismatch() {
        let z = Measurement::z_basis();
        assert!(matches!(
            z.get_expanded_operators(3, &[0, 1]),
            Err(MeasurementError::TargetMismatch {
                expected: 1,
                got: 2
            })
        ));
    }
}
