use crate::core::errors::GateError;
use crate::core::utils;
use ndarray::{Array2, arr2};
use num_complex::Complex64;
use std::f64::consts::PI;

/// Represents a quantum gate.
///
/// A gate is defined by its unitary matrix and the number of qubits it acts on.
#[derive(Clone, Debug)]
pub struct Gate {
    /// The unitary matrix of the gate.
    pub matrix: Array2<Complex64>,
    /// The number of qubits the gate acts on.
    pub num_qubits: usize,
}

impl Gate {
    /// Creates a new `Gate` from a unitary matrix.
    ///
    /// # Errors
    ///
    /// Returns a `GateError` if:
    /// - The matrix is not square.
    /// - The matrix dimensions are not a power of 2.
    /// - The matrix is not unitary.
    pub fn new(matrix: Array2<Complex64>) -> Result<Self, GateError> {
        let (rows, cols) = matrix.dim();

        if rows != cols {
            return Err(GateError::NotSquareMatrix);
        }

        if !rows.is_power_of_two() {
            return Err(GateError::InvalidDimensions);
        }

        if !Self::check_unitary(&matrix) {
            return Err(GateError::NonUnitary);
        }

        let num_qubits = rows.trailing_zeros() as usize;

        Ok(Self { matrix, num_qubits })
    }

    /// Wraps a matrix that is unitary by construction.
    fn from_unitary(matrix: Array2<Complex64>) -> Gate {
        let num_qubits = matrix.nrows().trailing_zeros() as usize;
        Gate { matrix, num_qubits }
    }

    /// Checks if a given matrix is unitary
    fn check_unitary(matrix: &Array2<Complex64>) -> bool {
        let (rows, _) = matrix.dim();
        let eye = Array2::<Complex64>::eye(rows);

        let u_dagger = matrix.t().mapv(|x| x.conj());
        let product = matrix.dot(&u_dagger);

        product
            .iter()
            .zip(eye.iter())
            .all(|(a, b)| (*a - *b).norm() < 1e-6)
    }

    /// Expands a gate to act on a larger system of qubits.
    ///
    /// This function creates a new gate that acts on `num_total_qubits` by applying the original `gate`
    /// to the specified `targets` and `controls` (if any), and Identity on the rest.
    ///
    /// # Errors
    ///
    /// Returns `GateError` if:
    /// - Duplicate indices are found in `targets` or `controls`.
    /// - A qubit is used as both control and target.
    pub fn expand_gate(
        num_total_qubits: usize,
        gate: &Gate,
        targets: &[usize],
        controls: &[usize],
    ) -> Result<Gate, GateError> {
        if let Some(dup) = utils::find_duplicate(targets) {
            return Err(GateError::DuplicateQubit(dup));
        }

        if let Some(dup) = utils::find_duplicate(controls) {
            return Err(GateError::DuplicateQubit(dup));
        }

        for &c in controls {
            if targets.contains(&c) {
                return Err(GateError::ControlTargetOverlap(c));
            }
        }

        Ok(Gate {
            matrix: utils::expand_operator(num_total_qubits, &gate.matrix, targets, controls),
            num_qubits: num_total_qubits,
        })
    }

    /// Returns true when both gates are equal up to a global phase.
    pub fn equivalent_up_to_phase(&self, other: &Gate, tol: f64) -> bool {
        if self.matrix.dim() != other.matrix.dim() {
            return false;
        }

        // Anchor the phase on the largest entry of `other`
        let Some((idx, anchor)) = other
            .matrix
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.norm().total_cmp(&b.1.norm()))
        else {
            return true;
        };
        if anchor.norm() < tol {
            return false;
        }
        let Some(own) = self.matrix.iter().nth(idx) else {
            return false;
        };
        let phase = own / anchor;
        if (phase.norm() - 1.0).abs() > tol {
            return false;
        }

        self.matrix
            .iter()
            .zip(other.matrix.iter())
            .all(|(a, b)| (a - phase * b).norm() < tol)
    }

    // --- Standard Gates ---

    /// Creates an Identity gate.
    pub fn i() -> Gate {
        Gate::from_unitary(arr2(&[
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)],
        ]))
    }

    /// Creates a Pauli-X gate (NOT gate).
    pub fn x() -> Gate {
        Gate::from_unitary(arr2(&[
            [Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)],
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
        ]))
    }

    /// Creates a Pauli-Y gate.
    pub fn y() -> Gate {
        Gate::from_unitary(arr2(&[
            [Complex64::new(0.0, 0.0), Complex64::new(0.0, -1.0)],
            [Complex64::new(0.0, 1.0), Complex64::new(0.0, 0.0)],
        ]))
    }

    /// Creates a Pauli-Z gate.
    pub fn z() -> Gate {
        Gate::from_unitary(arr2(&[
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(-1.0, 0.0)],
        ]))
    }

    /// Creates a Hadamard gate.
    pub fn h() -> Gate {
        let factor = 1.0 / 2.0_f64.sqrt();
        Gate::from_unitary(arr2(&[
            [Complex64::new(factor, 0.0), Complex64::new(factor, 0.0)],
            [Complex64::new(factor, 0.0), Complex64::new(-factor, 0.0)],
        ]))
    }

    /// Creates an S gate (Phase gate, Z^1/2).
    pub fn s() -> Gate {
        Gate::from_unitary(arr2(&[
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(0.0, 1.0)],
        ]))
    }

    /// Creates a T gate (Z^1/4).
    pub fn t_gate() -> Gate {
        let angle = PI / 4.0;
        Gate::from_unitary(arr2(&[
            [Complex64::new(1.0, 0.0), Complex64::new(0.0, 0.0)],
            [
                Complex64::new(0.0, 0.0),
                Complex64::new(angle.cos(), angle.sin()),
            ],
        ]))
    }

    /// Creates a sqrt(X) gate, native on superconducting devices.
    pub fn sx() -> Gate {
        Gate::from_unitary(arr2(&[
            [Complex64::new(0.5, 0.5), Complex64::new(0.5, -0.5)],
            [Complex64::new(0.5, -0.5), Complex64::new(0.5, 0.5)],
        ]))
    }

    /// Rotation around the X axis, `exp(-i theta X / 2)`.
    pub fn rx(theta: f64) -> Gate {
        let (s, c) = (theta / 2.0).sin_cos();
        Gate::from_unitary(arr2(&[
            [Complex64::new(c, 0.0), Complex64::new(0.0, -s)],
            [Complex64::new(0.0, -s), Complex64::new(c, 0.0)],
        ]))
    }

    /// Rotation around the Y axis, `exp(-i theta Y / 2)`.
    pub fn ry(theta: f64) -> Gate {
        let (s, c) = (theta / 2.0).sin_cos();
        Gate::from_unitary(arr2(&[
            [Complex64::new(c, 0.0), Complex64::new(-s, 0.0)],
            [Complex64::new(s, 0.0), Complex64::new(c, 0.0)],
        ]))
    }

    /// Rotation around the Z axis, `exp(-i theta Z / 2)`.
    pub fn rz(theta: f64) -> Gate {
        Gate::from_unitary(arr2(&[
            [Complex64::from_polar(1.0, -theta / 2.0), Complex64::new(0.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::from_polar(1.0, theta / 2.0)],
        ]))
    }

    /// Generic single-qubit rotation U(theta, phi, lambda).
    pub fn u(theta: f64, phi: f64, lambda: f64) -> Gate {
        let (s, c) = (theta / 2.0).sin_cos();
        Gate::from_unitary(arr2(&[
            [Complex64::new(c, 0.0), -Complex64::from_polar(s, lambda)],
            [
                Complex64::from_polar(s, phi),
                Complex64::from_polar(c, phi + lambda),
            ],
        ]))
    }

    /// Creates a CNOT (Controlled-NOT) gate.
    pub fn cnot() -> Gate {
        Gate::from_unitary(utils::expand_operator(2, &Gate::x().matrix, &[1], &[0]))
    }

    /// Creates a SWAP gate.
    pub fn swap() -> Gate {
        let one = Complex64::new(1.0, 0.0);
        let mut matrix = Array2::<Complex64>::zeros((4, 4));
        matrix[[0, 0]] = one;
        matrix[[1, 2]] = one;
        matrix[[2, 1]] = one;
        matrix[[3, 3]] = one;
        Gate::from_unitary(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_rotations_are_unitary() {
        for theta in [0.0, 0.3, PI / 3.0, PI, -2.1] {
            assert!(Gate::new(Gate::rx(theta).matrix).is_ok());
            assert!(Gate::new(Gate::ry(theta).matrix).is_ok());
            assert!(Gate::new(Gate::rz(theta).matrix).is_ok());
            assert!(Gate::new(Gate::u(theta, 0.4, -1.2).matrix).is_ok());
        }
    }

    #[test]
    fn test_sx_squared_is_x() {
        let sx = Gate::sx();
        let squared = Gate::from_unitary(sx.matrix.dot(&sx.matrix));
        assert!(squared.equivalent_up_to_phase(&Gate::x(), 1e-12));
    }

    #[test]
    fn test_u_matches_ry_when_phases_vanish() {
        let theta = PI / 3.0;
        assert!(Gate::u(theta, 0.0, 0.0).equivalent_up_to_phase(&Gate::ry(theta), 1e-12));
    }

    #[test]
    fn test_rz_pi_is_z_up_to_phase() {
        assert!(Gate::rz(PI).equivalent_up_to_phase(&Gate::z(), 1e-12));
        assert!(!Gate::rz(PI).equivalent_up_to_phase(&Gate::x(), 1e-12));
    }

    #[test]
    fn test_cnot_flips_target_when_control_set() {
        let cnot = Gate::cnot();
        // |q1 q0> = |01> (index 1) -> |11> (index 3)
        assert_abs_diff_eq!(cnot.matrix[[3, 1]].re, 1.0);
        assert_abs_diff_eq!(cnot.matrix[[0, 0]].re, 1.0);
    }

    #[test]
    fn test_new_rejects_non_unitary() {
        let m = arr2(&[
            [Complex64::new(1.0, 0.0), Complex64::new(1.0, 0.0)],
            [Complex64::new(0.0, 0.0), Complex64::new(1.0, 0.0)],
        ]);
        assert!(matches!(Gate::new(m), Err(GateError::NonUnitary)));
    }
}
