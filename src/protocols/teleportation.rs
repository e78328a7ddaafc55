//! Quantum teleportation of a single-qubit state.
//!
//! q0 holds the state Alice sends, q1 is her half of the EPR pair and q2 is
//! Bob's half. After Alice's Bell-state measurement Bob undoes the preparation
//! with `Ry(-theta)`, so his verification bit reads `0` whenever the state
//! arrived intact.

use crate::circuit::{ClassicalRegister, Condition, QuantumCircuit};
use crate::error::CircuitError;
use crate::result::{Distribution, SamplerResult, bitstring};
use serde::Serialize;
use std::collections::BTreeMap;

pub const ALICE_REGISTER: &str = "alice_meas";
pub const BOB_REGISTER: &str = "bob_verif";
pub const UNCORRECTED_ALICE_REGISTER: &str = "alice_meas_2";
pub const UNCORRECTED_BOB_REGISTER: &str = "bob_verif_2";

/// Amplitudes of `cos(theta/2)|0> + sin(theta/2)|1>`.
pub fn prepare_state_vector(theta: f64) -> [f64; 2] {
    [(theta / 2.0).cos(), (theta / 2.0).sin()]
}

/// Stages shared by both protocols: EPR pair, Bell-state measurement.
fn entangle_and_measure(
    qc: &mut QuantumCircuit,
    alice: &ClassicalRegister,
) -> Result<(), CircuitError> {
    qc.h(1)?.cx(1, 2)?;
    qc.barrier()?;

    qc.cx(0, 1)?.h(0)?;
    qc.barrier()?;

    qc.measure_register(&[0, 1], alice)?;
    qc.barrier()?;
    Ok(())
}

/// Full protocol with Bob's classically conditioned X/Z corrections.
pub fn ideal_circuit(theta: f64) -> Result<QuantumCircuit, CircuitError> {
    let mut qc = QuantumCircuit::with_name("teleportation_ideal", 3);
    let alice = qc.add_register(ALICE_REGISTER, 2)?;
    let bob = qc.add_register(BOB_REGISTER, 1)?;

    qc.initialize(prepare_state_vector(theta), 0)?;
    qc.barrier()?;

    entangle_and_measure(&mut qc, &alice)?;

    // alice_meas[1] carries q1's outcome (bit flip), alice_meas[0] carries q0's (phase flip)
    qc.if_test(Condition::new(alice.bit(1)?, true), |body| {
        body.x(2)?;
        Ok(())
    })?;
    qc.if_test(Condition::new(alice.bit(0)?, true), |body| {
        body.z(2)?;
        Ok(())
    })?;

    qc.ry(-theta, 2)?;
    qc.measure(2, bob.bit(0)?)?;
    Ok(qc)
}

/// The same protocol with Bob's correction step removed.
pub fn uncorrected_circuit(theta: f64) -> Result<QuantumCircuit, CircuitError> {
    let mut qc = QuantumCircuit::with_name("teleportation_uncorrected", 3);
    let alice = qc.add_register(UNCORRECTED_ALICE_REGISTER, 2)?;
    let bob = qc.add_register(UNCORRECTED_BOB_REGISTER, 1)?;

    qc.ry(theta, 0)?;
    qc.barrier()?;

    entangle_and_measure(&mut qc, &alice)?;

    qc.ry(-theta, 2)?;
    qc.measure(2, bob.bit(0)?)?;
    Ok(qc)
}

/// Probability of Bob reading `0` without corrections.
///
/// Each Alice outcome is equally likely and leaves Bob with `|psi>`, `Z|psi>`,
/// `X|psi>` or `XZ|psi>`, whose overlaps with `|psi>` are `1`, `cos^2 theta`,
/// `sin^2 theta` and `0`.
pub fn expected_uncorrected_verification(theta: f64) -> f64 {
    (1.0 + theta.cos().powi(2) + theta.sin().powi(2) + 0.0) / 4.0
}

/// Share of one Alice outcome and how often Bob verified after it.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutcomeStats {
    pub probability: f64,
    pub verification_rate: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TeleportationStats {
    /// Number of shots behind the figures, `None` for exact distributions.
    pub shots: Option<usize>,
    /// Fraction of runs where Bob's verification bit read `0`.
    pub verification_rate: f64,
    /// Fraction of runs where Alice measured `00`, the only outcome needing no correction.
    pub protocol_success_rate: f64,
    /// Keyed by Alice's bit-string.
    pub per_alice_outcome: BTreeMap<String, OutcomeStats>,
}

impl TeleportationStats {
    /// Statistics from sampled shots.
    pub fn from_result(
        result: &SamplerResult,
        alice_register: &str,
        bob_register: &str,
    ) -> Result<Self, CircuitError> {
        let alice = find_register(result.registers(), alice_register)?;
        let bob = find_register(result.registers(), bob_register)?;

        let mut stats = Self::accumulate(alice, bob, result.memory().iter().map(|&m| (m, 1.0)));
        stats.shots = Some(result.shots());
        Ok(stats)
    }

    /// Statistics from an exact outcome distribution of `circuit`.
    pub fn from_distribution(
        distribution: &Distribution,
        circuit: &QuantumCircuit,
        alice_register: &str,
        bob_register: &str,
    ) -> Result<Self, CircuitError> {
        let alice = circuit.register(alice_register)?;
        let bob = circuit.register(bob_register)?;
        Ok(Self::accumulate(alice, bob, distribution.iter()))
    }

    fn accumulate(
        alice: &ClassicalRegister,
        bob: &ClassicalRegister,
        outcomes: impl Iterator<Item = (u64, f64)>,
    ) -> Self {
        // alice outcome -> (weight, verified weight)
        let mut per_outcome: BTreeMap<u64, (f64, f64)> = BTreeMap::new();
        let mut total = 0.0;

        for (outcome, weight) in outcomes {
            let entry = per_outcome.entry(alice.value_of(outcome)).or_insert((0.0, 0.0));
            entry.0 += weight;
            if bob.value_of(outcome) == 0 {
                entry.1 += weight;
            }
            total += weight;
        }

        let ratio = |num: f64, den: f64| if den > 0.0 { num / den } else { 0.0 };
        let verified: f64 = per_outcome.values().map(|(_, v)| v).sum();
        let success = per_outcome.get(&0).map_or(0.0, |(w, _)| *w);

        Self {
            shots: None,
            verification_rate: ratio(verified, total),
            protocol_success_rate: ratio(success, total),
            per_alice_outcome: per_outcome
                .into_iter()
                .map(|(value, (weight, ok))| {
                    (
                        bitstring(value, alice.size),
                        OutcomeStats {
                            probability: ratio(weight, total),
                            verification_rate: ratio(ok, weight),
                        },
                    )
                })
                .collect(),
        }
    }
}

fn find_register<'a>(
    registers: &'a [ClassicalRegister],
    name: &str,
) -> Result<&'a ClassicalRegister, CircuitError> {
    registers
        .iter()
        .find(|r| r.name == name)
        .ok_or_else(|| CircuitError::UnknownRegister(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampler::Sampler;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_prepare_state_vector_is_normalized() {
        let [a, b] = prepare_state_vector(PI / 3.0);
        assert_abs_diff_eq!(a * a + b * b, 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(a, (PI / 6.0).cos(), epsilon = 1e-12);
    }

    #[test]
    fn test_ideal_circuit_layout() {
        let qc = ideal_circuit(PI / 3.0).unwrap();
        assert_eq!(qc.num_qubits(), 3);
        assert_eq!(qc.num_clbits(), 3);
        assert_eq!(qc.register(ALICE_REGISTER).unwrap().size, 2);
        assert_eq!(qc.register(BOB_REGISTER).unwrap().offset, 2);

        let ops = qc.count_ops();
        assert_eq!(ops["measure"], 3);
        assert_eq!(ops["cx"], 2);
        assert_eq!(ops["x"], 1);
        assert_eq!(ops["z"], 1);
        assert_eq!(ops["initialize"], 1);
    }

    #[test]
    fn test_uncorrected_circuit_has_no_conditions() {
        let qc = uncorrected_circuit(PI / 3.0).unwrap();
        assert!(qc.register(UNCORRECTED_BOB_REGISTER).is_ok());
        assert!(!qc.count_ops().contains_key("x"));
        assert!(!qc.count_ops().contains_key("z"));
    }

    #[test]
    fn test_ideal_exact_statistics() {
        let qc = ideal_circuit(PI / 3.0).unwrap();
        let dist = Sampler::new().exact_distribution(&qc).unwrap();
        let stats =
            TeleportationStats::from_distribution(&dist, &qc, ALICE_REGISTER, BOB_REGISTER).unwrap();

        assert_abs_diff_eq!(stats.verification_rate, 1.0, epsilon = 1e-9);
        assert_abs_diff_eq!(stats.protocol_success_rate, 0.25, epsilon = 1e-9);
        assert_eq!(stats.per_alice_outcome.len(), 4);
        for outcome in stats.per_alice_outcome.values() {
            assert_abs_diff_eq!(outcome.probability, 0.25, epsilon = 1e-9);
            assert_abs_diff_eq!(outcome.verification_rate, 1.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_uncorrected_exact_statistics() {
        let theta = PI / 3.0;
        let qc = uncorrected_circuit(theta).unwrap();
        let dist = Sampler::new().exact_distribution(&qc).unwrap();
        let stats = TeleportationStats::from_distribution(
            &dist,
            &qc,
            UNCORRECTED_ALICE_REGISTER,
            UNCORRECTED_BOB_REGISTER,
        )
        .unwrap();

        assert_abs_diff_eq!(
            stats.verification_rate,
            expected_uncorrected_verification(theta),
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(stats.protocol_success_rate, 0.25, epsilon = 1e-9);
        assert_abs_diff_eq!(
            stats.per_alice_outcome["00"].verification_rate,
            1.0,
            epsilon = 1e-9
        );
        assert_abs_diff_eq!(
            stats.per_alice_outcome["11"].verification_rate,
            0.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_sampled_statistics() {
        let qc = ideal_circuit(PI / 3.0).unwrap();
        let result = Sampler::new().with_seed(2025).run(&qc, 4096).unwrap();
        let stats = TeleportationStats::from_result(&result, ALICE_REGISTER, BOB_REGISTER).unwrap();

        assert_eq!(stats.shots, Some(4096));
        assert_abs_diff_eq!(stats.verification_rate, 1.0);
        assert!((stats.protocol_success_rate - 0.25).abs() < 0.05);
    }

    #[test]
    fn test_unknown_register() {
        let result = SamplerResult::new(0, Vec::new(), vec![0]);
        assert!(matches!(
            TeleportationStats::from_result(&result, "alice", "bob"),
            Err(CircuitError::UnknownRegister(_))
        ));
    }
}
