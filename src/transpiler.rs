//! Transpiler: logical circuit → device-native circuit
//!
//! Rewrites a circuit so that it only uses the target's basis gates
//! (`rz`, `sx`, `x`, `cx`) on coupled qubit pairs.
//!
//! ## Passes
//! 1. Trivial layout: logical qubit `i` starts on physical qubit `i`
//! 2. Basis translation: every single-qubit gate is decomposed through its
//!    ZYZ Euler angles; `initialize` becomes an explicit state preparation
//! 3. Routing: `cx` between uncoupled qubits is preceded by SWAPs along the
//!    shortest coupling path; each SWAP is three `cx`
//! 4. Optimization (level >= 1): adjacent `rz` merge, adjacent `cx` pairs cancel

use crate::circuit::{Condition, GateKind, Instruction, QuantumCircuit};
use crate::core::utils::{is_zero_angle, normalize_angle};
use crate::error::TranspileError;
use ndarray::{Array2, arr2};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::f64::consts::PI;
use tracing::{debug, info};

/// Angle tolerance used when classifying Euler angles.
const ANGLE_TOLERANCE: f64 = 1e-9;

/// Gates every target must provide.
const REQUIRED_BASIS: [&str; 3] = ["rz", "sx", "cx"];

/// What a device can execute: width, native gates and connectivity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub num_qubits: usize,
    pub basis_gates: Vec<String>,
    /// Undirected pairs of physical qubits that support `cx`.
    pub coupling_map: Vec<(usize, usize)>,
}

impl Target {
    pub fn new(
        num_qubits: usize,
        basis_gates: Vec<String>,
        coupling_map: Vec<(usize, usize)>,
    ) -> Result<Self, TranspileError> {
        for &(a, b) in &coupling_map {
            for qubit in [a, b] {
                if qubit >= num_qubits {
                    return Err(TranspileError::InvalidCouplingMap { qubit, num_qubits });
                }
            }
        }
        Ok(Self {
            num_qubits,
            basis_gates,
            coupling_map,
        })
    }

    /// A linear chain `0-1-...-(n-1)` with the superconducting basis.
    pub fn line(num_qubits: usize) -> Self {
        Self {
            num_qubits,
            basis_gates: default_basis(),
            coupling_map: (1..num_qubits).map(|q| (q - 1, q)).collect(),
        }
    }

    pub fn supports(&self, gate: &str) -> bool {
        self.basis_gates.iter().any(|g| g == gate)
    }

    pub fn are_coupled(&self, a: usize, b: usize) -> bool {
        self.coupling_map
            .iter()
            .any(|&(x, y)| (x, y) == (a, b) || (y, x) == (a, b))
    }

    fn neighbours(&self, qubit: usize) -> impl Iterator<Item = usize> + '_ {
        self.coupling_map.iter().filter_map(move |&(a, b)| {
            if a == qubit {
                Some(b)
            } else if b == qubit {
                Some(a)
            } else {
                None
            }
        })
    }

    /// Shortest path of physical qubits from `from` to `to`, both ends included.
    pub fn shortest_path(&self, from: usize, to: usize) -> Option<Vec<usize>> {
        if from >= self.num_qubits || to >= self.num_qubits {
            return None;
        }
        let mut previous: Vec<Option<usize>> = vec![None; self.num_qubits];
        let mut visited = vec![false; self.num_qubits];
        let mut queue = VecDeque::from([from]);
        visited[from] = true;

        while let Some(current) = queue.pop_front() {
            if current == to {
                let mut path = vec![to];
                let mut node = to;
                while let Some(prev) = previous[node] {
                    path.push(prev);
                    node = prev;
                }
                path.reverse();
                return Some(path);
            }
            for next in self.neighbours(current) {
                if !visited[next] {
                    visited[next] = true;
                    previous[next] = Some(current);
                    queue.push_back(next);
                }
            }
        }
        None
    }

    fn check_basis(&self) -> Result<(), TranspileError> {
        match REQUIRED_BASIS.iter().find(|g| !self.supports(g)) {
            Some(missing) => Err(TranspileError::MissingBasisGate(missing.to_string())),
            None => Ok(()),
        }
    }
}

/// Native gate set of the emulated superconducting devices.
pub fn default_basis() -> Vec<String> {
    ["cx", "id", "rz", "sx", "x"]
        .iter()
        .map(|g| g.to_string())
        .collect()
}

/// ZYZ Euler angles `(theta, phi, lambda)` with `U(theta, phi, lambda) ~ matrix` up to global phase.
pub fn euler_angles(matrix: &Array2<Complex64>) -> (f64, f64, f64) {
    let (m00, m01, m10, m11) = (matrix[[0, 0]], matrix[[0, 1]], matrix[[1, 0]], matrix[[1, 1]]);
    let theta = 2.0 * m10.norm().atan2(m00.norm());

    if m10.norm() < ANGLE_TOLERANCE {
        // Diagonal: only the relative phase matters
        return (0.0, 0.0, m11.arg() - m00.arg());
    }
    if m00.norm() < ANGLE_TOLERANCE {
        // Anti-diagonal
        return (PI, 0.0, (-m01).arg() - m10.arg());
    }

    let global = m00.arg();
    (theta, m10.arg() - global, (-m01).arg() - global)
}

/// Decomposes a single-qubit unitary into `rz`, `sx` and (optionally) `x`.
pub fn decompose_single_qubit(matrix: &Array2<Complex64>, allow_x: bool) -> Vec<GateKind> {
    let (theta, phi, lambda) = euler_angles(matrix);

    let sequence = if theta.abs() < ANGLE_TOLERANCE {
        vec![GateKind::RZ(phi + lambda)]
    } else if allow_x
        && (theta - PI).abs() < ANGLE_TOLERANCE
        && is_zero_angle(lambda - phi - PI, ANGLE_TOLERANCE)
    {
        vec![GateKind::X]
    } else if (theta - PI / 2.0).abs() < ANGLE_TOLERANCE {
        vec![
            GateKind::RZ(lambda - PI / 2.0),
            GateKind::SX,
            GateKind::RZ(phi + PI / 2.0),
        ]
    } else {
        vec![
            GateKind::RZ(lambda),
            GateKind::SX,
            GateKind::RZ(theta + PI),
            GateKind::SX,
            GateKind::RZ(phi + 3.0 * PI),
        ]
    };

    sequence
        .into_iter()
        .filter_map(|kind| match kind {
            GateKind::RZ(angle) if is_zero_angle(angle, ANGLE_TOLERANCE) => None,
            GateKind::RZ(angle) => Some(GateKind::RZ(normalize_angle(angle))),
            other => Some(other),
        })
        .collect()
}

/// Emits native instructions while tracking where each logical qubit lives.
struct Translator<'a> {
    target: &'a Target,
    logical_to_physical: Vec<usize>,
    touched: Vec<bool>,
    output: Vec<Instruction>,
    swaps_inserted: usize,
}

impl<'a> Translator<'a> {
    fn new(target: &'a Target, num_logical: usize) -> Self {
        Self {
            target,
            logical_to_physical: (0..num_logical).collect(),
            touched: vec![false; target.num_qubits],
            output: Vec::new(),
            swaps_inserted: 0,
        }
    }

    fn physical(&self, logical: usize) -> usize {
        self.logical_to_physical[logical]
    }

    fn emit(&mut self, kind: GateKind, qubits: Vec<usize>, condition: Option<Condition>) {
        for &q in &qubits {
            self.touched[q] = true;
        }
        self.output.push(Instruction::Gate {
            kind,
            qubits,
            condition,
        });
    }

    fn emit_single(&mut self, matrix: &Array2<Complex64>, qubit: usize, condition: Option<Condition>) {
        for kind in decompose_single_qubit(matrix, self.target.supports("x")) {
            self.emit(kind, vec![qubit], condition);
        }
    }

    fn translate(&mut self, instruction: &Instruction) -> Result<(), TranspileError> {
        match instruction {
            Instruction::Gate {
                kind,
                qubits,
                condition,
            } => match kind {
                GateKind::CX => self.route_cx(qubits[0], qubits[1], *condition)?,
                GateKind::Swap => {
                    let (a, b) = (qubits[0], qubits[1]);
                    self.route_cx(a, b, *condition)?;
                    self.route_cx(b, a, *condition)?;
                    self.route_cx(a, b, *condition)?;
                }
                GateKind::RZ(angle) => {
                    let qubit = self.physical(qubits[0]);
                    if !is_zero_angle(*angle, ANGLE_TOLERANCE) {
                        self.emit(GateKind::RZ(normalize_angle(*angle)), vec![qubit], *condition);
                    }
                }
                GateKind::SX | GateKind::X if self.target.supports(kind.name()) => {
                    let qubit = self.physical(qubits[0]);
                    self.emit(*kind, vec![qubit], *condition);
                }
                single => {
                    let qubit = self.physical(qubits[0]);
                    self.emit_single(&single.to_gate().matrix, qubit, *condition);
                }
            },
            Instruction::Initialize { qubit, amplitudes } => {
                let physical = self.physical(*qubit);
                if self.touched[physical] {
                    self.output.push(Instruction::Reset { qubit: physical });
                }
                let [a, b] = *amplitudes;
                let preparation = arr2(&[[a, -b.conj()], [b, a.conj()]]);
                self.emit_single(&preparation, physical, None);
                self.touched[physical] = true;
            }
            Instruction::Measure { qubit, clbit } => {
                let physical = self.physical(*qubit);
                self.touched[physical] = true;
                self.output.push(Instruction::Measure {
                    qubit: physical,
                    clbit: *clbit,
                });
            }
            Instruction::Reset { qubit } => {
                let physical = self.physical(*qubit);
                self.touched[physical] = true;
                self.output.push(Instruction::Reset { qubit: physical });
            }
            Instruction::Barrier { qubits } => {
                let qubits = qubits.iter().map(|&q| self.physical(q)).collect();
                self.output.push(Instruction::Barrier { qubits });
            }
        }
        Ok(())
    }

    /// Emits `cx(control, target)` on logical qubits, inserting SWAPs when needed.
    fn route_cx(
        &mut self,
        control: usize,
        target: usize,
        condition: Option<Condition>,
    ) -> Result<(), TranspileError> {
        let mut pc = self.physical(control);
        let pt = self.physical(target);

        if !self.target.are_coupled(pc, pt) {
            let path = self
                .target
                .shortest_path(pc, pt)
                .ok_or(TranspileError::Disconnected { from: pc, to: pt })?;

            // Walk the control along the path until it neighbours the target
            for hop in path[..path.len() - 1].windows(2) {
                self.emit_swap(hop[0], hop[1]);
            }
            pc = path[path.len() - 2];
        }

        self.emit(GateKind::CX, vec![pc, pt], condition);
        Ok(())
    }

    /// Physical SWAP, also exchanging the logical qubits that live there.
    fn emit_swap(&mut self, a: usize, b: usize) {
        self.emit(GateKind::CX, vec![a, b], None);
        self.emit(GateKind::CX, vec![b, a], None);
        self.emit(GateKind::CX, vec![a, b], None);

        for physical in &mut self.logical_to_physical {
            if *physical == a {
                *physical = b;
            } else if *physical == b {
                *physical = a;
            }
        }
        self.swaps_inserted += 1;
    }
}

/// Index of the next live instruction after `from` that touches any of `qubits`.
fn next_touching(ops: &[Option<Instruction>], from: usize, qubits: &[usize]) -> Option<usize> {
    (from + 1..ops.len()).find(|&j| {
        ops[j]
            .as_ref()
            .is_some_and(|op| op.qubits().iter().any(|q| qubits.contains(q)))
    })
}

/// Merges adjacent unconditioned `rz` and cancels adjacent identical unconditioned `cx`.
fn optimize(instructions: Vec<Instruction>) -> Vec<Instruction> {
    let mut ops: Vec<Option<Instruction>> = instructions.into_iter().map(Some).collect();

    let mut changed = true;
    while changed {
        changed = false;
        for i in 0..ops.len() {
            let Some(current) = ops[i].clone() else {
                continue;
            };
            let Instruction::Gate {
                kind,
                qubits,
                condition: None,
            } = current
            else {
                continue;
            };
            let Some(j) = next_touching(&ops, i, &qubits) else {
                continue;
            };
            let Some(Instruction::Gate {
                kind: next_kind,
                qubits: next_qubits,
                condition: None,
            }) = ops[j].clone()
            else {
                continue;
            };

            match (kind, next_kind) {
                (GateKind::RZ(a), GateKind::RZ(b)) if qubits == next_qubits => {
                    let merged = a + b;
                    ops[j] = None;
                    ops[i] = (!is_zero_angle(merged, ANGLE_TOLERANCE)).then(|| Instruction::Gate {
                        kind: GateKind::RZ(normalize_angle(merged)),
                        qubits,
                        condition: None,
                    });
                    changed = true;
                }
                (GateKind::CX, GateKind::CX) if qubits == next_qubits => {
                    ops[i] = None;
                    ops[j] = None;
                    changed = true;
                }
                _ => {}
            }
        }
    }

    ops.into_iter().flatten().collect()
}

/// Rewrites `circuit` for `target`.
///
/// The result has `target.num_qubits` qubits and the same classical registers.
pub fn transpile(
    circuit: &QuantumCircuit,
    target: &Target,
    optimization_level: u8,
) -> Result<QuantumCircuit, TranspileError> {
    target.check_basis()?;
    if circuit.num_qubits() > target.num_qubits {
        return Err(TranspileError::TooManyQubits {
            required: circuit.num_qubits(),
            available: target.num_qubits,
        });
    }

    let mut translator = Translator::new(target, circuit.num_qubits());
    for instruction in circuit.instructions() {
        translator.translate(instruction)?;
    }
    let swaps = translator.swaps_inserted;

    let instructions = if optimization_level >= 1 {
        optimize(translator.output)
    } else {
        translator.output
    };

    let mut transpiled =
        QuantumCircuit::with_name(format!("{}_transpiled", circuit.name()), target.num_qubits);
    transpiled.copy_registers_from(circuit)?;
    for instruction in instructions {
        transpiled.append(instruction)?;
    }

    info!(
        circuit = circuit.name(),
        depth_before = circuit.depth(),
        depth_after = transpiled.depth(),
        swaps,
        optimization_level,
        "transpiled circuit"
    );
    debug!(ops = ?transpiled.count_ops(), "transpiled gate counts");

    Ok(transpiled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Gate;
    use crate::sampler::Sampler;
    use approx::assert_abs_diff_eq;

    fn compose(kinds: &[GateKind]) -> Gate {
        let matrix = kinds.iter().fold(Array2::<Complex64>::eye(2), |acc, k| {
            k.to_gate().matrix.dot(&acc)
        });
        Gate::new(matrix).unwrap()
    }

    #[test]
    fn test_decomposition_reproduces_gates() {
        let gates = [
            GateKind::H,
            GateKind::Y,
            GateKind::Z,
            GateKind::S,
            GateKind::T,
            GateKind::RY(PI / 3.0),
            GateKind::RY(-PI / 3.0),
            GateKind::RX(0.7),
            GateKind::U {
                theta: 2.9,
                phi: -2.0,
                lambda: 1.3,
            },
        ];
        for kind in gates {
            let sequence = decompose_single_qubit(&kind.to_gate().matrix, true);
            assert!(
                compose(&sequence).equivalent_up_to_phase(&kind.to_gate(), 1e-9),
                "decomposition of {kind} is wrong: {sequence:?}"
            );
            assert!(
                sequence
                    .iter()
                    .all(|k| matches!(k, GateKind::RZ(_) | GateKind::SX | GateKind::X))
            );
        }
    }

    #[test]
    fn test_x_uses_native_gate() {
        assert_eq!(
            decompose_single_qubit(&Gate::x().matrix, true),
            vec![GateKind::X]
        );
        let without_x = decompose_single_qubit(&Gate::x().matrix, false);
        assert!(compose(&without_x).equivalent_up_to_phase(&Gate::x(), 1e-9));
    }

    #[test]
    fn test_z_becomes_single_rz() {
        assert_eq!(
            decompose_single_qubit(&Gate::z().matrix, true),
            vec![GateKind::RZ(PI)]
        );
    }

    #[test]
    fn test_shortest_path_on_line() {
        let target = Target::line(5);
        assert_eq!(target.shortest_path(0, 3), Some(vec![0, 1, 2, 3]));
        assert_eq!(target.shortest_path(2, 2), Some(vec![2]));
        assert!(target.are_coupled(3, 2));
        assert!(!target.are_coupled(0, 2));
    }

    #[test]
    fn test_routing_inserts_swaps() {
        let mut qc = QuantumCircuit::new(3);
        let c = qc.add_register("c", 3).unwrap();
        qc.x(0).unwrap();
        qc.cx(0, 2).unwrap();
        qc.measure_register(&[0, 1, 2], &c).unwrap();

        let target = Target::line(3);
        let transpiled = transpile(&qc, &target, 0).unwrap();

        for instruction in transpiled.instructions() {
            if let Instruction::Gate {
                kind: GateKind::CX,
                qubits,
                ..
            } = instruction
            {
                assert!(target.are_coupled(qubits[0], qubits[1]));
            }
        }
        assert_eq!(transpiled.count_ops().get("cx"), Some(&4));

        // Logical outcome is unchanged: |q2 q1 q0> = |101>
        let dist = Sampler::new().exact_distribution(&transpiled).unwrap();
        assert_abs_diff_eq!(dist.probability(0b101), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_optimization_merges_and_cancels() {
        let mut qc = QuantumCircuit::new(2);
        qc.rz(0.3, 0).unwrap().rz(0.4, 0).unwrap();
        qc.cx(0, 1).unwrap().cx(0, 1).unwrap();
        qc.rz(-0.7, 0).unwrap();

        let transpiled = transpile(&qc, &Target::line(2), 1).unwrap();
        assert!(transpiled.instructions().is_empty());
    }

    #[test]
    fn test_barrier_blocks_merging() {
        let mut qc = QuantumCircuit::new(1);
        qc.rz(0.3, 0).unwrap();
        qc.barrier().unwrap();
        qc.rz(0.4, 0).unwrap();

        let transpiled = transpile(&qc, &Target::line(1), 1).unwrap();
        assert_eq!(transpiled.count_ops().get("rz"), Some(&2));
    }

    #[test]
    fn test_conditions_survive_translation() {
        let mut qc = QuantumCircuit::new(2);
        let c = qc.add_register("c", 1).unwrap();
        qc.if_test(Condition::new(c.bit(0).unwrap(), true), |body| {
            body.h(1)?;
            Ok(())
        })
        .unwrap();

        let transpiled = transpile(&qc, &Target::line(2), 1).unwrap();
        assert!(!transpiled.instructions().is_empty());
        assert!(transpiled.instructions().iter().all(|i| matches!(
            i,
            Instruction::Gate {
                condition: Some(_),
                ..
            }
        )));
    }

    #[test]
    fn test_rejects_wide_circuit_and_missing_basis() {
        let qc = QuantumCircuit::new(4);
        assert!(matches!(
            transpile(&qc, &Target::line(3), 1),
            Err(TranspileError::TooManyQubits {
                required: 4,
                available: 3
            })
        ));

        let target = Target::new(3, vec!["rz".into(), "cx".into()], vec![(0, 1)]).unwrap();
        assert!(matches!(
            transpile(&QuantumCircuit::new(2), &target, 1),
            Err(TranspileError::MissingBasisGate(g)) if g == "sx"
        ));
    }

    #[test]
    fn test_invalid_coupling_map() {
        assert!(matches!(
            Target::new(2, default_basis(), vec![(0, 2)]),
            Err(TranspileError::InvalidCouplingMap { qubit: 2, .. })
        ));
    }
}
