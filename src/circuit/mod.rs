//! Quantum circuits with named classical registers and classically conditioned gates.
//!
//! Qubits and classical bits are addressed by flat indices. Registers are
//! contiguous slices of the classical bits, allocated in the order they are
//! added. Bit-strings render the highest classical bit first.

mod draw;

use crate::core::Gate;
use crate::error::CircuitError;
use num_complex::Complex64;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;

/// Maximum number of classical bits, so a shot outcome fits in a `u64`.
pub const MAX_CLBITS: usize = 64;

/// Gates understood by the simulator and the transpiler.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum GateKind {
    I,
    X,
    Y,
    Z,
    H,
    S,
    T,
    SX,
    RX(f64),
    RY(f64),
    RZ(f64),
    U { theta: f64, phi: f64, lambda: f64 },
    CX,
    Swap,
}

impl GateKind {
    /// Lower-case mnemonic, as used in basis-gate lists.
    pub fn name(&self) -> &'static str {
        match self {
            GateKind::I => "id",
            GateKind::X => "x",
            GateKind::Y => "y",
            GateKind::Z => "z",
            GateKind::H => "h",
            GateKind::S => "s",
            GateKind::T => "t",
            GateKind::SX => "sx",
            GateKind::RX(_) => "rx",
            GateKind::RY(_) => "ry",
            GateKind::RZ(_) => "rz",
            GateKind::U { .. } => "u",
            GateKind::CX => "cx",
            GateKind::Swap => "swap",
        }
    }

    pub fn num_qubits(&self) -> usize {
        match self {
            GateKind::CX | GateKind::Swap => 2,
            _ => 1,
        }
    }

    pub fn params(&self) -> Vec<f64> {
        match *self {
            GateKind::RX(theta) | GateKind::RY(theta) | GateKind::RZ(theta) => vec![theta],
            GateKind::U { theta, phi, lambda } => vec![theta, phi, lambda],
            _ => Vec::new(),
        }
    }

    /// Unitary of the gate. Two-qubit gates use qubit order `[control, target]`.
    pub fn to_gate(&self) -> Gate {
        match *self {
            GateKind::I => Gate::i(),
            GateKind::X => Gate::x(),
            GateKind::Y => Gate::y(),
            GateKind::Z => Gate::z(),
            GateKind::H => Gate::h(),
            GateKind::S => Gate::s(),
            GateKind::T => Gate::t_gate(),
            GateKind::SX => Gate::sx(),
            GateKind::RX(theta) => Gate::rx(theta),
            GateKind::RY(theta) => Gate::ry(theta),
            GateKind::RZ(theta) => Gate::rz(theta),
            GateKind::U { theta, phi, lambda } => Gate::u(theta, phi, lambda),
            GateKind::CX => Gate::cnot(),
            GateKind::Swap => Gate::swap(),
        }
    }

    /// Short label for diagrams, e.g. `Ry(-1.047)`.
    pub fn label(&self) -> String {
        let params = self.params();
        let name = match self {
            GateKind::SX => "√X".to_string(),
            GateKind::U { .. } => "U".to_string(),
            other => {
                let mut chars = other.name().chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
        };
        if params.is_empty() {
            name
        } else {
            let rendered: Vec<String> = params.iter().map(|p| format!("{p:.3}")).collect();
            format!("{name}({})", rendered.join(","))
        }
    }
}

impl fmt::Display for GateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// A contiguous, named slice of the circuit's classical bits.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ClassicalRegister {
    pub name: String,
    pub size: usize,
    /// Index of the register's bit 0 among all classical bits.
    pub offset: usize,
}

impl ClassicalRegister {
    /// Flat classical-bit index of `index` within this register.
    pub fn bit(&self, index: usize) -> Result<usize, CircuitError> {
        if index >= self.size {
            return Err(CircuitError::RegisterIndexOutOfRange {
                register: self.name.clone(),
                index,
                size: self.size,
            });
        }
        Ok(self.offset + index)
    }

    pub fn bits(&self) -> Range<usize> {
        self.offset..self.offset + self.size
    }

    /// Extracts this register's value from a packed shot outcome.
    pub fn value_of(&self, outcome: u64) -> u64 {
        let mask = if self.size >= 64 {
            u64::MAX
        } else {
            (1u64 << self.size) - 1
        };
        (outcome >> self.offset) & mask
    }
}

/// Gate guard: execute only if classical bit `clbit` currently equals `value`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Condition {
    pub clbit: usize,
    pub value: bool,
}

impl Condition {
    pub fn new(clbit: usize, value: bool) -> Self {
        Self { clbit, value }
    }

    pub fn is_satisfied(&self, clbits: u64) -> bool {
        ((clbits >> self.clbit) & 1 == 1) == self.value
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instruction {
    Gate {
        kind: GateKind,
        qubits: Vec<usize>,
        condition: Option<Condition>,
    },
    /// Reset `qubit` and prepare `a|0> + b|1>`.
    Initialize {
        qubit: usize,
        amplitudes: [Complex64; 2],
    },
    Measure {
        qubit: usize,
        clbit: usize,
    },
    Reset {
        qubit: usize,
    },
    Barrier {
        qubits: Vec<usize>,
    },
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Gate { kind, .. } => kind.name(),
            Instruction::Initialize { .. } => "initialize",
            Instruction::Measure { .. } => "measure",
            Instruction::Reset { .. } => "reset",
            Instruction::Barrier { .. } => "barrier",
        }
    }

    pub fn qubits(&self) -> Vec<usize> {
        match self {
            Instruction::Gate { qubits, .. } | Instruction::Barrier { qubits } => qubits.clone(),
            Instruction::Initialize { qubit, .. }
            | Instruction::Measure { qubit, .. }
            | Instruction::Reset { qubit } => vec![*qubit],
        }
    }

    /// Classical bits read or written by the instruction.
    pub fn clbits(&self) -> Vec<usize> {
        match self {
            Instruction::Measure { clbit, .. } => vec![*clbit],
            Instruction::Gate {
                condition: Some(cond),
                ..
            } => vec![cond.clbit],
            _ => Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct QuantumCircuit {
    name: String,
    num_qubits: usize,
    registers: Vec<ClassicalRegister>,
    instructions: Vec<Instruction>,
}

impl QuantumCircuit {
    pub fn new(num_qubits: usize) -> Self {
        Self::with_name("circuit", num_qubits)
    }

    pub fn with_name(name: impl Into<String>, num_qubits: usize) -> Self {
        Self {
            name: name.into(),
            num_qubits,
            registers: Vec::new(),
            instructions: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    pub fn num_clbits(&self) -> usize {
        self.registers.iter().map(|r| r.size).sum()
    }

    pub fn registers(&self) -> &[ClassicalRegister] {
        &self.registers
    }

    pub fn register(&self, name: &str) -> Result<&ClassicalRegister, CircuitError> {
        self.registers
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| CircuitError::UnknownRegister(name.to_string()))
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    /// Appends a classical register after the existing ones.
    pub fn add_register(
        &mut self,
        name: impl Into<String>,
        size: usize,
    ) -> Result<ClassicalRegister, CircuitError> {
        let name = name.into();
        if self.registers.iter().any(|r| r.name == name) {
            return Err(CircuitError::DuplicateRegister(name));
        }
        let offset = self.num_clbits();
        if offset + size > MAX_CLBITS {
            return Err(CircuitError::TooManyClbits(offset + size));
        }

        let register = ClassicalRegister { name, size, offset };
        self.registers.push(register.clone());
        Ok(register)
    }

    /// Copies the classical registers of `other`, keeping names and offsets.
    pub fn copy_registers_from(&mut self, other: &QuantumCircuit) -> Result<(), CircuitError> {
        for register in &other.registers {
            self.add_register(register.name.clone(), register.size)?;
        }
        Ok(())
    }

    fn check_qubit(&self, qubit: usize) -> Result<(), CircuitError> {
        if qubit >= self.num_qubits {
            return Err(CircuitError::QubitOutOfRange {
                qubit,
                num_qubits: self.num_qubits,
            });
        }
        Ok(())
    }

    fn check_clbit(&self, clbit: usize) -> Result<(), CircuitError> {
        let num_clbits = self.num_clbits();
        if clbit >= num_clbits {
            return Err(CircuitError::ClbitOutOfRange { clbit, num_clbits });
        }
        Ok(())
    }

    /// Validates and appends any instruction.
    pub fn append(&mut self, instruction: Instruction) -> Result<&mut Self, CircuitError> {
        match &instruction {
            Instruction::Gate {
                kind,
                qubits,
                condition,
            } => {
                if qubits.len() != kind.num_qubits() {
                    return Err(CircuitError::ArityMismatch {
                        gate: kind.name().to_string(),
                        expected: kind.num_qubits(),
                        got: qubits.len(),
                    });
                }
                if let Some(bad) = kind.params().into_iter().find(|p| !p.is_finite()) {
                    return Err(CircuitError::InvalidParameter(bad));
                }
                if let Some(cond) = condition {
                    self.check_clbit(cond.clbit)?;
                }
                self.check_distinct(qubits)?;
            }
            Instruction::Initialize { qubit, amplitudes } => {
                self.check_qubit(*qubit)?;
                let norm_sqr: f64 = amplitudes.iter().map(|a| a.norm_sqr()).sum();
                if !norm_sqr.is_finite() || (norm_sqr - 1.0).abs() > 1e-10 {
                    return Err(CircuitError::InvalidAmplitudes(norm_sqr));
                }
            }
            Instruction::Measure { qubit, clbit } => {
                self.check_qubit(*qubit)?;
                self.check_clbit(*clbit)?;
            }
            Instruction::Reset { qubit } => self.check_qubit(*qubit)?,
            Instruction::Barrier { qubits } => self.check_distinct(qubits)?,
        }

        self.instructions.push(instruction);
        Ok(self)
    }

    fn check_distinct(&self, qubits: &[usize]) -> Result<(), CircuitError> {
        for &q in qubits {
            self.check_qubit(q)?;
        }
        if let Some(dup) = crate::core::utils::find_duplicate(qubits) {
            return Err(CircuitError::DuplicateQubit(dup));
        }
        Ok(())
    }

    /// Appends an unconditioned gate.
    pub fn gate(&mut self, kind: GateKind, qubits: &[usize]) -> Result<&mut Self, CircuitError> {
        self.append(Instruction::Gate {
            kind,
            qubits: qubits.to_vec(),
            condition: None,
        })
    }

    pub fn x(&mut self, qubit: usize) -> Result<&mut Self, CircuitError> {
        self.gate(GateKind::X, &[qubit])
    }

    pub fn y(&mut self, qubit: usize) -> Result<&mut Self, CircuitError> {
        self.gate(GateKind::Y, &[qubit])
    }

    pub fn z(&mut self, qubit: usize) -> Result<&mut Self, CircuitError> {
        self.gate(GateKind::Z, &[qubit])
    }

    pub fn h(&mut self, qubit: usize) -> Result<&mut Self, CircuitError> {
        self.gate(GateKind::H, &[qubit])
    }

    pub fn s(&mut self, qubit: usize) -> Result<&mut Self, CircuitError> {
        self.gate(GateKind::S, &[qubit])
    }

    pub fn sx(&mut self, qubit: usize) -> Result<&mut Self, CircuitError> {
        self.gate(GateKind::SX, &[qubit])
    }

    pub fn rx(&mut self, theta: f64, qubit: usize) -> Result<&mut Self, CircuitError> {
        self.gate(GateKind::RX(theta), &[qubit])
    }

    pub fn ry(&mut self, theta: f64, qubit: usize) -> Result<&mut Self, CircuitError> {
        self.gate(GateKind::RY(theta), &[qubit])
    }

    pub fn rz(&mut self, theta: f64, qubit: usize) -> Result<&mut Self, CircuitError> {
        self.gate(GateKind::RZ(theta), &[qubit])
    }

    pub fn cx(&mut self, control: usize, target: usize) -> Result<&mut Self, CircuitError> {
        self.gate(GateKind::CX, &[control, target])
    }

    pub fn swap(&mut self, a: usize, b: usize) -> Result<&mut Self, CircuitError> {
        self.gate(GateKind::Swap, &[a, b])
    }

    /// Prepares `qubit` in the state given by two real amplitudes.
    pub fn initialize(&mut self, amplitudes: [f64; 2], qubit: usize) -> Result<&mut Self, CircuitError> {
        self.append(Instruction::Initialize {
            qubit,
            amplitudes: amplitudes.map(|a| Complex64::new(a, 0.0)),
        })
    }

    pub fn reset(&mut self, qubit: usize) -> Result<&mut Self, CircuitError> {
        self.append(Instruction::Reset { qubit })
    }

    /// Barrier across every qubit.
    pub fn barrier(&mut self) -> Result<&mut Self, CircuitError> {
        let qubits = (0..self.num_qubits).collect();
        self.append(Instruction::Barrier { qubits })
    }

    pub fn measure(&mut self, qubit: usize, clbit: usize) -> Result<&mut Self, CircuitError> {
        self.append(Instruction::Measure { qubit, clbit })
    }

    /// Measures `qubits[i]` into bit `i` of `register`.
    pub fn measure_register(
        &mut self,
        qubits: &[usize],
        register: &ClassicalRegister,
    ) -> Result<&mut Self, CircuitError> {
        if qubits.len() != register.size {
            return Err(CircuitError::RegisterSizeMismatch {
                qubits: qubits.len(),
                register_size: register.size,
            });
        }
        for (i, &qubit) in qubits.iter().enumerate() {
            self.measure(qubit, register.bit(i)?)?;
        }
        Ok(self)
    }

    /// Runs `body` and guards every gate it appends with `condition`.
    ///
    /// The body may only append unconditioned gates; measurements, resets and
    /// barriers inside a conditional block are rejected and the circuit is left unchanged.
    pub fn if_test<F>(&mut self, condition: Condition, body: F) -> Result<&mut Self, CircuitError>
    where
        F: FnOnce(&mut QuantumCircuit) -> Result<(), CircuitError>,
    {
        self.check_clbit(condition.clbit)?;
        let start = self.instructions.len();

        if let Err(err) = body(self) {
            self.instructions.truncate(start);
            return Err(err);
        }

        let rejected = self.instructions[start..]
            .iter()
            .find(|i| !matches!(i, Instruction::Gate { condition: None, .. }))
            .map(|i| i.name().to_string());
        if let Some(name) = rejected {
            self.instructions.truncate(start);
            return Err(CircuitError::UnsupportedConditional(name));
        }

        for instruction in &mut self.instructions[start..] {
            if let Instruction::Gate { condition: slot, .. } = instruction {
                *slot = Some(condition);
            }
        }
        Ok(self)
    }

    /// Number of layers, ignoring barriers. Conditioned gates also wait on their classical bit.
    pub fn depth(&self) -> usize {
        let mut qubit_depth = vec![0usize; self.num_qubits];
        let mut clbit_depth = vec![0usize; self.num_clbits()];

        for instruction in &self.instructions {
            if matches!(instruction, Instruction::Barrier { .. }) {
                continue;
            }
            let qubits = instruction.qubits();
            let clbits = instruction.clbits();

            let level = qubits
                .iter()
                .map(|&q| qubit_depth[q])
                .chain(clbits.iter().map(|&c| clbit_depth[c]))
                .max()
                .unwrap_or(0)
                + 1;

            for q in qubits {
                qubit_depth[q] = level;
            }
            for c in clbits {
                clbit_depth[c] = level;
            }
        }

        qubit_depth
            .into_iter()
            .chain(clbit_depth)
            .max()
            .unwrap_or(0)
    }

    /// Occurrences of each instruction name.
    pub fn count_ops(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for instruction in &self.instructions {
            *counts.entry(instruction.name().to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Qubits touched by at least one non-barrier instruction, in ascending order.
    pub fn active_qubits(&self) -> Vec<usize> {
        let mut used = vec![false; self.num_qubits];
        for instruction in &self.instructions {
            if matches!(instruction, Instruction::Barrier { .. }) {
                continue;
            }
            for q in instruction.qubits() {
                used[q] = true;
            }
        }
        used.iter()
            .enumerate()
            .filter_map(|(q, &u)| u.then_some(q))
            .collect()
    }

    /// Text diagram, one wire per qubit and one per classical register.
    pub fn draw(&self) -> String {
        draw::render(self)
    }
}

impl fmt::Display for QuantumCircuit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.draw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bell() -> QuantumCircuit {
        let mut qc = QuantumCircuit::new(2);
        let c = qc.add_register("c", 2).unwrap();
        qc.h(0).unwrap().cx(0, 1).unwrap();
        qc.measure_register(&[0, 1], &c).unwrap();
        qc
    }

    #[test]
    fn test_register_offsets() {
        let mut qc = QuantumCircuit::new(3);
        let a = qc.add_register("alice", 2).unwrap();
        let b = qc.add_register("bob", 1).unwrap();
        assert_eq!(a.offset, 0);
        assert_eq!(b.offset, 2);
        assert_eq!(b.bit(0).unwrap(), 2);
        assert_eq!(qc.num_clbits(), 3);
        assert!(matches!(
            b.bit(1),
            Err(CircuitError::RegisterIndexOutOfRange { index: 1, .. })
        ));
    }

    #[test]
    fn test_duplicate_register_rejected() {
        let mut qc = QuantumCircuit::new(1);
        qc.add_register("c", 1).unwrap();
        assert!(matches!(
            qc.add_register("c", 2),
            Err(CircuitError::DuplicateRegister(_))
        ));
    }

    #[test]
    fn test_register_value_extraction() {
        let reg = ClassicalRegister {
            name: "alice".into(),
            size: 2,
            offset: 1,
        };
        // clbits: b3 b2 b1 b0 = 0 1 1 0
        assert_eq!(reg.value_of(0b0110), 0b11);
        assert_eq!(reg.value_of(0b1001), 0b00);
    }

    #[test]
    fn test_gate_validation() {
        let mut qc = QuantumCircuit::new(2);
        assert!(matches!(
            qc.x(2),
            Err(CircuitError::QubitOutOfRange { qubit: 2, .. })
        ));
        assert!(matches!(qc.cx(1, 1), Err(CircuitError::DuplicateQubit(1))));
        assert!(matches!(
            qc.ry(f64::NAN, 0),
            Err(CircuitError::InvalidParameter(_))
        ));
        assert!(matches!(
            qc.measure(0, 0),
            Err(CircuitError::ClbitOutOfRange { .. })
        ));
        assert!(qc.instructions().is_empty());
    }

    #[test]
    fn test_initialize_requires_normalized_amplitudes() {
        let mut qc = QuantumCircuit::new(1);
        assert!(matches!(
            qc.initialize([1.0, 1.0], 0),
            Err(CircuitError::InvalidAmplitudes(_))
        ));
        assert!(qc.initialize([0.6, 0.8], 0).is_ok());
    }

    #[test]
    fn test_if_test_conditions_body() {
        let mut qc = QuantumCircuit::new(2);
        let c = qc.add_register("c", 1).unwrap();
        qc.measure(0, c.bit(0).unwrap()).unwrap();
        qc.if_test(Condition::new(c.bit(0).unwrap(), true), |body| {
            body.x(1)?;
            body.z(1)?;
            Ok(())
        })
        .unwrap();

        let conditioned = qc
            .instructions()
            .iter()
            .filter(|i| {
                matches!(
                    i,
                    Instruction::Gate {
                        condition: Some(_),
                        ..
                    }
                )
            })
            .count();
        assert_eq!(conditioned, 2);
    }

    #[test]
    fn test_if_test_rejects_measurement_in_body() {
        let mut qc = QuantumCircuit::new(2);
        let c = qc.add_register("c", 2).unwrap();
        let result = qc.if_test(Condition::new(c.bit(0).unwrap(), true), |body| {
            body.x(1)?;
            body.measure(1, 1)?;
            Ok(())
        });
        assert!(matches!(
            result,
            Err(CircuitError::UnsupportedConditional(_))
        ));
        assert!(qc.instructions().is_empty());
    }

    #[test]
    fn test_condition_evaluation() {
        let cond = Condition::new(1, true);
        assert!(cond.is_satisfied(0b010));
        assert!(!cond.is_satisfied(0b101));
        assert!(Condition::new(0, false).is_satisfied(0b110));
    }

    #[test]
    fn test_depth_and_count_ops() {
        let qc = bell();
        assert_eq!(qc.depth(), 3);
        let ops = qc.count_ops();
        assert_eq!(ops.get("h"), Some(&1));
        assert_eq!(ops.get("cx"), Some(&1));
        assert_eq!(ops.get("measure"), Some(&2));
    }

    #[test]
    fn test_active_qubits_ignores_barriers() {
        let mut qc = QuantumCircuit::new(4);
        qc.barrier().unwrap();
        qc.x(2).unwrap();
        assert_eq!(qc.active_qubits(), vec![2]);
    }

    #[test]
    fn test_gate_labels() {
        assert_eq!(GateKind::H.label(), "H");
        assert_eq!(GateKind::CX.label(), "Cx");
        assert_eq!(GateKind::RY(-1.0).label(), "Ry(-1.000)");
    }
}
