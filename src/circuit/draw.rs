//! Plain-text circuit diagrams.

use super::{GateKind, Instruction, QuantumCircuit};

const QUANTUM_WIRE: char = '─';
const CLASSICAL_WIRE: char = '═';

/// One diagram column: an optional label per row and the rows joined by a vertical line.
struct Column {
    cells: Vec<Option<String>>,
    span: Option<(usize, usize)>,
}

impl Column {
    fn new(rows: usize) -> Self {
        Self {
            cells: vec![None; rows],
            span: None,
        }
    }

    fn connect(&mut self, rows: &[usize]) {
        if let (Some(&lo), Some(&hi)) = (rows.iter().min(), rows.iter().max()) {
            if hi > lo {
                self.span = Some((lo, hi));
            }
        }
    }

    fn width(&self) -> usize {
        self.cells
            .iter()
            .flatten()
            .map(|c| c.chars().count())
            .max()
            .unwrap_or(1)
            + 2
    }
}

pub(super) fn render(circuit: &QuantumCircuit) -> String {
    let num_qubits = circuit.num_qubits();
    let rows = num_qubits + circuit.registers().len();

    // Row of the register owning each classical bit, plus the bit's index inside it
    let clbit_row = |clbit: usize| -> (usize, usize) {
        circuit
            .registers()
            .iter()
            .enumerate()
            .find(|(_, r)| r.bits().contains(&clbit))
            .map(|(i, r)| (num_qubits + i, clbit - r.offset))
            .unwrap_or((num_qubits, clbit))
    };

    let columns: Vec<Column> = circuit
        .instructions()
        .iter()
        .map(|instruction| {
            let mut column = Column::new(rows);
            match instruction {
                Instruction::Gate {
                    kind,
                    qubits,
                    condition,
                } => {
                    let mut touched = qubits.clone();
                    match kind {
                        GateKind::CX => {
                            column.cells[qubits[0]] = Some("■".to_string());
                            column.cells[qubits[1]] = Some("⊕".to_string());
                        }
                        GateKind::Swap => {
                            column.cells[qubits[0]] = Some("×".to_string());
                            column.cells[qubits[1]] = Some("×".to_string());
                        }
                        single => column.cells[qubits[0]] = Some(single.label()),
                    }
                    if let Some(cond) = condition {
                        let (row, index) = clbit_row(cond.clbit);
                        column.cells[row] = Some(format!("[{index}]={}", u8::from(cond.value)));
                        touched.push(row);
                    }
                    column.connect(&touched);
                }
                Instruction::Initialize { qubit, amplitudes } => {
                    let [a, b] = amplitudes;
                    let label = if a.im == 0.0 && b.im == 0.0 {
                        format!("ψ[{:.3},{:.3}]", a.re, b.re)
                    } else {
                        format!("ψ[{a:.3},{b:.3}]")
                    };
                    column.cells[*qubit] = Some(label);
                }
                Instruction::Measure { qubit, clbit } => {
                    let (row, index) = clbit_row(*clbit);
                    column.cells[*qubit] = Some("M".to_string());
                    column.cells[row] = Some(format!("{index}"));
                    column.connect(&[*qubit, row]);
                }
                Instruction::Reset { qubit } => {
                    column.cells[*qubit] = Some("|0>".to_string());
                }
                Instruction::Barrier { qubits } => {
                    for &q in qubits {
                        column.cells[q] = Some("░".to_string());
                    }
                }
            }
            column
        })
        .collect();

    let labels: Vec<String> = (0..num_qubits)
        .map(|q| format!("q_{q}: "))
        .chain(
            circuit
                .registers()
                .iter()
                .map(|r| format!("{}: {}/", r.name, r.size)),
        )
        .collect();
    let label_width = labels.iter().map(|l| l.chars().count()).max().unwrap_or(0);

    let mut out = String::new();
    for (row, label) in labels.iter().enumerate() {
        let wire = if row < num_qubits {
            QUANTUM_WIRE
        } else {
            CLASSICAL_WIRE
        };

        out.push_str(&format!("{label:>label_width$}"));
        out.push(wire);
        for column in &columns {
            let width = column.width();
            let content = match &column.cells[row] {
                Some(cell) => cell.clone(),
                None => match column.span {
                    Some((lo, hi)) if row > lo && row < hi => {
                        let crossing = if row < num_qubits { "┼" } else { "╪" };
                        crossing.to_string()
                    }
                    _ => String::new(),
                },
            };
            out.push_str(&pad_center(&content, width, wire));
        }
        out.push(wire);
        out.push('\n');
    }
    out
}

fn pad_center(content: &str, width: usize, fill: char) -> String {
    let len = content.chars().count();
    let total = width.saturating_sub(len);
    let left = total / 2;
    let right = total - left;

    let mut cell = String::with_capacity(width * 3);
    cell.extend(std::iter::repeat_n(fill, left));
    cell.push_str(content);
    cell.extend(std::iter::repeat_n(fill, right));
    cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::Condition;

    #[test]
    fn test_draw_has_one_line_per_wire() {
        let mut qc = QuantumCircuit::new(3);
        let alice = qc.add_register("alice_meas", 2).unwrap();
        qc.add_register("bob_verif", 1).unwrap();
        qc.h(1).unwrap().cx(1, 2).unwrap();
        qc.measure_register(&[0, 1], &alice).unwrap();

        let diagram = qc.draw();
        let lines: Vec<&str> = diagram.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].trim_start().starts_with("q_0:"));
        assert!(lines[3].contains("alice_meas: 2/"));
        assert!(lines[1].contains('■'));
        assert!(lines[2].contains('⊕'));
    }

    #[test]
    fn test_draw_conditioned_gate_marks_register() {
        let mut qc = QuantumCircuit::new(2);
        let c = qc.add_register("c", 2).unwrap();
        qc.if_test(Condition::new(c.bit(1).unwrap(), true), |body| {
            body.x(1)?;
            Ok(())
        })
        .unwrap();

        let diagram = qc.draw();
        assert!(diagram.contains("[1]=1"));
        assert!(diagram.lines().nth(1).unwrap().contains('X'));
    }

    #[test]
    fn test_pad_center() {
        assert_eq!(pad_center("H", 5, '─'), "──H──");
        assert_eq!(pad_center("", 3, '═'), "═══");
    }
}
