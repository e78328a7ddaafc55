use proptest::prelude::*;
use qteleport::config::default_devices;
use qteleport::protocols::teleportation;
use qteleport::transpiler::{Target, default_basis};
use qteleport::{GateKind, Instruction, QuantumCircuit, Sampler, transpile};
use std::f64::consts::PI;

fn heavy_hex() -> Target {
    let device = default_devices()
        .into_iter()
        .find(|d| d.name == "emulated_heavyhex_7q")
        .unwrap();
    Target::new(device.num_qubits, device.basis_gates, device.coupling_map).unwrap()
}

fn assert_native(circuit: &QuantumCircuit, target: &Target) {
    for instruction in circuit.instructions() {
        match instruction {
            Instruction::Gate { kind, qubits, .. } => {
                assert!(target.supports(kind.name()), "{} is not native", kind.name());
                if qubits.len() == 2 {
                    assert!(target.are_coupled(qubits[0], qubits[1]));
                }
            }
            Instruction::Initialize { .. } => panic!("initialize survived transpilation"),
            _ => {}
        }
    }
}

fn assert_same_distribution(a: &QuantumCircuit, b: &QuantumCircuit) {
    let sampler = Sampler::new();
    let da = sampler.exact_distribution(a).unwrap();
    let db = sampler.exact_distribution(b).unwrap();
    for outcome in 0..(1u64 << a.num_clbits()) {
        assert!(
            (da.probability(outcome) - db.probability(outcome)).abs() < 1e-9,
            "outcome {outcome:b}: {} vs {}",
            da.probability(outcome),
            db.probability(outcome)
        );
    }
}

#[test]
fn ideal_teleportation_survives_transpilation() {
    let logical = teleportation::ideal_circuit(PI / 3.0).unwrap();
    for level in [0, 1] {
        for target in [heavy_hex(), Target::line(3)] {
            let native = transpile(&logical, &target, level).unwrap();
            assert_eq!(native.num_qubits(), target.num_qubits);
            assert_eq!(native.registers(), logical.registers());
            assert_native(&native, &target);
            assert_same_distribution(&logical, &native);
        }
    }
}

#[test]
fn reinitializing_a_used_qubit_resets_it_first() {
    let mut logical = QuantumCircuit::new(1);
    let c = logical.add_register("c", 2).unwrap();
    logical.x(0).unwrap();
    logical.measure(0, c.bit(0).unwrap()).unwrap();
    logical.initialize([0.6, 0.8], 0).unwrap();
    logical.measure(0, c.bit(1).unwrap()).unwrap();

    for level in [0, 1] {
        let native = transpile(&logical, &Target::line(3), level).unwrap();
        assert_eq!(native.count_ops()["reset"], 1);
        assert_native(&native, &Target::line(3));
        assert_same_distribution(&logical, &native);
    }

    let dist = Sampler::new().exact_distribution(&logical).unwrap();
    assert!((dist.probability(0b01) - 0.36).abs() < 1e-9);
    assert!((dist.probability(0b11) - 0.64).abs() < 1e-9);
}

#[test]
fn initializing_a_fresh_qubit_needs_no_reset() {
    let mut logical = QuantumCircuit::new(1);
    let c = logical.add_register("c", 1).unwrap();
    logical.initialize([0.6, 0.8], 0).unwrap();
    logical.measure(0, c.bit(0).unwrap()).unwrap();

    let native = transpile(&logical, &Target::line(3), 1).unwrap();
    assert!(!native.count_ops().contains_key("reset"));
    assert_same_distribution(&logical, &native);
}

#[test]
fn optimization_never_grows_the_circuit() {
    let logical = teleportation::ideal_circuit(0.4).unwrap();
    let plain = transpile(&logical, &heavy_hex(), 0).unwrap();
    let optimized = transpile(&logical, &heavy_hex(), 1).unwrap();
    assert!(optimized.instructions().len() <= plain.instructions().len());
}

#[test]
fn routing_through_a_ring() {
    let target = Target::new(4, default_basis(), vec![(0, 1), (1, 2), (2, 3), (3, 0)]).unwrap();
    let mut qc = QuantumCircuit::new(4);
    let c = qc.add_register("c", 4).unwrap();
    qc.h(0).unwrap().cx(0, 2).unwrap().cx(1, 3).unwrap().ry(0.3, 3).unwrap();
    qc.measure_register(&[0, 1, 2, 3], &c).unwrap();

    let native = transpile(&qc, &target, 1).unwrap();
    assert_native(&native, &target);
    assert_same_distribution(&qc, &native);
}

fn single_qubit_gate() -> impl Strategy<Value = GateKind> {
    prop_oneof![
        Just(GateKind::H),
        Just(GateKind::X),
        Just(GateKind::Y),
        Just(GateKind::Z),
        Just(GateKind::S),
        Just(GateKind::T),
        Just(GateKind::SX),
        (-PI..PI).prop_map(GateKind::RX),
        (-PI..PI).prop_map(GateKind::RY),
        (-PI..PI).prop_map(GateKind::RZ),
        (0.0..PI, -PI..PI, -PI..PI).prop_map(|(theta, phi, lambda)| GateKind::U {
            theta,
            phi,
            lambda
        }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn random_circuits_keep_their_distribution(
        layers in prop::collection::vec((single_qubit_gate(), 0usize..3, 0usize..3, 0usize..3), 1..8)
    ) {
        let mut qc = QuantumCircuit::new(3);
        let c = qc.add_register("c", 3).unwrap();
        for (kind, q, control, target) in layers {
            qc.gate(kind, &[q]).unwrap();
            if control != target {
                qc.cx(control, target).unwrap();
            }
        }
        qc.measure_register(&[0, 1, 2], &c).unwrap();

        let target = Target::line(3);
        let native = transpile(&qc, &target, 1).unwrap();
        assert_native(&native, &target);
        assert_same_distribution(&qc, &native);
    }
}
