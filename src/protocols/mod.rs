//! Quantum communication protocols built on the circuit layer.

pub mod teleportation;
