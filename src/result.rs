//! Measurement outcomes: per-shot memory, counts and exact distributions.
//!
//! Outcomes are packed into a `u64` with classical bit `k` at bit `k`, and
//! rendered as bit-strings with the highest classical bit first.

use crate::circuit::ClassicalRegister;
use crate::error::CircuitError;
use serde::Serialize;
use std::collections::BTreeMap;

/// Formats `value` as a `width`-character bit-string, most significant bit first.
pub fn bitstring(value: u64, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    format!("{value:0width$b}")
}

/// Mapping from bit-string outcome to number of occurrences.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Counts(BTreeMap<String, usize>);

impl Counts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, outcome: impl Into<String>, count: usize) {
        *self.0.entry(outcome.into()).or_insert(0) += count;
    }

    /// Occurrences of `outcome`, zero when never observed.
    pub fn get(&self, outcome: &str) -> usize {
        self.0.get(outcome).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.0.iter().map(|(k, &v)| (k.as_str(), v))
    }

    /// Relative frequency of each outcome. Empty when no shots were recorded.
    pub fn probabilities(&self) -> BTreeMap<String, f64> {
        let total = self.total();
        if total == 0 {
            return BTreeMap::new();
        }
        self.0
            .iter()
            .map(|(k, &v)| (k.clone(), v as f64 / total as f64))
            .collect()
    }

    /// Rescales probabilities to integer counts, truncating like `int(p * shots)`.
    pub fn from_probabilities(probabilities: &BTreeMap<String, f64>, shots: usize) -> Self {
        Counts(
            probabilities
                .iter()
                .map(|(k, &p)| (k.clone(), (p * shots as f64) as usize))
                .collect(),
        )
    }

    /// Most frequent outcome; ties resolve to the lexicographically smallest bit-string.
    pub fn most_frequent(&self) -> Option<(&str, usize)> {
        self.iter()
            .fold(None, |best: Option<(&str, usize)>, (k, v)| match best {
                Some((_, best_v)) if best_v >= v => best,
                _ => Some((k, v)),
            })
    }

    /// Horizontal bar chart, one line per outcome, bars scaled to `width` characters.
    pub fn histogram(&self, width: usize) -> String {
        let max = self.0.values().copied().max().unwrap_or(0);
        let total = self.total();
        let key_width = self.0.keys().map(|k| k.len()).max().unwrap_or(0);

        let mut out = String::new();
        for (outcome, &count) in &self.0 {
            let bar_len = if max == 0 {
                0
            } else {
                (count * width).div_ceil(max)
            };
            let share = if total == 0 {
                0.0
            } else {
                100.0 * count as f64 / total as f64
            };
            out.push_str(&format!(
                "{outcome:>key_width$} | {bar:<width$} {count} ({share:.2}%)\n",
                bar = "█".repeat(bar_len),
            ));
        }
        out
    }
}

impl FromIterator<(String, usize)> for Counts {
    fn from_iter<I: IntoIterator<Item = (String, usize)>>(iter: I) -> Self {
        let mut counts = Counts::new();
        for (k, v) in iter {
            counts.insert(k, v);
        }
        counts
    }
}

/// Exact probability of each packed classical outcome.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Distribution {
    num_clbits: usize,
    probabilities: BTreeMap<u64, f64>,
}

impl Distribution {
    pub fn new(num_clbits: usize) -> Self {
        Self {
            num_clbits,
            probabilities: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, outcome: u64, probability: f64) {
        *self.probabilities.entry(outcome).or_insert(0.0) += probability;
    }

    pub fn num_clbits(&self) -> usize {
        self.num_clbits
    }

    pub fn probability(&self, outcome: u64) -> f64 {
        self.probabilities.get(&outcome).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.probabilities.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, f64)> + '_ {
        self.probabilities.iter().map(|(&k, &v)| (k, v))
    }
}

/// Outcome of sampling a circuit: one packed classical value per shot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SamplerResult {
    shots: usize,
    num_clbits: usize,
    registers: Vec<ClassicalRegister>,
    memory: Vec<u64>,
}

impl SamplerResult {
    pub fn new(num_clbits: usize, registers: Vec<ClassicalRegister>, memory: Vec<u64>) -> Self {
        Self {
            shots: memory.len(),
            num_clbits,
            registers,
            memory,
        }
    }

    pub fn shots(&self) -> usize {
        self.shots
    }

    pub fn memory(&self) -> &[u64] {
        &self.memory
    }

    pub fn registers(&self) -> &[ClassicalRegister] {
        &self.registers
    }

    /// Names of the classical registers present in the result.
    pub fn register_names(&self) -> Vec<&str> {
        self.registers.iter().map(|r| r.name.as_str()).collect()
    }

    /// Counts over all classical bits.
    pub fn counts(&self) -> Counts {
        let mut raw: BTreeMap<u64, usize> = BTreeMap::new();
        for &outcome in &self.memory {
            *raw.entry(outcome).or_insert(0) += 1;
        }
        raw.into_iter()
            .map(|(k, v)| (bitstring(k, self.num_clbits), v))
            .collect()
    }

    /// Counts over the bits of a single named register.
    pub fn register_counts(&self, name: &str) -> Result<Counts, CircuitError> {
        let register = self
            .registers
            .iter()
            .find(|r| r.name == name)
            .ok_or_else(|| CircuitError::UnknownRegister(name.to_string()))?;

        Ok(self
            .memory
            .iter()
            .map(|&outcome| (bitstring(register.value_of(outcome), register.size), 1))
            .collect())
    }

    /// Observed outcome frequencies over all classical bits.
    pub fn quasi_probabilities(&self) -> BTreeMap<String, f64> {
        self.counts().probabilities()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn registers() -> Vec<ClassicalRegister> {
        vec![
            ClassicalRegister {
                name: "alice_meas".into(),
                size: 2,
                offset: 0,
            },
            ClassicalRegister {
                name: "bob_verif".into(),
                size: 1,
                offset: 2,
            },
        ]
    }

    #[test]
    fn test_bitstring_is_msb_first() {
        assert_eq!(bitstring(0b001, 3), "001");
        assert_eq!(bitstring(0b100, 3), "100");
        assert_eq!(bitstring(0, 0), "");
    }

    #[test]
    fn test_counts_and_register_counts() {
        let result = SamplerResult::new(3, registers(), vec![0b000, 0b001, 0b101, 0b011, 0b001]);

        let counts = result.counts();
        assert_eq!(counts.get("001"), 2);
        assert_eq!(counts.get("101"), 1);
        assert_eq!(counts.total(), 5);

        let bob = result.register_counts("bob_verif").unwrap();
        assert_eq!(bob.get("0"), 4);
        assert_eq!(bob.get("1"), 1);

        let alice = result.register_counts("alice_meas").unwrap();
        assert_eq!(alice.get("01"), 3);
        assert_eq!(alice.get("11"), 1);

        assert!(matches!(
            result.register_counts("missing"),
            Err(CircuitError::UnknownRegister(_))
        ));
        assert_eq!(result.register_names(), vec!["alice_meas", "bob_verif"]);
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let result = SamplerResult::new(3, registers(), vec![1, 2, 3, 3, 7, 0, 0]);
        let total: f64 = result.quasi_probabilities().values().sum();
        assert_abs_diff_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_from_probabilities_truncates() {
        let mut probs = BTreeMap::new();
        probs.insert("0".to_string(), 0.5004);
        probs.insert("1".to_string(), 0.4996);
        let counts = Counts::from_probabilities(&probs, 1000);
        assert_eq!(counts.get("0"), 500);
        assert_eq!(counts.get("1"), 499);
    }

    #[test]
    fn test_most_frequent_and_histogram() {
        let counts: Counts = [("0".to_string(), 30), ("1".to_string(), 10)]
            .into_iter()
            .collect();
        assert_eq!(counts.most_frequent(), Some(("0", 30)));

        let hist = counts.histogram(10);
        let lines: Vec<&str> = hist.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].matches('█').count(), 10);
        assert_eq!(lines[1].matches('█').count(), 4);
        assert!(lines[0].contains("75.00%"));
    }

    #[test]
    fn test_distribution_accumulates() {
        let mut dist = Distribution::new(3);
        dist.add(0b000, 0.25);
        dist.add(0b110, 0.25);
        dist.add(0b110, 0.5);

        assert_abs_diff_eq!(dist.probability(0b110), 0.75);
        assert_abs_diff_eq!(dist.probability(0b001), 0.0);
        assert_abs_diff_eq!(dist.total(), 1.0);
        assert_eq!(dist.num_clbits(), 3);
    }
}
