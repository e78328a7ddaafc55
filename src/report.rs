//! Experiment reports: console summary and files on disk.

use crate::error::{Result, TeleportError};
use crate::protocols::teleportation::TeleportationStats;
use crate::result::Counts;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const HISTOGRAM_WIDTH: usize = 40;

/// Outcome of one experiment.
#[derive(Clone, Debug, Serialize)]
pub struct ExperimentReport {
    /// 1-based experiment number, used in artifact file names.
    pub index: usize,
    pub title: String,
    pub backend: String,
    pub job_id: Option<String>,
    pub shots: usize,
    pub circuit_depth: usize,
    pub circuit_ops: BTreeMap<String, usize>,
    #[serde(skip)]
    pub circuit_diagram: String,
    /// Classical registers present in the result.
    pub registers: Vec<String>,
    /// Observed frequency of each full bit-string.
    pub probabilities: BTreeMap<String, f64>,
    /// Counts shown in the histogram.
    pub counts: Counts,
    /// Counts of Bob's verification register.
    pub verification_counts: Counts,
    /// Fraction of shots where Bob's verification bit read `0`.
    pub fidelity: f64,
    /// Analytic verification rate, when one is known.
    pub expected_fidelity: Option<f64>,
    pub stats: TeleportationStats,
}

impl ExperimentReport {
    pub fn circuit_file_name(&self) -> String {
        format!("circuit_sim{}.txt", self.index)
    }

    pub fn histogram_file_name(&self) -> String {
        format!("histogram_sim{}.txt", self.index)
    }

    pub fn histogram(&self) -> String {
        format!("{}\n{}", self.title, self.counts.histogram(HISTOGRAM_WIDTH))
    }
}

/// All experiments of one run.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub theta: f64,
    pub shots: usize,
    pub seed: Option<u64>,
    pub experiments: Vec<ExperimentReport>,
    /// Set when the hardware experiment could not complete.
    pub hardware_error: Option<String>,
}

fn write_file(path: PathBuf, contents: &str) -> Result<PathBuf> {
    fs::write(&path, contents).map_err(|source| TeleportError::Artifact {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Writes diagrams, histograms and `results.json` into `dir`, creating it if needed.
pub fn write_artifacts(summary: &RunSummary, dir: &Path) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|source| TeleportError::Artifact {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::new();
    for report in &summary.experiments {
        written.push(write_file(
            dir.join(report.circuit_file_name()),
            &report.circuit_diagram,
        )?);
        written.push(write_file(
            dir.join(report.histogram_file_name()),
            &report.histogram(),
        )?);
    }

    let json = serde_json::to_string_pretty(summary)?;
    written.push(write_file(dir.join("results.json"), &json)?);

    info!(dir = %dir.display(), files = written.len(), "artifacts written");
    Ok(written)
}

/// Human-readable summary of a run.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "theta = {:.4} rad, shots = {}",
        summary.theta, summary.shots
    );

    for report in &summary.experiments {
        let _ = writeln!(out, "\n--- Experiment {}: {} ---", report.index, report.title);
        let _ = writeln!(out, "Backend: {}", report.backend);
        if let Some(job_id) = &report.job_id {
            let _ = writeln!(out, "Job ID: {job_id}");
        }
        let _ = writeln!(out, "Registers: {:?}", report.registers);
        let _ = writeln!(out, "Results: {:?}", report.probabilities);
        if let Some((outcome, count)) = report.counts.most_frequent() {
            let _ = writeln!(out, "Most frequent outcome: {outcome} ({count} shots)");
        }
        let _ = writeln!(
            out,
            "Observed fidelity (share of '0'): {:.2}%",
            report.fidelity * 100.0
        );
        if let Some(expected) = report.expected_fidelity {
            let _ = writeln!(out, "Expected fidelity: {:.2}%", expected * 100.0);
        }
        let _ = writeln!(
            out,
            "Protocol success (Alice measured 00): {:.2}%",
            report.stats.protocol_success_rate * 100.0
        );
        out.push_str(&report.histogram());
    }

    if let Some(err) = &summary.hardware_error {
        let _ = writeln!(out, "\nHardware experiment failed: {err}");
    }
    out
}

pub fn print_summary(summary: &RunSummary) {
    print!("{}", render_summary(summary));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(index: usize) -> ExperimentReport {
        let counts: Counts = [("0".to_string(), 3)].into_iter().collect();
        ExperimentReport {
            index,
            title: "Ideal protocol".to_string(),
            backend: "local_simulator".to_string(),
            job_id: None,
            shots: 3,
            circuit_depth: 1,
            circuit_ops: BTreeMap::new(),
            circuit_diagram: "q_0: ─H─\n".to_string(),
            registers: vec!["bob_verif".to_string()],
            probabilities: BTreeMap::from([("0".to_string(), 1.0)]),
            counts: counts.clone(),
            verification_counts: counts,
            fidelity: 1.0,
            expected_fidelity: Some(1.0),
            stats: TeleportationStats {
                shots: Some(3),
                verification_rate: 1.0,
                protocol_success_rate: 0.25,
                per_alice_outcome: BTreeMap::new(),
            },
        }
    }

    #[test]
    fn test_file_names() {
        let r = report(2);
        assert_eq!(r.circuit_file_name(), "circuit_sim2.txt");
        assert_eq!(r.histogram_file_name(), "histogram_sim2.txt");
    }

    #[test]
    fn test_render_mentions_hardware_error() {
        let summary = RunSummary {
            theta: 1.0,
            shots: 3,
            seed: None,
            experiments: vec![report(1)],
            hardware_error: Some("no backend".to_string()),
        };
        let text = render_summary(&summary);
        assert!(text.contains("Experiment 1: Ideal protocol"));
        assert!(text.contains("100.00%"));
        assert!(text.contains("Hardware experiment failed: no backend"));
        assert!(text.contains("Most frequent outcome: 0 (3 shots)"));
    }
}
