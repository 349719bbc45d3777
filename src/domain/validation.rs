//! Consistency checks across assignments, tables and constants.

use crate::domain::assignment::AssignmentSet;
use crate::domain::constants::{Constants, KAPPA, KAPPA_KEY};
use crate::domain::table::TopologyCatalog;
use crate::domain::units::Mass;
use std::fmt;

const KAPPA_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "warning"),
            Severity::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub severity: Severity,
    pub subject: String,
    pub message: String,
}

impl Finding {
    fn warning(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            subject: subject.into(),
            message: message.into(),
        }
    }

    fn error(subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.severity, self.subject, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn error_count(&self) -> usize {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.findings.len() - self.error_count()
    }

    pub fn extend(&mut self, other: ValidationReport) {
        self.findings.extend(other.findings);
    }
}

pub fn validate_assignments(set: &AssignmentSet, catalog: &TopologyCatalog) -> ValidationReport {
    let mut findings = Vec::new();

    for (particle, a) in set.iter() {
        match catalog.get(&a.topology) {
            None => findings.push(Finding::error(
                particle,
                format!("topology '{}' not found in knot or link tables", a.topology),
            )),
            Some(record) => {
                let table = record.snapshot();
                let diffs = a.snapshot().differences(&table);
                // Only fields the table can fill count as missing.
                let unknown = table.missing_fields();
                let missing: Vec<_> = a
                    .snapshot()
                    .missing_fields()
                    .into_iter()
                    .filter(|f| !unknown.contains(f))
                    .collect();
                // Missing cache fields also show up as diffs; report them once.
                let drifted: Vec<_> = diffs
                    .iter()
                    .filter(|f| !missing.contains(f))
                    .copied()
                    .collect();
                if !drifted.is_empty() {
                    findings.push(Finding::warning(
                        particle,
                        format!(
                            "cached {} differ from {} table",
                            drifted.join(", "),
                            a.topology
                        ),
                    ));
                }
                if !missing.is_empty() {
                    findings.push(Finding::warning(
                        particle,
                        format!("missing cached {}", missing.join(", ")),
                    ));
                }
            }
        }

        if let Some(mass) = a.mass {
            if mass.value < 0.0 {
                findings.push(Finding::warning(
                    particle,
                    format!("negative mass {mass}"),
                ));
            }
        }
    }

    ValidationReport { findings }
}

pub fn validate_constants(constants: &Constants) -> ValidationReport {
    let mut findings = Vec::new();

    if let Some(value) = constants.get(KAPPA_KEY) {
        match value.as_f64() {
            Some(k) if (k - KAPPA).abs() <= KAPPA_TOLERANCE => {}
            Some(k) => findings.push(Finding::warning(
                KAPPA_KEY,
                format!("kappa is {k}, expected pi/24 = {KAPPA}"),
            )),
            None => findings.push(Finding::warning(KAPPA_KEY, "kappa is not a number")),
        }
    }

    for (path, value) in constants.leaves() {
        let leaf = path.rsplit('.').next().unwrap_or(path.as_str());
        if !leaf.to_lowercase().contains("mass") {
            continue;
        }
        if let Err(reason) = Mass::from_json(value) {
            findings.push(Finding::warning(path, reason));
        }
    }

    ValidationReport { findings }
}
