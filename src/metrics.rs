//! Aggregate accuracy metrics over a completed reconciliation table.
//!
//! `compute` is a pure function of the table (plus the static tolerance
//! bands); the report is immutable once produced.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ToleranceBands;
use crate::schema::{MatchType, ReconciliationEntry, SolverMethod};
use crate::scorer::relative_deviation;

/// Identifying metadata stamped into a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub reference_label: String,
    pub system_label: String,
    pub solver: SolverMethod,
    pub optimal: bool,
}

/// Flat metrics record. Field names and numeric semantics (ratios in [0,1])
/// are load-bearing for downstream consumers and stable across versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub reference_label: String,
    pub system_label: String,
    pub solver: SolverMethod,
    /// False when the greedy fallback produced the assignment.
    pub optimal: bool,

    pub coverage: f64,
    pub precision: f64,
    pub f1: f64,

    pub n_reference: usize,
    /// System entities counted for precision; duplicates are excluded so
    /// the same physical row is neither double-credited nor
    /// double-penalized.
    pub n_system: usize,
    pub n_matched: usize,
    pub n_exact: usize,
    pub n_approximate: usize,
    pub n_incorrect: usize,
    pub n_missing: usize,
    pub n_hallucinated: usize,
    pub n_duplicate: usize,

    /// Fraction of matched pairs agreeing on each attribute, among pairs
    /// where both sides are known. `None` when nothing was comparable.
    pub fuel_accuracy: Option<f64>,
    pub status_accuracy: Option<f64>,
    pub region_accuracy: Option<f64>,
    pub capacity_match_rate: Option<f64>,

    /// Error-taxonomy histogram, keyed by failure mode.
    pub errors: BTreeMap<String, usize>,
}

fn round4(v: f64) -> f64 {
    (v * 10_000.0).round() / 10_000.0
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

fn accuracy(checks: impl Iterator<Item = Option<bool>>) -> Option<f64> {
    let (mut agreed, mut total) = (0usize, 0usize);
    for check in checks.flatten() {
        total += 1;
        if check {
            agreed += 1;
        }
    }
    if total == 0 {
        None
    } else {
        Some(round4(agreed as f64 / total as f64))
    }
}

/// Compute the report for one reconciliation table.
pub fn compute(
    entries: &[ReconciliationEntry],
    bands: &ToleranceBands,
    meta: ReportMeta,
) -> MetricsReport {
    let count = |t: MatchType| entries.iter().filter(|e| e.match_type == t).count();
    let matched: Vec<&ReconciliationEntry> = entries
        .iter()
        .filter(|e| e.match_type.is_matched())
        .collect();

    let n_matched = matched.len();
    let n_missing = count(MatchType::Missing);
    let n_hallucinated = count(MatchType::Hallucinated);
    let n_duplicate = count(MatchType::Duplicate);
    let n_reference = n_matched + n_missing;
    let n_system = n_matched + n_hallucinated;

    let coverage = ratio(n_matched, n_reference);
    let precision = ratio(n_matched, n_system);
    let f1 = if coverage + precision > 0.0 {
        2.0 * coverage * precision / (coverage + precision)
    } else {
        0.0
    };

    // Capacity agreement bands, recomputed from the side-by-side values.
    let (mut cap_total, mut cap_equal, mut cap_mismatch, mut cap_conflict) = (0, 0, 0, 0);
    for e in &matched {
        if let (Some(a), Some(b)) = (e.reference_capacity, e.system_capacity) {
            cap_total += 1;
            if (a - b).abs() <= bands.exact_mw {
                cap_equal += 1;
            } else if relative_deviation(a, b) > bands.wide_pct {
                cap_conflict += 1;
            } else {
                cap_mismatch += 1;
            }
        }
    }

    let wrong_fuel = matched.iter().filter(|e| e.fuel_match == Some(false)).count();
    let wrong_status = matched.iter().filter(|e| e.status_match == Some(false)).count();
    let wrong_region = matched.iter().filter(|e| e.region_match == Some(false)).count();
    let mut errors = BTreeMap::new();
    errors.insert("missing".to_string(), n_missing);
    errors.insert("hallucinated".to_string(), n_hallucinated);
    errors.insert("duplicate".to_string(), n_duplicate);
    errors.insert("wrong_fuel".to_string(), wrong_fuel);
    errors.insert("wrong_status".to_string(), wrong_status);
    errors.insert("wrong_region".to_string(), wrong_region);
    errors.insert("capacity_mismatch".to_string(), cap_mismatch);
    errors.insert("capacity_conflict".to_string(), cap_conflict);

    MetricsReport {
        reference_label: meta.reference_label,
        system_label: meta.system_label,
        solver: meta.solver,
        optimal: meta.optimal,
        coverage: round4(coverage),
        precision: round4(precision),
        f1: round4(f1),
        n_reference,
        n_system,
        n_matched,
        n_exact: count(MatchType::Exact),
        n_approximate: count(MatchType::Approximate),
        n_incorrect: count(MatchType::Incorrect),
        n_missing,
        n_hallucinated,
        n_duplicate,
        fuel_accuracy: accuracy(matched.iter().map(|e| e.fuel_match)),
        status_accuracy: accuracy(matched.iter().map(|e| e.status_match)),
        region_accuracy: accuracy(matched.iter().map(|e| e.region_match)),
        capacity_match_rate: if cap_total == 0 {
            None
        } else {
            Some(round4(cap_equal as f64 / cap_total as f64))
        },
        errors,
    }
}

impl fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Evaluation metrics: {} ===", self.system_label)?;
        writeln!(f, "Reference entities:  {}", self.n_reference)?;
        writeln!(f, "System entities:     {}", self.n_system)?;
        writeln!(
            f,
            "Matched:             {} (exact: {}, approximate: {}, incorrect: {})",
            self.n_matched, self.n_exact, self.n_approximate, self.n_incorrect
        )?;
        writeln!(f, "Missing:             {}", self.n_missing)?;
        writeln!(f, "Hallucinated:        {}", self.n_hallucinated)?;
        writeln!(f, "Duplicates:          {}", self.n_duplicate)?;
        writeln!(f)?;
        writeln!(f, "Coverage (recall):   {:.1}%", self.coverage * 100.0)?;
        writeln!(f, "Precision:           {:.1}%", self.precision * 100.0)?;
        writeln!(f, "F1:                  {:.1}%", self.f1 * 100.0)?;
        for (label, value) in [
            ("Fuel accuracy", self.fuel_accuracy),
            ("Status accuracy", self.status_accuracy),
            ("Region accuracy", self.region_accuracy),
            ("Capacity match rate", self.capacity_match_rate),
        ] {
            if let Some(v) = value {
                writeln!(f, "{:<21}{:.1}%", format!("{}:", label), v * 100.0)?;
            }
        }
        if !self.optimal {
            writeln!(f)?;
            writeln!(f, "NOTE: greedy fallback matcher; totals are not guaranteed optimal")?;
        }
        writeln!(f)?;
        writeln!(f, "Error taxonomy:")?;
        for (kind, n) in &self.errors {
            writeln!(f, "  {}: {}", kind, n)?;
        }
        Ok(())
    }
}
