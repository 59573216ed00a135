//! Single-run evaluation pipeline and result export.
//!
//! One run is a strict forward pass: normalize both inventories, score the
//! candidate pairs, solve the assignment, reconcile, aggregate. Each stage
//! consumes immutable inputs and produces a new immutable structure;
//! nothing persists across runs.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::config::ReconConfig;
use crate::error::Result;
use crate::matcher;
use crate::metrics::{self, MetricsReport, ReportMeta};
use crate::normalizer::Normalizer;
use crate::reconciler;
use crate::schema::{Entity, EntityId, ReconciliationEntry};
use crate::scorer::CandidateScorer;

/// The two artifacts of one run.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub entries: Vec<ReconciliationEntry>,
    pub report: MetricsReport,
}

/// Run the full pipeline for one (reference, system) pair.
pub fn evaluate(
    references: &[Entity],
    systems: &[Entity],
    config: &ReconConfig,
    reference_label: &str,
    system_label: &str,
) -> Result<Evaluation> {
    let normalizer = Normalizer::from_rules(&config.rules)?;
    let ref_norm: Vec<_> = references.iter().map(|e| normalizer.normalize(e)).collect();
    let sys_norm: Vec<_> = systems.iter().map(|e| normalizer.normalize(e)).collect();
    let unmapped = ref_norm
        .iter()
        .chain(&sys_norm)
        .flat_map(|n| [&n.region_key, &n.fuel_key, &n.status_key])
        .filter(|k| k.is_unmapped())
        .count();
    if unmapped > 0 {
        warn!(unmapped, "categorical values passed through without a substitution rule");
    }
    info!(
        references = references.len(),
        systems = systems.len(),
        "normalized inventories"
    );

    let mut scorer = CandidateScorer::new(config);
    let candidates = scorer.generate(&ref_norm, &sys_norm);
    let admissible = candidates.iter().filter(|c| c.admissible).count();
    info!(
        candidates = candidates.len(),
        admissible, "scored candidate pairs"
    );

    let solver = matcher::solver_for(config.matcher_mode, config.greedy_threshold);
    let assignment = solver.solve(references.len(), systems.len(), &candidates)?;
    if !assignment.optimal {
        warn!("greedy fallback matcher in use; assignment is not guaranteed optimal");
    }
    info!(matched = assignment.pairs.len(), "assignment solved");

    let scores: HashMap<(EntityId, EntityId), f64> = candidates
        .iter()
        .map(|c| ((c.reference, c.system), c.score))
        .collect();
    let entries = reconciler::reconcile(
        &assignment,
        references,
        systems,
        &ref_norm,
        &sys_norm,
        &scores,
        &config.tolerance,
    );
    let report = metrics::compute(
        &entries,
        &config.tolerance,
        ReportMeta {
            reference_label: reference_label.to_string(),
            system_label: system_label.to_string(),
            solver: assignment.method,
            optimal: assignment.optimal,
        },
    );
    Ok(Evaluation { entries, report })
}

/// Write the reconciliation table as CSV, one row per entry.
pub fn write_reconciliation_csv(entries: &[ReconciliationEntry], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for entry in entries {
        writer.serialize(entry)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the metrics report as pretty-printed JSON.
pub fn write_metrics_json(report: &MetricsReport, path: &Path) -> Result<()> {
    let mut text = serde_json::to_string_pretty(report)?;
    text.push('\n');
    fs::write(path, text)?;
    Ok(())
}
