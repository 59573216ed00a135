//! Turns an assignment into the labeled reconciliation table.
//!
//! Every reference and every system entity appears exactly once. Output
//! ordering is reference id order first, then unmatched system entries in
//! system id order, so tables diff cleanly across runs.

use std::collections::{HashMap, HashSet};

use crate::config::ToleranceBands;
use crate::schema::{
    Assignment, Entity, EntityId, FieldKey, MatchType, NormalizedEntity, ReconciliationEntry,
};
use crate::scorer::relative_deviation;

fn agree(a: &FieldKey, b: &FieldKey) -> Option<bool> {
    match (a.as_comparable(), b.as_comparable()) {
        (Some(x), Some(y)) => Some(x == y),
        _ => None,
    }
}

fn key_string(key: &FieldKey) -> Option<String> {
    key.as_comparable().map(|s| s.to_string())
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Classify one matched pair against the tolerance bands.
fn classify(
    r: &NormalizedEntity,
    s: &NormalizedEntity,
    bands: &ToleranceBands,
) -> (MatchType, Option<bool>, Option<bool>, Option<bool>, Option<f64>) {
    let fuel_match = agree(&r.fuel_key, &s.fuel_key);
    let status_match = agree(&r.status_key, &s.status_key);
    let region_match = agree(&r.region_key, &s.region_key);

    // Unknown capacity on either side compares neutral.
    let (diff_pct, capacity_equal, capacity_conflict) =
        match (r.capacity_value, s.capacity_value) {
            (Some(a), Some(b)) => {
                let dev = relative_deviation(a, b);
                (
                    Some(round1(dev * 100.0)),
                    (a - b).abs() <= bands.exact_mw,
                    dev > bands.wide_pct,
                )
            }
            _ => (None, true, false),
        };

    let categorical_conflict = fuel_match == Some(false) || status_match == Some(false);
    let all_agree = fuel_match != Some(false)
        && status_match != Some(false)
        && region_match != Some(false);

    let match_type = if capacity_conflict || categorical_conflict {
        MatchType::Incorrect
    } else if r.name_key == s.name_key && all_agree && capacity_equal {
        MatchType::Exact
    } else {
        MatchType::Approximate
    };
    (match_type, fuel_match, status_match, region_match, diff_pct)
}

fn reference_side(entry: &mut ReconciliationEntry, e: &Entity, n: &NormalizedEntity) {
    entry.reference_id = Some(e.id);
    entry.reference_name = Some(e.name.clone());
    entry.reference_region = key_string(&n.region_key);
    entry.reference_fuel = key_string(&n.fuel_key);
    entry.reference_status = key_string(&n.status_key);
    entry.reference_capacity = n.capacity_value;
}

fn system_side(entry: &mut ReconciliationEntry, e: &Entity, n: &NormalizedEntity) {
    entry.system_id = Some(e.id);
    entry.system_name = Some(e.name.clone());
    entry.system_region = key_string(&n.region_key);
    entry.system_fuel = key_string(&n.fuel_key);
    entry.system_status = key_string(&n.status_key);
    entry.system_capacity = n.capacity_value;
}

fn blank(match_type: MatchType) -> ReconciliationEntry {
    ReconciliationEntry {
        match_type,
        reference_id: None,
        system_id: None,
        reference_name: None,
        system_name: None,
        reference_region: None,
        system_region: None,
        reference_fuel: None,
        system_fuel: None,
        reference_status: None,
        system_status: None,
        reference_capacity: None,
        system_capacity: None,
        capacity_diff_pct: None,
        score: None,
        fuel_match: None,
        status_match: None,
        region_match: None,
    }
}

/// Build the reconciliation table from a solved assignment.
pub fn reconcile(
    assignment: &Assignment,
    references: &[Entity],
    systems: &[Entity],
    ref_norm: &[NormalizedEntity],
    sys_norm: &[NormalizedEntity],
    scores: &HashMap<(EntityId, EntityId), f64>,
    bands: &ToleranceBands,
) -> Vec<ReconciliationEntry> {
    let matched_sys: HashMap<EntityId, EntityId> =
        assignment.pairs.iter().map(|&(r, s)| (r, s)).collect();
    let sys_taken: HashSet<EntityId> = assignment.pairs.iter().map(|&(_, s)| s).collect();

    let mut entries = Vec::with_capacity(references.len() + systems.len());

    // Matched and missing reference entries, in reference id order.
    for (reference, r_norm) in references.iter().zip(ref_norm) {
        match matched_sys.get(&reference.id) {
            Some(&sys_id) => {
                let system = &systems[sys_id];
                let s_norm = &sys_norm[sys_id];
                let (match_type, fuel_match, status_match, region_match, diff_pct) =
                    classify(r_norm, s_norm, bands);
                let mut entry = blank(match_type);
                reference_side(&mut entry, reference, r_norm);
                system_side(&mut entry, system, s_norm);
                entry.capacity_diff_pct = diff_pct;
                entry.score = scores.get(&(reference.id, sys_id)).copied();
                entry.fuel_match = fuel_match;
                entry.status_match = status_match;
                entry.region_match = region_match;
                entries.push(entry);
            }
            None => {
                let mut entry = blank(MatchType::Missing);
                reference_side(&mut entry, reference, r_norm);
                entries.push(entry);
            }
        }
    }

    // Name keys of system entities already counted, seeding the duplicate
    // detection pass with the matched ones.
    let mut seen_keys: HashSet<&str> = sys_norm
        .iter()
        .filter(|n| sys_taken.contains(&n.id) && !n.name_key.is_empty())
        .map(|n| n.name_key.as_str())
        .collect();

    // Hallucinated and duplicate system entries, in system id order.
    for (system, s_norm) in systems.iter().zip(sys_norm) {
        if sys_taken.contains(&system.id) {
            continue;
        }
        let duplicate = !s_norm.name_key.is_empty() && seen_keys.contains(s_norm.name_key.as_str());
        if !duplicate && !s_norm.name_key.is_empty() {
            seen_keys.insert(s_norm.name_key.as_str());
        }
        let mut entry = blank(if duplicate {
            MatchType::Duplicate
        } else {
            MatchType::Hallucinated
        });
        system_side(&mut entry, system, s_norm);
        entries.push(entry);
    }

    entries
}
