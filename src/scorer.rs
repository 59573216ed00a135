//! Pairwise candidate scoring between the normalized inventories.
//!
//! The composite score is a weighted mean over the comparable components:
//! name similarity (always), categorical agreement, and capacity closeness.
//! Components that cannot be compared (unknown on either side) are
//! renormalized away so they contribute neither bonus nor penalty.

use std::collections::HashMap;

use itertools::iproduct;
use strsim::jaro_winkler;

use crate::config::ReconConfig;
use crate::schema::{Candidate, FieldKey, NormalizedEntity};

/// Relative deviation of two capacities, against the larger value.
pub fn relative_deviation(a: f64, b: f64) -> f64 {
    let larger = a.abs().max(b.abs());
    if larger == 0.0 {
        0.0
    } else {
        (a - b).abs() / larger
    }
}

/// Binary agreement of two categorical keys; `None` when either side is
/// unknown.
fn agreement(a: &FieldKey, b: &FieldKey) -> Option<f64> {
    match (a.as_comparable(), b.as_comparable()) {
        (Some(x), Some(y)) => Some(if x == y { 1.0 } else { 0.0 }),
        _ => None,
    }
}

/// Scores candidate pairs for one run. Owns a per-run memo of
/// name-similarity computations so repeated name keys (duplicates) are not
/// recomputed; the cache dies with the run.
pub struct CandidateScorer<'a> {
    config: &'a ReconConfig,
    name_sim_cache: HashMap<(String, String), f64>,
}

impl<'a> CandidateScorer<'a> {
    pub fn new(config: &'a ReconConfig) -> Self {
        CandidateScorer {
            config,
            name_sim_cache: HashMap::new(),
        }
    }

    /// Jaro-Winkler over name keys, memoized with an order-insensitive key
    /// so the metric stays symmetric by construction.
    fn name_similarity(&mut self, a: &str, b: &str) -> f64 {
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let key = if a <= b {
            (a.to_string(), b.to_string())
        } else {
            (b.to_string(), a.to_string())
        };
        if let Some(&sim) = self.name_sim_cache.get(&key) {
            return sim;
        }
        let sim = jaro_winkler(&key.0, &key.1);
        self.name_sim_cache.insert(key, sim);
        sim
    }

    /// Piecewise-linear capacity credit: full inside the tight band, zero
    /// beyond the wide band. `None` when either capacity is unknown.
    fn capacity_credit(&self, r: Option<f64>, s: Option<f64>) -> Option<f64> {
        let (a, b) = (r?, s?);
        let bands = &self.config.tolerance;
        let dev = relative_deviation(a, b);
        Some(if dev <= bands.tight_pct {
            1.0
        } else if dev >= bands.wide_pct {
            0.0
        } else {
            (bands.wide_pct - dev) / (bands.wide_pct - bands.tight_pct)
        })
    }

    /// Score one (reference, system) pair.
    pub fn score(&mut self, r: &NormalizedEntity, s: &NormalizedEntity) -> Candidate {
        let name_sim = self.name_similarity(&r.name_key, &s.name_key);
        let fuel = agreement(&r.fuel_key, &s.fuel_key);
        let status = agreement(&r.status_key, &s.status_key);
        let region = agreement(&r.region_key, &s.region_key);
        let capacity = self.capacity_credit(r.capacity_value, s.capacity_value);

        let w = &self.config.weights;
        let mut total = w.name * name_sim;
        let mut weight_sum = w.name;
        for (component, weight) in [(fuel, w.fuel), (status, w.status), (region, w.region)] {
            if let Some(value) = component {
                total += weight * value;
                weight_sum += weight;
            }
        }
        if let Some(value) = capacity {
            total += w.capacity * value;
            weight_sum += w.capacity;
        }
        let score = if weight_sum > 0.0 { total / weight_sum } else { 0.0 };

        // A weak name can be rescued only by strong agreement everywhere
        // else: same region, same fuel, capacity inside the tight band.
        let capacity_tight = match (r.capacity_value, s.capacity_value) {
            (Some(a), Some(b)) => relative_deviation(a, b) <= self.config.tolerance.tight_pct,
            _ => false,
        };
        let rescue = region == Some(1.0) && fuel == Some(1.0) && capacity_tight;
        let admissible = !r.name_key.is_empty()
            && !s.name_key.is_empty()
            && (name_sim >= self.config.admissibility_floor || rescue);

        Candidate {
            reference: r.id,
            system: s.id,
            score,
            admissible,
        }
    }

    /// Score the cross product of the two inventories. Pairs where either
    /// name key is empty are trivially incompatible and skipped; this is a
    /// cheap pre-filter, not a correctness condition.
    pub fn generate(
        &mut self,
        references: &[NormalizedEntity],
        systems: &[NormalizedEntity],
    ) -> Vec<Candidate> {
        iproduct!(references.iter(), systems.iter())
            .filter(|(r, s)| !r.name_key.is_empty() && !s.name_key.is_empty())
            .map(|(r, s)| self.score(r, s))
            .collect()
    }
}
