//! Canonical data model for plant inventories and reconciliation results.
//!
//! An evaluation run compares a reference inventory (expert-compiled ground
//! truth) against a system inventory (produced by the system under
//! evaluation). Entities are loaded once and never modified; everything else
//! is derived from them in a single forward pass.

use serde::{Deserialize, Serialize};

/// Identifier of an entity inside its own inventory (row order at load).
/// Ids never cross inventories.
pub type EntityId = usize;

/// One row of either inventory, exactly as loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    pub name: String,
    pub fuel: String,
    pub status: String,
    /// Commissioning date or period, free form ("2015", "2025-2027", "").
    pub commissioning: String,
    pub region: String,
    /// Raw capacity cell in MW ("600", "600 MW", "approx. 620", "").
    pub capacity: String,
}

/// A categorical field after canonicalization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKey {
    /// Canonical value produced by a substitution rule.
    Known(String),
    /// Non-empty value no rule matched; still usable for comparison but
    /// flagged for diagnostics.
    Unmapped(String),
    /// Absent or blank in the source row.
    Unknown,
}

impl FieldKey {
    /// The comparison string, or `None` when the value is unknown.
    pub fn as_comparable(&self) -> Option<&str> {
        match self {
            FieldKey::Known(v) | FieldKey::Unmapped(v) => Some(v),
            FieldKey::Unknown => None,
        }
    }

    pub fn is_unmapped(&self) -> bool {
        matches!(self, FieldKey::Unmapped(_))
    }
}

/// Immutable normalized view of an [`Entity`], created once by the
/// normalizer and borrowed by every downstream stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedEntity {
    pub id: EntityId,
    /// Comparison key for the name; empty when the raw name reduced to
    /// nothing, which makes the entity unmatchable.
    pub name_key: String,
    pub region_key: FieldKey,
    pub fuel_key: FieldKey,
    pub status_key: FieldKey,
    /// Parsed capacity in MW. `None` means unknown; zero is a real value.
    pub capacity_value: Option<f64>,
}

/// A scored potential pairing between a reference and a system entity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub reference: EntityId,
    pub system: EntityId,
    /// Composite similarity in [0, 1].
    pub score: f64,
    /// Inadmissible candidates are never offered to the matcher.
    pub admissible: bool,
}

/// Which solver produced an assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverMethod {
    Exact,
    Greedy,
}

/// Partial bijection between reference and system ids: no id of either side
/// appears twice, and any id may be left unmatched.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    /// Matched (reference_id, system_id) pairs in reference id order.
    pub pairs: Vec<(EntityId, EntityId)>,
    pub method: SolverMethod,
    /// False for the greedy fallback, which carries no optimality guarantee.
    pub optimal: bool,
}

impl Assignment {
    pub fn empty(method: SolverMethod, optimal: bool) -> Self {
        Assignment {
            pairs: Vec::new(),
            method,
            optimal,
        }
    }

    pub fn total_score(&self, candidates: &[Candidate]) -> f64 {
        self.pairs
            .iter()
            .filter_map(|&(r, s)| {
                candidates
                    .iter()
                    .find(|c| c.reference == r && c.system == s)
                    .map(|c| c.score)
            })
            .sum()
    }
}

/// Outcome class of one reconciliation row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Matched; name keys identical and every compared attribute agrees.
    Exact,
    /// Matched with at least one attribute disagreement, or capacity beyond
    /// the equality tolerance but inside the wide band.
    Approximate,
    /// Matched but capacity deviates beyond the wide band, or fuel/status
    /// conflict outright.
    Incorrect,
    /// Reference entity with no system counterpart.
    Missing,
    /// System entity with no reference counterpart.
    Hallucinated,
    /// System entity repeating an already-counted system entity under a
    /// colliding name key.
    Duplicate,
}

impl MatchType {
    /// True for rows where a reference entity was identified in the system
    /// inventory.
    pub fn is_matched(self) -> bool {
        matches!(
            self,
            MatchType::Exact | MatchType::Approximate | MatchType::Incorrect
        )
    }
}

/// One row of the reconciliation table, with both-side attribute values for
/// manual audit. Agreement flags are set only for matched pairs where both
/// sides are known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationEntry {
    pub match_type: MatchType,
    pub reference_id: Option<EntityId>,
    pub system_id: Option<EntityId>,
    pub reference_name: Option<String>,
    pub system_name: Option<String>,
    pub reference_region: Option<String>,
    pub system_region: Option<String>,
    pub reference_fuel: Option<String>,
    pub system_fuel: Option<String>,
    pub reference_status: Option<String>,
    pub system_status: Option<String>,
    pub reference_capacity: Option<f64>,
    pub system_capacity: Option<f64>,
    /// Relative capacity deviation in percent, when both sides are known.
    pub capacity_diff_pct: Option<f64>,
    /// Composite similarity of the matched pair.
    pub score: Option<f64>,
    pub fuel_match: Option<bool>,
    pub status_match: Option<bool>,
    pub region_match: Option<bool>,
}
