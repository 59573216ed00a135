//! Static configuration for an evaluation run: normalization rule tables,
//! score weights, tolerance bands, and matcher mode.
//!
//! Everything here is data, never inferred. The built-in defaults cover the
//! Vietnamese thermal power corpus; projects with different inventories
//! supply their own JSON config.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ReconError, Result};

/// One ordered rewrite rule: a regex and its replacement template
/// (capture groups referenced as `${1}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    pub pattern: String,
    pub replacement: String,
}

fn sub(pattern: &str, replacement: &str) -> Substitution {
    Substitution {
        pattern: pattern.to_string(),
        replacement: replacement.to_string(),
    }
}

/// Rule tables consumed by the normalizer. Order matters: later rules see
/// the output of earlier ones (name rules), and the first matching pattern
/// wins (categorical lookups).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationRules {
    /// Regexes removed from names, applied in order.
    pub name_drops: Vec<String>,
    /// Rewrite rules applied to names after the drops, in order.
    pub name_substitutions: Vec<Substitution>,
    pub region_substitutions: Vec<Substitution>,
    pub fuel_substitutions: Vec<Substitution>,
    pub status_substitutions: Vec<Substitution>,
}

impl Default for NormalizationRules {
    fn default() -> Self {
        NormalizationRules {
            name_drops: vec![
                r"\(.*?\)".to_string(),
                r"\btbkhh\b".to_string(),
                r"\bnmnd\b".to_string(),
                r"\bnhiet dien\b".to_string(),
                r"\bnha may\b".to_string(),
                r"\bthermal power plant\b".to_string(),
                r"\bpower station\b".to_string(),
                r"\bpower complex\b".to_string(),
                r"\bthermal\b".to_string(),
                r"\btpp\b".to_string(),
            ],
            name_substitutions: vec![
                // Roman numeral unit suffixes; IV before III before II before I.
                sub(r"\biv\b", "4"),
                sub(r"\biii\b", "3"),
                sub(r"\bii\b", "2"),
                sub(r"\bi\b", "1"),
                sub(r"\bno\.?\s*(\d+)\b", "${1}"),
            ],
            region_substitutions: vec![
                sub(r"\bho chi minh\b|\bhcmc\b|\bsai ?gon\b", "tp ho chi minh"),
                sub(r"\bha ?noi\b", "ha noi"),
                sub(r"^(?:tinh|province of)\s+(.+)$", "${1}"),
                sub(r"^(.+?)\s+province$", "${1}"),
            ],
            fuel_substitutions: vec![
                sub(r"\bcoal\b|\banthracite\b|\blignite\b", "coal"),
                // LNG before the generic gas rule.
                sub(r"\blng\b|\bimported gas\b", "imported lng"),
                sub(r"\bgas\b|\bccgt\b|\bcombined cycle\b", "gas"),
                sub(r"\boil\b|\bdiesel\b|\bfuel oil\b", "oil"),
            ],
            status_substitutions: vec![
                sub(r"\boperat(?:ing|ional)\b|\bin operation\b|\bonline\b", "operational"),
                sub(r"\bunder construction\b|\bconstruct(?:ing|ion)\b", "constructing"),
                sub(r"\bplann(?:ed|ing)\b", "planned"),
                sub(r"\bproposed\b|\bannounced\b", "proposed"),
                sub(r"\bcancell?ed\b|\bshelved\b", "cancelled"),
                sub(r"\bretired\b|\bdecommissioned\b", "retired"),
            ],
        }
    }
}

/// Weights of the composite candidate score. Name similarity is dominant;
/// components that cannot be compared are renormalized away rather than
/// counted as zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreWeights {
    pub name: f64,
    pub fuel: f64,
    pub status: f64,
    pub region: f64,
    pub capacity: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        ScoreWeights {
            name: 0.60,
            fuel: 0.10,
            status: 0.05,
            region: 0.10,
            capacity: 0.15,
        }
    }
}

/// Capacity tolerance bands, relative to the larger of the two values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToleranceBands {
    /// Absolute MW slack within which two capacities count as identical
    /// (exact-match eligibility).
    pub exact_mw: f64,
    /// Full scoring credit up to this relative deviation.
    pub tight_pct: f64,
    /// Scoring credit decays linearly to zero here; beyond it a matched
    /// pair is capacity-conflicted.
    pub wide_pct: f64,
}

impl Default for ToleranceBands {
    fn default() -> Self {
        ToleranceBands {
            exact_mw: 0.5,
            tight_pct: 0.20,
            wide_pct: 0.50,
        }
    }
}

/// Which assignment solver to run. The greedy fallback is never substituted
/// silently; it must be configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatcherMode {
    #[default]
    Exact,
    Greedy,
}

/// Full configuration surface of the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconConfig {
    pub rules: NormalizationRules,
    pub weights: ScoreWeights,
    pub tolerance: ToleranceBands,
    /// Name-similarity floor below which a pair is inadmissible unless the
    /// strong region+fuel+capacity agreement rescue applies.
    pub admissibility_floor: f64,
    /// Pass-1 commitment threshold of the greedy fallback.
    pub greedy_threshold: f64,
    pub matcher_mode: MatcherMode,
}

impl Default for ReconConfig {
    fn default() -> Self {
        ReconConfig {
            rules: NormalizationRules::default(),
            weights: ScoreWeights::default(),
            tolerance: ToleranceBands::default(),
            admissibility_floor: 0.55,
            greedy_threshold: 0.85,
            matcher_mode: MatcherMode::Exact,
        }
    }
}

impl ReconConfig {
    /// Load a configuration from a JSON file. Missing fields fall back to
    /// the defaults, so a config may override only the tables it cares
    /// about.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            ReconError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            ReconError::Config(format!("invalid config {}: {}", path.display(), e))
        })
    }
}
