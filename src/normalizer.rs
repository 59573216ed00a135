//! Config-driven canonicalization of inventory rows.
//!
//! Normalization is pure and total: malformed or absent values become
//! explicit unknown markers, never errors, and normalizing an
//! already-normalized value is a no-op.

use lazy_static::lazy_static;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::{NormalizationRules, Substitution};
use crate::error::Result;
use crate::schema::{Entity, FieldKey, NormalizedEntity};

lazy_static! {
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
    static ref NUMBER: Regex = Regex::new(r"\d*\.?\d+").unwrap();
}

/// Cell values that mean "unknown" rather than data.
const UNKNOWN_MARKERS: &[&str] = &["", "n/a", "na", "unknown", "tbd", "-"];

struct CompiledSub {
    pattern: Regex,
    replacement: String,
}

fn compile(subs: &[Substitution]) -> Result<Vec<CompiledSub>> {
    subs.iter()
        .map(|s| {
            Ok(CompiledSub {
                pattern: Regex::new(&s.pattern)?,
                replacement: s.replacement.clone(),
            })
        })
        .collect()
}

/// Applies the configured rule tables to entities. Regexes are compiled once
/// at construction and reused for the whole run.
pub struct Normalizer {
    name_drops: Vec<Regex>,
    name_subs: Vec<CompiledSub>,
    region_subs: Vec<CompiledSub>,
    fuel_subs: Vec<CompiledSub>,
    status_subs: Vec<CompiledSub>,
}

impl Normalizer {
    pub fn from_rules(rules: &NormalizationRules) -> Result<Self> {
        Ok(Normalizer {
            name_drops: rules
                .name_drops
                .iter()
                .map(|p| Ok(Regex::new(p)?))
                .collect::<Result<Vec<_>>>()?,
            name_subs: compile(&rules.name_substitutions)?,
            region_subs: compile(&rules.region_substitutions)?,
            fuel_subs: compile(&rules.fuel_substitutions)?,
            status_subs: compile(&rules.status_substitutions)?,
        })
    }

    /// Produce the immutable normalized view of one entity.
    pub fn normalize(&self, entity: &Entity) -> NormalizedEntity {
        NormalizedEntity {
            id: entity.id,
            name_key: self.normalize_name(&entity.name),
            region_key: lookup(&self.region_subs, &entity.region),
            fuel_key: self.normalize_fuel(&entity.fuel),
            status_key: lookup(&self.status_subs, &entity.status),
            capacity_value: parse_capacity(&entity.capacity),
        }
    }

    /// Fold case and diacritics, then apply the ordered drop and
    /// substitution rules. Later rules see the output of earlier ones.
    pub fn normalize_name(&self, raw: &str) -> String {
        let mut s = fold(raw);
        for re in &self.name_drops {
            s = re.replace_all(&s, "").into_owned();
        }
        for rule in &self.name_subs {
            s = rule
                .pattern
                .replace_all(&s, rule.replacement.as_str())
                .into_owned();
        }
        collapse(&s)
    }

    /// Fuel values may list several fuels separated by `/`; each part is
    /// canonicalized independently, then the parts are sorted so the key is
    /// order-insensitive.
    fn normalize_fuel(&self, raw: &str) -> FieldKey {
        let folded = fold(raw);
        if is_unknown(&folded) {
            return FieldKey::Unknown;
        }
        let mut mapped_all = true;
        let mut parts: Vec<String> = Vec::new();
        for part in folded.split('/') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            match first_match(&self.fuel_subs, part) {
                Some(canon) => parts.push(canon),
                None => {
                    mapped_all = false;
                    parts.push(part.to_string());
                }
            }
        }
        if parts.is_empty() {
            return FieldKey::Unknown;
        }
        parts.sort();
        parts.dedup();
        let joined = parts.join("/");
        if mapped_all {
            FieldKey::Known(joined)
        } else {
            FieldKey::Unmapped(joined)
        }
    }
}

/// Lower-case, decompose, and strip combining marks, then collapse
/// whitespace.
fn fold(raw: &str) -> String {
    let stripped: String = raw.nfd().filter(|c| !is_combining_mark(*c)).collect();
    collapse(&stripped.to_lowercase())
}

fn collapse(s: &str) -> String {
    WHITESPACE.replace_all(s.trim(), " ").into_owned()
}

fn is_unknown(folded: &str) -> bool {
    UNKNOWN_MARKERS.contains(&folded)
}

/// First matching pattern wins; its replacement template is expanded with
/// the captures of that match.
fn first_match(table: &[CompiledSub], value: &str) -> Option<String> {
    for rule in table {
        if let Some(caps) = rule.pattern.captures(value) {
            let mut out = String::new();
            caps.expand(&rule.replacement, &mut out);
            return Some(collapse(&out));
        }
    }
    None
}

fn lookup(table: &[CompiledSub], raw: &str) -> FieldKey {
    let folded = fold(raw);
    if is_unknown(&folded) {
        return FieldKey::Unknown;
    }
    match first_match(table, &folded) {
        Some(canon) => FieldKey::Known(canon),
        None => FieldKey::Unmapped(folded),
    }
}

/// Extract the first numeric token from a capacity cell that may contain
/// units, ranges, or prose. Empty or non-numeric input is unknown, never
/// zero: zero and unknown stay distinguishable downstream.
pub fn parse_capacity(raw: &str) -> Option<f64> {
    let folded = fold(raw).replace(',', "");
    if is_unknown(&folded) {
        return None;
    }
    NUMBER
        .find(&folded)
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NormalizationRules;

    fn normalizer() -> Normalizer {
        Normalizer::from_rules(&NormalizationRules::default()).unwrap()
    }

    fn entity(name: &str, fuel: &str, status: &str, region: &str, capacity: &str) -> Entity {
        Entity {
            id: 0,
            name: name.to_string(),
            fuel: fuel.to_string(),
            status: status.to_string(),
            commissioning: String::new(),
            region: region.to_string(),
            capacity: capacity.to_string(),
        }
    }

    #[test]
    fn name_drops_boilerplate_and_parentheticals() {
        let n = normalizer();
        assert_eq!(n.normalize_name("TBKHH Plant A Thermal (Local)"), "plant a");
        assert_eq!(n.normalize_name("Plant A"), "plant a");
    }

    #[test]
    fn name_strips_diacritics() {
        let n = normalizer();
        assert_eq!(n.normalize_name("Phả Lại 2"), "pha lai 2");
        assert_eq!(n.normalize_name("Ô Môn I"), "o mon 1");
    }

    #[test]
    fn name_substitutes_roman_numerals_in_order() {
        let n = normalizer();
        assert_eq!(n.normalize_name("Vung Ang II"), "vung ang 2");
        assert_eq!(n.normalize_name("Duyen Hai III"), "duyen hai 3");
        assert_eq!(n.normalize_name("Song Hau No. 1"), "song hau 1");
    }

    #[test]
    fn region_lookup_first_match_wins() {
        let n = normalizer();
        assert_eq!(
            lookup(&n.region_subs, "Ho Chi Minh City"),
            FieldKey::Known("tp ho chi minh".to_string())
        );
        assert_eq!(
            lookup(&n.region_subs, "Quảng Ninh Province"),
            FieldKey::Known("quang ninh".to_string())
        );
    }

    #[test]
    fn unmapped_values_pass_through_flagged() {
        let n = normalizer();
        let key = lookup(&n.region_subs, "Atlantis");
        assert_eq!(key, FieldKey::Unmapped("atlantis".to_string()));
        assert!(key.is_unmapped());
        assert_eq!(key.as_comparable(), Some("atlantis"));
    }

    #[test]
    fn fuel_splits_sorts_and_canonicalizes_multi_fuel() {
        let n = normalizer();
        let e = entity("x", "Gas / Coal", "", "", "");
        assert_eq!(
            n.normalize(&e).fuel_key,
            FieldKey::Known("coal/gas".to_string())
        );
        let e = entity("x", "Coal (Local)", "", "", "");
        assert_eq!(n.normalize(&e).fuel_key, FieldKey::Known("coal".to_string()));
    }

    #[test]
    fn status_tolerates_leading_junk() {
        let n = normalizer();
        let e = entity("x", "", "123 Operating", "", "");
        assert_eq!(
            n.normalize(&e).status_key,
            FieldKey::Known("operational".to_string())
        );
    }

    #[test]
    fn capacity_extracts_first_numeric_token() {
        assert_eq!(parse_capacity("500 MW"), Some(500.0));
        assert_eq!(parse_capacity("approx. 500 MW"), Some(500.0));
        assert_eq!(parse_capacity("~300"), Some(300.0));
        assert_eq!(parse_capacity("1,200 MW"), Some(1200.0));
        assert_eq!(parse_capacity("600-620"), Some(600.0));
        assert_eq!(parse_capacity("0"), Some(0.0));
        assert_eq!(parse_capacity(""), None);
        assert_eq!(parse_capacity("N/A"), None);
        assert_eq!(parse_capacity("unknown"), None);
    }

    #[test]
    fn absent_fields_normalize_to_unknown() {
        let n = normalizer();
        let norm = n.normalize(&entity("Plant A", "", "", "", ""));
        assert_eq!(norm.fuel_key, FieldKey::Unknown);
        assert_eq!(norm.status_key, FieldKey::Unknown);
        assert_eq!(norm.region_key, FieldKey::Unknown);
        assert_eq!(norm.capacity_value, None);
    }

    #[test]
    fn normalization_is_idempotent_for_every_field() {
        let n = normalizer();
        let raw = entity(
            "TBKHH Phả Lại II Thermal (Unit 1)",
            "Imported LNG",
            "Under Construction",
            "Quảng Ninh Province",
            "approx. 1,200 MW",
        );
        let once = n.normalize(&raw);
        let again = n.normalize(&Entity {
            id: 0,
            name: once.name_key.clone(),
            fuel: once.fuel_key.as_comparable().unwrap_or("").to_string(),
            status: once.status_key.as_comparable().unwrap_or("").to_string(),
            commissioning: String::new(),
            region: once.region_key.as_comparable().unwrap_or("").to_string(),
            capacity: once
                .capacity_value
                .map(|v| v.to_string())
                .unwrap_or_default(),
        });
        assert_eq!(again.name_key, once.name_key);
        assert_eq!(again.fuel_key.as_comparable(), once.fuel_key.as_comparable());
        assert_eq!(
            again.status_key.as_comparable(),
            once.status_key.as_comparable()
        );
        assert_eq!(
            again.region_key.as_comparable(),
            once.region_key.as_comparable()
        );
        assert_eq!(again.capacity_value, once.capacity_value);
    }
}
