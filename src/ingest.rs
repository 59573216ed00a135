//! CSV loading of reference and system inventories.
//!
//! The reference table must carry the full fixed schema; system tables are
//! extraction output and get lenient treatment: header aliases are
//! resolved, a missing attribute column means "unknown" for every row, and
//! only the name column is structurally required.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord};
use tracing::debug;

use crate::error::{ReconError, Result};
use crate::schema::Entity;

/// Logical columns of an inventory table.
pub const REQUIRED_COLUMNS: &[&str] = &["name", "fuel", "status", "cod", "province", "capacity_mwe"];

/// Header aliases seen in extraction output, resolved after lower-casing
/// and space-to-underscore folding.
const ALIASES: &[(&str, &str)] = &[
    ("plant_name", "name"),
    ("plant", "name"),
    ("fuel_type", "fuel"),
    ("construction_stage", "status"),
    ("stage", "status"),
    ("connection_date", "cod"),
    ("date", "cod"),
    ("location", "province"),
    ("region", "province"),
    ("capacity", "capacity_mwe"),
    ("generation_capacity", "capacity_mwe"),
];

fn resolve_columns(headers: &StringRecord) -> HashMap<String, usize> {
    let mut columns = HashMap::new();
    for (idx, header) in headers.iter().enumerate() {
        let folded = header.trim().to_lowercase().replace(' ', "_");
        let logical = ALIASES
            .iter()
            .find(|(alias, _)| *alias == folded)
            .map(|(_, canonical)| canonical.to_string())
            .unwrap_or(folded);
        // First occurrence wins when a file repeats a column.
        columns.entry(logical).or_insert(idx);
    }
    columns
}

fn read_entities<R: Read>(reader: R, strict: bool, label: &str) -> Result<Vec<Entity>> {
    let mut csv_reader = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = csv_reader
        .headers()
        .map_err(|e| ReconError::Schema(format!("{}: not parseable as tabular data: {}", label, e)))?
        .clone();
    let columns = resolve_columns(&headers);

    if strict {
        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !columns.contains_key(**c))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(ReconError::Schema(format!(
                "{}: missing required columns: {}",
                label,
                missing.join(", ")
            )));
        }
    } else if !columns.contains_key("name") {
        return Err(ReconError::Schema(format!(
            "{}: missing required column: name",
            label
        )));
    }

    let field = |record: &StringRecord, column: &str| -> String {
        columns
            .get(column)
            .and_then(|&idx| record.get(idx))
            .unwrap_or("")
            .trim()
            .to_string()
    };

    let mut entities = Vec::new();
    for (row, record) in csv_reader.records().enumerate() {
        let record = record
            .map_err(|e| ReconError::Schema(format!("{}: row {}: {}", label, row + 2, e)))?;
        let name = field(&record, "name");
        if name.is_empty() {
            debug!(row = row + 2, "skipping row with empty name");
            continue;
        }
        entities.push(Entity {
            id: entities.len(),
            name,
            fuel: field(&record, "fuel"),
            status: field(&record, "status"),
            commissioning: field(&record, "cod"),
            region: field(&record, "province"),
            capacity: field(&record, "capacity_mwe"),
        });
    }
    Ok(entities)
}

/// Load the reference inventory; all required columns must be present.
pub fn load_reference_csv(path: &Path) -> Result<Vec<Entity>> {
    let file = std::fs::File::open(path)?;
    read_entities(file, true, &path.display().to_string())
}

/// Load a system inventory; only the name column is structurally required.
pub fn load_system_csv(path: &Path) -> Result<Vec<Entity>> {
    let file = std::fs::File::open(path)?;
    read_entities(file, false, &path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_requires_the_full_schema() {
        let csv = "name,fuel\nPlant A,coal\n";
        let err = read_entities(csv.as_bytes(), true, "test").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("missing required columns"), "{}", message);
        assert!(message.contains("status"), "{}", message);
    }

    #[test]
    fn system_tolerates_missing_attribute_columns() {
        let csv = "name\nPlant A\nPlant B\n";
        let entities = read_entities(csv.as_bytes(), false, "test").unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].fuel, "");
        assert_eq!(entities[1].id, 1);
    }

    #[test]
    fn system_without_name_column_is_a_schema_error() {
        let csv = "fuel,status\ncoal,operating\n";
        assert!(read_entities(csv.as_bytes(), false, "test").is_err());
    }

    #[test]
    fn header_aliases_are_resolved() {
        let csv = "Plant Name,Fuel Type,Stage,Location,Capacity\nPlant A,Coal,Operating,Ha Noi,600\n";
        let entities = read_entities(csv.as_bytes(), false, "test").unwrap();
        assert_eq!(entities[0].name, "Plant A");
        assert_eq!(entities[0].fuel, "Coal");
        assert_eq!(entities[0].status, "Operating");
        assert_eq!(entities[0].region, "Ha Noi");
        assert_eq!(entities[0].capacity, "600");
    }

    #[test]
    fn empty_names_are_skipped_and_ids_stay_dense() {
        let csv = "name,fuel\nPlant A,coal\n,gas\nPlant C,oil\n";
        let entities = read_entities(csv.as_bytes(), false, "test").unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[1].name, "Plant C");
        assert_eq!(entities[1].id, 1);
    }

    #[test]
    fn empty_table_is_valid() {
        let csv = "name,fuel,status,cod,province,capacity_mwe\n";
        let entities = read_entities(csv.as_bytes(), true, "test").unwrap();
        assert!(entities.is_empty());
    }
}
