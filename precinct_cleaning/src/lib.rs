mod config;
mod table;

pub mod builder;
pub mod coerce;
pub mod filename;
pub mod manual;
pub mod source;
pub mod states;
pub mod steps;

use std::collections::HashSet;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;

pub use crate::config::*;
pub use crate::table::{Record, Table, Value};

// **** Row extraction ****

// Counts that went through a float column: 12.0
static DECIMAL_KEY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.\d+$").unwrap());

/// The key columns whose content is sometimes read as numbers.
const NUMERIC_LOOKING_KEYS: [&str; 2] = ["precinct", "district"];

/// Renders precinct and district identifiers as text, without the decimal
/// part that spreadsheets sometimes add.
fn normalize_key_text(value: &Value) -> Value {
    match value {
        Value::Int(i) => Value::Text(i.to_string()),
        Value::Float(f) if f.is_finite() => Value::Text((f.trunc() as i64).to_string()),
        Value::Float(_) => Value::Null,
        Value::Text(s) if DECIMAL_KEY.is_match(s) => match s.parse::<f64>() {
            Ok(f) => Value::Text((f.trunc() as i64).to_string()),
            Err(_) => value.clone(),
        },
        Value::Bool(_) | Value::Date(_) => Value::Text(value.to_string()),
        _ => value.clone(),
    }
}

fn fill_key(value: Value) -> Value {
    let missing = match &value {
        Value::Null => true,
        Value::Text(s) => s.trim().is_empty(),
        _ => false,
    };
    if missing {
        Value::text(DEFAULT_PK_VALUE)
    } else {
        value
    }
}

/// Selects the output columns of a normalized table and removes the rows
/// with the same primary key.
///
/// The primary key columns are never null or empty in the output: they are
/// filled with [DEFAULT_PK_VALUE]. For rows that share a primary key, the
/// first one is kept.
pub fn extract_rows(table: &Table, metadata: &StateMetadata) -> Vec<Record> {
    let key_positions: Vec<(&str, Option<usize>)> = PRIMARY_KEY_COLUMNS
        .iter()
        .map(|c| (*c, table.column_index(c)))
        .collect();
    let mut other_positions: Vec<(&str, usize)> = Vec::new();
    for col in metadata.expected_columns().iter() {
        if PRIMARY_KEY_COLUMNS.contains(&col.as_str()) {
            continue;
        }
        match table.column_index(col) {
            Some(idx) => other_positions.push((col.as_str(), idx)),
            None => warn!(
                "extract_rows: state {}: column {:?} is missing from the data",
                metadata.state(),
                col
            ),
        }
    }

    let mut records: Vec<Record> = Vec::with_capacity(table.len());
    for row in table.rows() {
        let mut record = Record::new();
        for (col, pos) in key_positions.iter() {
            let raw = pos.map(|p| row[p].clone()).unwrap_or(Value::Null);
            let v = if NUMERIC_LOOKING_KEYS.contains(col) {
                normalize_key_text(&raw)
            } else {
                raw
            };
            record = record.with(col, fill_key(v));
        }
        for (col, pos) in other_positions.iter() {
            record = record.with(col, row[*pos].clone());
        }
        records.push(record);
    }

    let mut seen: HashSet<Vec<Value>> = HashSet::new();
    let raw_count = records.len();
    let deduplicated: Vec<Record> = records
        .into_iter()
        .filter(|r| seen.insert(r.key(&PRIMARY_KEY_COLUMNS)))
        .collect();
    warn!(
        "There are {} records in the raw precinct data, and {} after de-duplicating",
        raw_count,
        deduplicated.len()
    );
    deduplicated
}

/// Runs the row cleaners of the state on one record.
pub fn clean_record(record: Record, metadata: &StateMetadata) -> CleaningResult<Record> {
    let mut res = record;
    for cleaner in metadata.row_cleaners().iter() {
        res = cleaner.clean(res)?;
    }
    Ok(res)
}

/// Extracts the records of a normalized table and cleans them.
///
/// Fails on the first value that the cleaners cannot handle.
pub fn extract_records(table: &Table, metadata: &StateMetadata) -> CleaningResult<Vec<Record>> {
    let rows = extract_rows(table, metadata);
    debug!(
        "extract_records: state {}: cleaning {} records",
        metadata.state(),
        rows.len()
    );
    rows.into_iter()
        .map(|r| clean_record(r, metadata))
        .collect()
}
