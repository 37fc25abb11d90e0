// Primitives for reading CSV files.

use crate::oe::*;

use std::path::Path;

use precinct_cleaning::{Table, Value};
use serde::Serialize;

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, PartialOrd, Ord)]
pub enum ParseFailureKind {
    /// The content is not valid UTF-8.
    Encoding,
    /// The content is not a well-formed table.
    Format,
    Io,
    /// The table could not be normalized with the steps of the state.
    Cleaning,
}

/// A file that could not be turned into a table. This is not an error: the
/// file simply contributes no rows.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, PartialOrd, Ord)]
pub struct FileParseFailure {
    pub filepath: String,
    pub kind: ParseFailureKind,
    pub message: String,
}

pub fn failure(path: &Path, kind: ParseFailureKind, message: String) -> FileParseFailure {
    FileParseFailure {
        filepath: path.display().to_string(),
        kind,
        message,
    }
}

/// Reads a CSV file with a header line.
///
/// Empty cells are null, all the other cells are text. Lines shorter than the
/// header are padded with nulls, lines longer than the header are an error.
pub fn read_table(path: &Path) -> Result<Table, FileParseFailure> {
    let bytes = fs::read(path).map_err(|e| failure(path, ParseFailureKind::Io, e.to_string()))?;
    let content = String::from_utf8(bytes)
        .map_err(|e| failure(path, ParseFailureKind::Encoding, e.to_string()))?;
    let content = content.trim_start_matches('\u{feff}');
    if content.trim().is_empty() {
        return Err(failure(
            path,
            ParseFailureKind::Format,
            "empty file".to_string(),
        ));
    }
    parse_table(content).map_err(|(kind, message)| failure(path, kind, message))
}

fn parse_table(content: &str) -> Result<Table, (ParseFailureKind, String)> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());
    let headers: Vec<String> = rdr
        .headers()
        .map_err(csv_failure)?
        .iter()
        .map(|s| s.to_string())
        .collect();
    let mut table = Table::new(headers.clone());
    for (idx, record_r) in rdr.records().enumerate() {
        let record = record_r.map_err(csv_failure)?;
        // The header is line 1.
        let lineno = idx + 2;
        if record.len() > headers.len() {
            return Err((
                ParseFailureKind::Format,
                format!(
                    "line {}: expected {} fields, saw {}",
                    lineno,
                    headers.len(),
                    record.len()
                ),
            ));
        }
        let row: Vec<Value> = record
            .iter()
            .map(|s| if s.is_empty() { Value::Null } else { Value::text(s) })
            .collect();
        table.push_row(row);
    }
    debug!("parse_table: {} columns, {} rows", headers.len(), table.len());
    Ok(table)
}

fn csv_failure(e: csv::Error) -> (ParseFailureKind, String) {
    let kind = match e.kind() {
        csv::ErrorKind::Utf8 { .. } => ParseFailureKind::Encoding,
        csv::ErrorKind::Io(_) => ParseFailureKind::Io,
        _ => ParseFailureKind::Format,
    };
    (kind, e.to_string())
}
