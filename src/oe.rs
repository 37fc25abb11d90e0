use log::{debug, error, info, warn};

use precinct_cleaning::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

pub mod config_reader;
pub mod integrity;
pub mod io_common;
pub mod io_csv;
pub mod schema_check;
pub mod sink;

use crate::oe::config_reader::LoadConfig;
use crate::oe::integrity::IntegrityReport;
use crate::oe::io_common::discover_source_files;
use crate::oe::io_csv::{read_table, FileParseFailure};
use crate::oe::schema_check::SchemaException;
use crate::oe::sink::{records_to_json_lines, Sink};

#[derive(Debug, Snafu)]
pub enum OeError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON from {path}"))]
    ParsingJson {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error serializing JSON"))]
    SerializingJson { source: serde_json::Error },
    #[snafu(display("Cannot read the source directory {path}"))]
    ReadingSourceDir {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Cleaning failed for state {state}"))]
    Cleaning {
        source: CleaningError,
        state: String,
    },
    #[snafu(display("Error writing {path}"))]
    WritingSink {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Duplicate primary key in table {table}: {key:?}"))]
    DuplicatePrimaryKey { table: String, key: Vec<String> },
    #[snafu(display("Error reading the schema definition {path}"))]
    ReadingSchemaDef { source: csv::Error, path: String },
    #[snafu(display("Invalid schema definition {path}: {reason}"))]
    InvalidSchemaDef { path: String, reason: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type OeResult<T> = Result<T, OeError>;

/// A readable description of the resolved metadata of a state.
pub fn describe_metadata(metadata: &StateMetadata) -> JSValue {
    json!({
        "state": metadata.state(),
        "sourceDirectory": metadata.source_dir().display().to_string(),
        "expectedColumns": metadata.expected_columns(),
        "voteColumns": metadata.vote_columns(),
        "tableTransformers": metadata.table_transformers().iter().map(|t| t.name()).collect::<Vec<_>>(),
        "rowCleaners": metadata.row_cleaners().iter().map(|c| c.name()).collect::<Vec<_>>(),
        "excludedFiles": metadata.excluded_files(),
    })
}

/// A file that contributed rows to a load.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedFile {
    pub filepath: String,
    pub year: i64,
    pub date: String,
    pub election: String,
    pub special: bool,
    pub rows: usize,
}

/// All the data of a state, in one table.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub table: Table,
    pub files: Vec<LoadedFile>,
    pub excluded: Vec<String>,
    pub failures: Vec<FileParseFailure>,
}

/// Reads and normalizes all the precinct files of a state that are not
/// excluded, and stacks them.
pub fn assemble_state(metadata: &StateMetadata) -> OeResult<Assembly> {
    let mut tables: Vec<Table> = Vec::new();
    let mut files: Vec<LoadedFile> = Vec::new();
    let mut excluded: Vec<String> = Vec::new();
    let mut failures: Vec<FileParseFailure> = Vec::new();
    for sf in discover_source_files(metadata)?.iter() {
        let p = sf.filepath().display().to_string();
        if sf.excluded() {
            info!("Skipping excluded file {}", p);
            excluded.push(p);
            continue;
        }
        let raw = match read_table(sf.filepath()) {
            Ok(t) => t,
            Err(f) => {
                warn!("Cannot parse {} ({:?}): {}", p, f.kind, f.message);
                failures.push(f);
                continue;
            }
        };
        let table = sf.normalize_table(raw).context(CleaningSnafu {
            state: metadata.state(),
        })?;
        debug!(
            "assemble_state: {}: {:?} file, {} rows",
            p,
            sf.granularity(),
            table.len()
        );
        files.push(LoadedFile {
            filepath: p,
            year: sf.year(),
            date: sf.date().format("%Y-%m-%d").to_string(),
            election: sf.election().to_string(),
            special: sf.is_special(),
            rows: table.len(),
        });
        tables.push(table);
    }
    Ok(Assembly {
        table: Table::concat(tables),
        files,
        excluded,
        failures,
    })
}

/// Counts the records of a batch that match a duplicate key reported by a
/// sink, with the collation of the sinks.
pub fn diagnose_duplicate(key: &[String], primary_key: &[&str], records: &[Record]) -> usize {
    warn!("Checking for duplicate {:?}", key);
    let count = records
        .iter()
        .filter(|r| sink::collation_key(r, primary_key) == key)
        .count();
    warn!("Found records {}", count);
    count
}

#[derive(Debug, Clone, Serialize)]
pub struct LoadSummary {
    pub state: String,
    pub table: String,
    pub files: Vec<LoadedFile>,
    #[serde(rename = "excludedFiles")]
    pub excluded_files: Vec<String>,
    #[serde(rename = "parseFailures")]
    pub parse_failures: Vec<FileParseFailure>,
    pub records: usize,
}

/// Discovers, cleans and loads the data of a state into the sink.
///
/// If a reference file is given, the records (as JSON lines) must match it
/// exactly, otherwise nothing is written.
pub fn load_state(
    config: &LoadConfig,
    state: &str,
    sink: &mut dyn Sink,
    reference: Option<String>,
) -> OeResult<LoadSummary> {
    let metadata = config.resolve(state)?;
    info!(
        "Loading state {} from {}",
        metadata.state(),
        metadata.source_dir().display()
    );
    let assembly = assemble_state(&metadata)?;
    let records = extract_records(&assembly.table, &metadata).context(CleaningSnafu {
        state: metadata.state(),
    })?;

    if let Some(ref_path) = reference {
        let payload = records_to_json_lines(&records)?;
        let ref_payload = fs::read_to_string(&ref_path).context(OpeningJsonSnafu { path: &ref_path })?;
        if ref_payload.trim_end() != payload.trim_end() {
            warn!("Found differences with the reference {}", ref_path);
            print_diff(ref_payload.trim_end(), payload.trim_end(), "\n");
            whatever!("Difference detected between the cleaned records and the reference")
        }
    }

    let table_name = config.table_name();
    match sink.upsert(&table_name, &PRIMARY_KEY_COLUMNS, &records) {
        Err(OeError::DuplicatePrimaryKey { table, key }) => {
            error!("Duplicate primary key in table {}: {:?}", table, key);
            diagnose_duplicate(&key, &PRIMARY_KEY_COLUMNS, &records);
            return DuplicatePrimaryKeySnafu { table, key }.fail();
        }
        x => x?,
    };

    Ok(LoadSummary {
        state: metadata.state().to_string(),
        table: table_name,
        files: assembly.files,
        excluded_files: assembly.excluded,
        parse_failures: assembly.failures,
        records: records.len(),
    })
}

pub fn pre_clean(config: &LoadConfig, states: &[String]) -> OeResult<IntegrityReport> {
    let mut reports: Vec<IntegrityReport> = Vec::new();
    for state in states.iter() {
        let metadata = config.resolve(state)?;
        reports.push(integrity::pre_clean_report(&metadata)?);
    }
    Ok(IntegrityReport::merge(reports))
}

pub fn post_clean(config: &LoadConfig, states: &[String]) -> OeResult<IntegrityReport> {
    let mut reports: Vec<IntegrityReport> = Vec::new();
    for state in states.iter() {
        let metadata = config.resolve(state)?;
        reports.push(integrity::post_clean_report(&metadata)?);
    }
    Ok(IntegrityReport::merge(reports))
}

pub fn check_state_schema(
    config: &LoadConfig,
    state: &str,
    years: &[i64],
) -> OeResult<std::collections::BTreeMap<String, Vec<SchemaException>>> {
    let metadata = config.resolve(state)?;
    schema_check::check_schema(metadata.source_dir(), metadata.state(), years)
}

/// Writes a JSON report to a file, or to the standard output.
pub fn write_report<T: Serialize>(report: &T, out: Option<&Path>) -> OeResult<()> {
    let pretty = serde_json::to_string_pretty(report).context(SerializingJsonSnafu {})?;
    match out {
        Some(p) => fs::write(p, pretty).context(WritingSinkSnafu {
            path: p.display().to_string(),
        }),
        None => {
            println!("{}", pretty);
            Ok(())
        }
    }
}
