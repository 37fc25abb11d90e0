// Checks the raw files of a state against a per-year schema.

use crate::oe::*;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Serialize;

use crate::oe::io_common::{DiscoveredFile, FileDiscovery};
use crate::oe::io_csv::{read_table, ParseFailureKind};

/// The optional file, at the root of a state directory, that extends the
/// schema for some years.
pub const SCHEMA_DEF_FILENAME: &str = "column_types.csv";

#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize)]
pub enum ColumnType {
    #[serde(rename = "string")]
    Str,
    #[serde(rename = "integer")]
    Integer,
}

impl ColumnType {
    fn parse(s: &str) -> Option<ColumnType> {
        match s.trim() {
            "string" => Some(ColumnType::Str),
            "integer" => Some(ColumnType::Integer),
            _ => None,
        }
    }
}

pub type ColumnSchema = BTreeMap<String, ColumnType>;

#[derive(Eq, PartialEq, Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum SchemaException {
    FileEncoding { message: String },
    FileFormat { message: String },
    ColumnMissing { column: String },
    ValueType {
        column: String,
        #[serde(rename = "columnType")]
        column_type: ColumnType,
        /// Position of the row -> value
        values: BTreeMap<usize, String>,
    },
}

pub fn base_schema() -> ColumnSchema {
    let mut res = ColumnSchema::new();
    res.insert("office".to_string(), ColumnType::Str);
    res.insert("district".to_string(), ColumnType::Integer);
    res.insert("county".to_string(), ColumnType::Str);
    res.insert("precinct".to_string(), ColumnType::Str);
    res.insert("party".to_string(), ColumnType::Str);
    res.insert("candidate".to_string(), ColumnType::Str);
    res.insert("votes".to_string(), ColumnType::Integer);
    res
}

/// The schema of each year: the base schema, extended by the definition file
/// if there is one.
pub fn read_schema_def(source_dir: &Path, years: &[i64]) -> OeResult<BTreeMap<i64, ColumnSchema>> {
    let mut res: BTreeMap<i64, ColumnSchema> =
        years.iter().map(|y| (*y, base_schema())).collect();
    let p = source_dir.join(SCHEMA_DEF_FILENAME);
    if !p.exists() {
        return Ok(res);
    }
    let path = p.display().to_string();
    let mut rdr = csv::Reader::from_path(&p).context(ReadingSchemaDefSnafu { path: &path })?;
    let headers: Vec<String> = rdr
        .headers()
        .context(ReadingSchemaDefSnafu { path: &path })?
        .iter()
        .map(|s| s.trim().to_string())
        .collect();
    let expected = ["year", "column", "type"];
    if let Some(h) = headers.iter().find(|h| !expected.contains(&h.as_str())) {
        return InvalidSchemaDefSnafu {
            path,
            reason: format!("unexpected column {:?}, expected {:?}", h, expected),
        }
        .fail();
    }
    let position = |name: &str| headers.iter().position(|h| h == name);
    let (year_idx, col_idx, type_idx) = match (position("year"), position("column"), position("type")) {
        (Some(y), Some(c), Some(t)) => (y, c, t),
        _ => {
            return InvalidSchemaDefSnafu {
                path,
                reason: format!("expected columns {:?}", expected),
            }
            .fail()
        }
    };
    for record_r in rdr.records() {
        let record = record_r.context(ReadingSchemaDefSnafu { path: &path })?;
        let field = |idx: usize| record.get(idx).unwrap_or_default().trim().to_string();
        let year = match field(year_idx).parse::<i64>() {
            Ok(y) => y,
            Err(_) => {
                return InvalidSchemaDefSnafu {
                    path,
                    reason: format!("invalid year {:?}", field(year_idx)),
                }
                .fail()
            }
        };
        let column_type = match ColumnType::parse(&field(type_idx)) {
            Some(t) => t,
            None => {
                return InvalidSchemaDefSnafu {
                    path,
                    reason: format!("type {:?} is not supported", field(type_idx)),
                }
                .fail()
            }
        };
        res.entry(year)
            .or_insert_with(base_schema)
            .insert(field(col_idx), column_type);
    }
    Ok(res)
}

fn validate_file(path: &Path, schema: &ColumnSchema) -> Vec<SchemaException> {
    let table = match read_table(path) {
        Ok(t) => t,
        Err(f) if f.kind == ParseFailureKind::Encoding => {
            return vec![SchemaException::FileEncoding { message: f.message }]
        }
        Err(f) => return vec![SchemaException::FileFormat { message: f.message }],
    };
    let mut res: Vec<SchemaException> = Vec::new();
    let mut present: Vec<(&String, &ColumnType)> = Vec::new();
    for (column, column_type) in schema.iter() {
        if table.has_column(column) {
            present.push((column, column_type));
        } else {
            debug!("Column {} missing from file {}", column, path.display());
            res.push(SchemaException::ColumnMissing {
                column: column.clone(),
            });
        }
    }
    for (column, column_type) in present {
        if *column_type != ColumnType::Integer {
            continue;
        }
        let mut errors: BTreeMap<usize, String> = BTreeMap::new();
        for (idx, v) in table.column_values(column).unwrap_or_default().iter().enumerate() {
            if let Some(s) = v.as_text() {
                if s.trim().parse::<i64>().is_err() {
                    errors.insert(idx, s.to_string());
                }
            }
        }
        if !errors.is_empty() {
            res.push(SchemaException::ValueType {
                column: column.clone(),
                column_type: *column_type,
                values: errors,
            });
        }
    }
    res
}

/// Checks all the files of the given years (all the years if empty). Only the
/// files with exceptions are returned.
pub fn check_schema(
    source_dir: &Path,
    state: &str,
    years: &[i64],
) -> OeResult<BTreeMap<String, Vec<SchemaException>>> {
    let files: Vec<DiscoveredFile> = FileDiscovery::new(source_dir)?
        .iter()
        .collect::<OeResult<Vec<DiscoveredFile>>>()?;
    let all_years: Vec<i64> = files
        .iter()
        .map(|f| f.year)
        .collect::<BTreeSet<i64>>()
        .into_iter()
        .collect();
    let schema_def = read_schema_def(source_dir, &all_years)?;
    let base = base_schema();
    let mut res: BTreeMap<String, Vec<SchemaException>> = BTreeMap::new();
    for f in files.iter() {
        if !years.is_empty() && !years.contains(&f.year) {
            continue;
        }
        let schema = schema_def.get(&f.year).unwrap_or(&base);
        let exceptions = validate_file(&f.path(), schema);
        if !exceptions.is_empty() {
            for e in exceptions.iter() {
                error!("State {}: {}: {:?}", state, f.path().display(), e);
            }
            res.insert(f.path().display().to_string(), exceptions);
        }
    }
    Ok(res)
}
