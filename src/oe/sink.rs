// Destinations for the cleaned records.

use crate::oe::*;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};

use precinct_cleaning::{Record, Value};
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;

/// A store that records can be upserted into.
///
/// The whole batch is rejected if two of its records share a primary key.
pub trait Sink {
    /// Returns the number of records written.
    fn upsert(&mut self, table: &str, primary_key: &[&str], records: &[Record]) -> OeResult<usize>;
}

pub fn value_to_json(value: &Value) -> JSValue {
    match value {
        Value::Null => JSValue::Null,
        Value::Int(i) => json!(i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(JSValue::Number)
            .unwrap_or(JSValue::Null),
        Value::Text(s) => json!(s),
        Value::Bool(b) => json!(b),
        Value::Date(_) => json!(value.to_string()),
    }
}

pub fn record_to_json(record: &Record) -> JSValue {
    let mut m: JSMap<String, JSValue> = JSMap::new();
    for (name, value) in record.fields().iter() {
        m.insert(name.clone(), value_to_json(value));
    }
    JSValue::Object(m)
}

/// The records as JSON lines, in order.
pub fn records_to_json_lines(records: &[Record]) -> OeResult<String> {
    let mut res = String::new();
    for r in records.iter() {
        let line = serde_json::to_string(&record_to_json(r)).context(SerializingJsonSnafu {})?;
        res.push_str(&line);
        res.push('\n');
    }
    Ok(res)
}

fn collate(s: &str) -> String {
    s.trim().to_lowercase()
}

/// The primary key of a record, compared without case and surrounding
/// spaces.
pub fn collation_key(record: &Record, primary_key: &[&str]) -> Vec<String> {
    record
        .key(primary_key)
        .iter()
        .map(|v| collate(&v.to_string()))
        .collect()
}

fn json_collation_key(js: &JSValue, primary_key: &[&str]) -> Vec<String> {
    primary_key
        .iter()
        .map(|c| match js.get(c) {
            Some(JSValue::String(s)) => collate(s),
            Some(JSValue::Null) | None => String::new(),
            Some(x) => collate(&x.to_string()),
        })
        .collect()
}

fn check_batch(table: &str, primary_key: &[&str], records: &[Record]) -> OeResult<()> {
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    for r in records.iter() {
        let key = collation_key(r, primary_key);
        if seen.contains(&key) {
            return DuplicatePrimaryKeySnafu { table, key }.fail();
        }
        seen.insert(key);
    }
    Ok(())
}

/// Keeps the records in memory, by table.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    tables: BTreeMap<String, Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> MemorySink {
        MemorySink::default()
    }

    pub fn records(&self, table: &str) -> &[Record] {
        self.tables.get(table).map(|v| v.as_slice()).unwrap_or(&[])
    }
}

impl Sink for MemorySink {
    fn upsert(&mut self, table: &str, primary_key: &[&str], records: &[Record]) -> OeResult<usize> {
        check_batch(table, primary_key, records)?;
        let existing = self.tables.entry(table.to_string()).or_default();
        let mut positions: HashMap<Vec<String>, usize> = existing
            .iter()
            .enumerate()
            .map(|(idx, r)| (collation_key(r, primary_key), idx))
            .collect();
        for r in records.iter() {
            let key = collation_key(r, primary_key);
            match positions.get(&key) {
                Some(idx) => existing[*idx] = r.clone(),
                None => {
                    positions.insert(key, existing.len());
                    existing.push(r.clone());
                }
            }
        }
        Ok(records.len())
    }
}

/// Writes each table to `<output_dir>/<table>.jsonl`, one record per line.
///
/// The file is replaced at once, and the SHA-256 digest of its content is
/// written next to it.
#[derive(Debug, Clone)]
pub struct JsonLinesSink {
    output_dir: PathBuf,
}

impl JsonLinesSink {
    pub fn new(output_dir: &Path) -> JsonLinesSink {
        JsonLinesSink {
            output_dir: output_dir.to_path_buf(),
        }
    }

    pub fn table_path(&self, table: &str) -> PathBuf {
        self.output_dir.join(format!("{}.jsonl", table))
    }

    fn read_existing(&self, path: &Path) -> OeResult<Vec<JSValue>> {
        if !path.exists() {
            return Ok(Vec::new());
        }
        let p = path.display().to_string();
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path: &p })?;
        let mut res: Vec<JSValue> = Vec::new();
        for line in contents.lines().filter(|l| !l.trim().is_empty()) {
            res.push(serde_json::from_str(line).context(ParsingJsonSnafu { path: &p })?);
        }
        Ok(res)
    }
}

impl Sink for JsonLinesSink {
    fn upsert(&mut self, table: &str, primary_key: &[&str], records: &[Record]) -> OeResult<usize> {
        check_batch(table, primary_key, records)?;
        let path = self.table_path(table);
        let mut lines = self.read_existing(&path)?;
        let mut positions: HashMap<Vec<String>, usize> = lines
            .iter()
            .enumerate()
            .map(|(idx, js)| (json_collation_key(js, primary_key), idx))
            .collect();
        let mut replaced = 0;
        for r in records.iter() {
            let key = collation_key(r, primary_key);
            let js = record_to_json(r);
            match positions.get(&key) {
                Some(idx) => {
                    lines[*idx] = js;
                    replaced += 1;
                }
                None => {
                    positions.insert(key, lines.len());
                    lines.push(js);
                }
            }
        }

        let mut payload = String::new();
        for js in lines.iter() {
            payload.push_str(&js.to_string());
            payload.push('\n');
        }
        let p = path.display().to_string();
        fs::create_dir_all(&self.output_dir).context(WritingSinkSnafu {
            path: self.output_dir.display().to_string(),
        })?;
        let tmp_path = self.output_dir.join(format!("{}.jsonl.tmp", table));
        fs::write(&tmp_path, payload.as_bytes()).context(WritingSinkSnafu {
            path: tmp_path.display().to_string(),
        })?;
        fs::rename(&tmp_path, &path).context(WritingSinkSnafu { path: &p })?;

        let digest = sha256::digest(payload.as_str());
        let digest_path = self.output_dir.join(format!("{}.jsonl.sha256", table));
        fs::write(&digest_path, format!("{}\n", digest)).context(WritingSinkSnafu {
            path: digest_path.display().to_string(),
        })?;
        info!(
            "Wrote {} records to {} ({} replaced, {} total), sha256: {}",
            records.len(),
            p,
            replaced,
            lines.len(),
            digest
        );
        Ok(records.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PK: [&str; 2] = ["county", "candidate"];

    fn rec(county: &str, candidate: &str, votes: i64) -> Record {
        Record::new()
            .with("county", Value::text(county))
            .with("candidate", Value::text(candidate))
            .with("votes", Value::Int(votes))
    }

    #[test]
    fn memory_sink_upserts() {
        let mut sink = MemorySink::new();
        sink.upsert("t", &PK, &[rec("Pima", "A", 1), rec("Pima", "B", 2)])
            .unwrap();
        sink.upsert("t", &PK, &[rec("pima ", "A", 5)]).unwrap();
        let records = sink.records("t");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get("votes"), Some(&Value::Int(5)));
        assert!(sink.records("other").is_empty());
    }

    #[test]
    fn duplicates_are_rejected_under_collation() {
        let mut sink = MemorySink::new();
        let res = sink.upsert("t", &PK, &[rec("Pima", "A", 1), rec("PIMA", "a ", 2)]);
        match res {
            Err(OeError::DuplicatePrimaryKey { key, .. }) => {
                assert_eq!(key, vec!["pima".to_string(), "a".to_string()])
            }
            x => panic!("unexpected {:?}", x),
        }
        assert!(sink.records("t").is_empty());
    }

    #[test]
    fn json_lines_sink() {
        let tmp = tempfile::tempdir().unwrap();
        let mut sink = JsonLinesSink::new(&tmp.path().join("out"));
        sink.upsert("t", &PK, &[rec("Pima", "A", 1), rec("Yuma", "B", 2)])
            .unwrap();
        sink.upsert("t", &PK, &[rec("Yuma", "B", 3), rec("Gila", "C", 4)])
            .unwrap();
        let path = sink.table_path("t");
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<JSValue> = content
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1]["votes"], json!(3));
        assert_eq!(lines[2]["county"], json!("Gila"));
        let digest = fs::read_to_string(tmp.path().join("out/t.jsonl.sha256")).unwrap();
        assert_eq!(digest.trim(), sha256::digest(content.as_str()));
        assert!(!tmp.path().join("out/t.jsonl.tmp").exists());

        // A rejected batch leaves the file untouched.
        let res = sink.upsert("t", &PK, &[rec("Gila", "C", 1), rec("Gila", "C", 2)]);
        assert!(res.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), content);
    }

    #[test]
    fn json_values() {
        let d = chrono::NaiveDate::from_ymd_opt(2016, 11, 8).unwrap();
        assert_eq!(value_to_json(&Value::Date(d)), json!("2016-11-08"));
        assert_eq!(value_to_json(&Value::Null), JSValue::Null);
        assert_eq!(value_to_json(&Value::Float(f64::NAN)), JSValue::Null);
        assert_eq!(value_to_json(&Value::Bool(true)), json!(true));
    }
}
