// Data quality reports, before and after cleaning.

use crate::oe::*;

use std::collections::BTreeSet;

use precinct_cleaning::coerce::is_numeric;
use precinct_cleaning::source::SourceFile;
use precinct_cleaning::{clean_record, extract_rows, Record, Table, Value};
use serde::Serialize;

use crate::oe::io_common::discover_source_files;
use crate::oe::io_csv::{failure, read_table, FileParseFailure, ParseFailureKind};

/// A vote value that is missing or does not look like a number.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, PartialOrd, Ord)]
pub struct Discrepancy {
    pub state: String,
    pub filepath: String,
    /// 1-based position in the table (pre-clean) or in the de-duplicated records
    /// (post-clean) of the file.
    pub line_number: usize,
    pub column_name: String,
    pub present: bool,
    pub type_check: bool,
    pub value: String,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Default)]
pub struct IntegrityReport {
    #[serde(rename = "parseFailures")]
    pub parse_failures: Vec<FileParseFailure>,
    pub discrepancies: Vec<Discrepancy>,
}

impl IntegrityReport {
    fn from_sets(
        parse_failures: BTreeSet<FileParseFailure>,
        discrepancies: BTreeSet<Discrepancy>,
    ) -> IntegrityReport {
        IntegrityReport {
            parse_failures: parse_failures.into_iter().collect(),
            discrepancies: discrepancies.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.parse_failures.is_empty() && self.discrepancies.is_empty()
    }

    /// Combines the reports of several states.
    pub fn merge(reports: Vec<IntegrityReport>) -> IntegrityReport {
        let mut failures: BTreeSet<FileParseFailure> = BTreeSet::new();
        let mut discrepancies: BTreeSet<Discrepancy> = BTreeSet::new();
        for r in reports {
            failures.extend(r.parse_failures);
            discrepancies.extend(r.discrepancies);
        }
        IntegrityReport::from_sets(failures, discrepancies)
    }
}

fn discrepancy(sf: &SourceFile, line_number: usize, column: &str, value: Option<&Value>) -> Discrepancy {
    Discrepancy {
        state: sf.metadata().state().to_string(),
        filepath: sf.filepath().display().to_string(),
        line_number,
        column_name: column.to_string(),
        present: value.is_some(),
        type_check: false,
        value: value.map(|v| v.to_string()).unwrap_or_default(),
    }
}

/// A table that cannot be normalized is reported like a file that cannot be
/// parsed.
fn normalize(sf: &SourceFile, raw: Table) -> Result<Table, FileParseFailure> {
    sf.normalize_table(raw).map_err(|e| {
        warn!("Cannot normalize {}: {}", sf.filepath().display(), e);
        failure(sf.filepath(), ParseFailureKind::Cleaning, e.to_string())
    })
}

/// Checks the vote columns of all the precinct files of a state, including
/// the excluded ones, before any cleaning of the values.
pub fn pre_clean_report(metadata: &StateMetadata) -> OeResult<IntegrityReport> {
    let mut failures: BTreeSet<FileParseFailure> = BTreeSet::new();
    let mut discrepancies: BTreeSet<Discrepancy> = BTreeSet::new();
    for sf in discover_source_files(metadata)?.iter() {
        let raw = match read_table(sf.filepath()) {
            Ok(t) => t,
            Err(f) => {
                warn!("pre_clean_report: cannot parse {}: {}", f.filepath, f.message);
                failures.insert(f);
                continue;
            }
        };
        let table = match normalize(sf, raw) {
            Ok(t) => t,
            Err(f) => {
                failures.insert(f);
                continue;
            }
        };
        let vote_positions: Vec<(&str, usize)> = metadata
            .vote_columns()
            .iter()
            .filter_map(|c| table.column_index(c).map(|idx| (c.as_str(), idx)))
            .collect();
        for (idx, row) in table.rows().iter().enumerate() {
            for (col, pos) in vote_positions.iter() {
                if !is_numeric(&row[*pos]) {
                    discrepancies.insert(discrepancy(sf, idx + 1, col, Some(&row[*pos])));
                }
            }
        }
    }
    let res = IntegrityReport::from_sets(failures, discrepancies);
    info!(
        "pre_clean_report: state {}: {} parse failures, {} discrepancies",
        metadata.state(),
        res.parse_failures.len(),
        res.discrepancies.len()
    );
    Ok(res)
}

/// Runs the extraction file by file and checks the vote columns of the
/// cleaned records. Values rejected by the cleaning are reported instead of
/// stopping the report.
pub fn post_clean_report(metadata: &StateMetadata) -> OeResult<IntegrityReport> {
    let mut failures: BTreeSet<FileParseFailure> = BTreeSet::new();
    let mut discrepancies: BTreeSet<Discrepancy> = BTreeSet::new();
    for sf in discover_source_files(metadata)?.iter() {
        if sf.excluded() {
            debug!("post_clean_report: skipping excluded file {}", sf.filepath().display());
            continue;
        }
        let raw = match read_table(sf.filepath()) {
            Ok(t) => t,
            Err(f) => {
                failures.insert(f);
                continue;
            }
        };
        let table = match normalize(sf, raw) {
            Ok(t) => t,
            Err(f) => {
                failures.insert(f);
                continue;
            }
        };
        for (idx, record) in extract_rows(&table, metadata).into_iter().enumerate() {
            check_record(sf, idx + 1, record, &mut discrepancies)?;
        }
    }
    let res = IntegrityReport::from_sets(failures, discrepancies);
    info!(
        "post_clean_report: state {}: {} parse failures, {} discrepancies",
        metadata.state(),
        res.parse_failures.len(),
        res.discrepancies.len()
    );
    Ok(res)
}

fn check_record(
    sf: &SourceFile,
    line_number: usize,
    record: Record,
    discrepancies: &mut BTreeSet<Discrepancy>,
) -> OeResult<()> {
    let metadata = sf.metadata();
    match clean_record(record.clone(), metadata) {
        Ok(cleaned) => {
            for col in metadata.vote_columns().iter() {
                match cleaned.get(col) {
                    Some(v) if is_numeric(v) => {}
                    v => {
                        discrepancies.insert(discrepancy(sf, line_number, col, v));
                    }
                }
            }
            Ok(())
        }
        Err(CleaningError::InvalidNumericValue { value }) => {
            // The column that holds the offending value, if it can be found.
            let column = metadata
                .vote_columns()
                .iter()
                .find(|c| record.get(c).map(|v| v.to_string()) == Some(value.clone()))
                .or_else(|| metadata.vote_columns().first())
                .cloned()
                .unwrap_or_default();
            discrepancies.insert(discrepancy(
                sf,
                line_number,
                &column,
                Some(&Value::Text(value)),
            ));
            Ok(())
        }
        Err(e) => Err(e).context(CleaningSnafu {
            state: metadata.state(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use precinct_cleaning::builder::Builder;
    use precinct_cleaning::states::StateOverrideRegistry;
    use precinct_cleaning::{CleaningResult, TableTransformer};

    #[derive(Debug)]
    struct RejectEverything;

    impl TableTransformer for RejectEverything {
        fn name(&self) -> &str {
            "reject_everything"
        }

        fn transform(&self, _table: Table) -> CleaningResult<Table> {
            Err(CleaningError::InvalidNumericValue {
                value: "?".to_string(),
            })
        }
    }

    fn write_ny_file(root: &std::path::Path, content: &str) -> String {
        let dir = root.join("openelections-data-ny/2016");
        fs::create_dir_all(&dir).unwrap();
        let p = dir.join("20161108__ny__general__kings__precinct.csv");
        fs::write(&p, content).unwrap();
        p.display().to_string()
    }

    #[test]
    fn breakout_tokens_are_findings() {
        let tmp = tempfile::tempdir().unwrap();
        let p = write_ny_file(
            tmp.path(),
            "precinct,candidate,election_day,absentee\n1,A,S,3\n1,B,4,3\n",
        );
        let metadata = Builder::national_precinct("ny")
            .unwrap()
            .base_dir(tmp.path())
            .resolve(&StateOverrideRegistry::builtin(), true)
            .unwrap();

        let pre = pre_clean_report(&metadata).unwrap();
        assert!(pre.parse_failures.is_empty());
        assert_eq!(pre.discrepancies.len(), 1);
        assert_eq!(pre.discrepancies[0].filepath, p);
        assert_eq!(pre.discrepancies[0].line_number, 1);
        assert_eq!(pre.discrepancies[0].value, "S");

        // The state cleaners null the token.
        let post = post_clean_report(&metadata).unwrap();
        assert!(post.is_empty(), "{:?}", post);
    }

    #[test]
    fn normalization_failures_are_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let p = write_ny_file(tmp.path(), "precinct,candidate,votes\n1,A,3\n");
        let metadata = Builder::national_precinct("ny")
            .unwrap()
            .base_dir(tmp.path())
            .table_transformer(RejectEverything)
            .resolve(&StateOverrideRegistry::builtin(), true)
            .unwrap();
        for report in [
            pre_clean_report(&metadata).unwrap(),
            post_clean_report(&metadata).unwrap(),
        ] {
            assert!(report.discrepancies.is_empty());
            assert_eq!(report.parse_failures.len(), 1);
            assert_eq!(report.parse_failures[0].filepath, p);
            assert_eq!(report.parse_failures[0].kind, ParseFailureKind::Cleaning);
        }
    }
}
