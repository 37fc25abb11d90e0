use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use log::{debug, warn};

use crate::config::{CleaningResult, SharedTransformer, StateMetadata, TableTransformer};
use crate::filename::parse_precinct_filename;
use crate::steps::NormalizeColumnNames;
use crate::table::{Table, Value};

/// The level of aggregation of the results in a file.
///
/// This is informative only: all the files go through the same steps.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Granularity {
    Precinct,
    County,
    Office,
}

impl Granularity {
    /// Guesses the granularity from the tokens of a file name.
    pub fn of_filename(filename: &str) -> Granularity {
        let stem = filename.split('.').next().unwrap_or_default();
        let tokens: Vec<&str> = stem.split("__").collect();
        if tokens.iter().any(|t| *t == "precinct" || *t == "ward") {
            Granularity::Precinct
        } else if tokens.contains(&"county") {
            Granularity::County
        } else {
            Granularity::Office
        }
    }
}

/// One data file, bound to the metadata of its state.
#[derive(Debug, Clone)]
pub struct SourceFile<'a> {
    filepath: PathBuf,
    metadata: &'a StateMetadata,
    year: i64,
    date: NaiveDate,
    election: String,
    is_special: bool,
    excluded: bool,
    granularity: Granularity,
}

impl<'a> SourceFile<'a> {
    /// Binds a discovered precinct file to its metadata.
    ///
    /// Returns `Ok(None)` (and logs a warning) if the name does not describe a
    /// precinct file.
    pub fn from_filename(
        year: i64,
        dir: &Path,
        filename: &str,
        metadata: &'a StateMetadata,
    ) -> CleaningResult<Option<SourceFile<'a>>> {
        let parsed = match parse_precinct_filename(filename, metadata.state())? {
            Some(p) => p,
            None => {
                warn!(
                    "File {:?} in {} is a {:?} file, skipping",
                    filename,
                    dir.display(),
                    Granularity::of_filename(filename)
                );
                return Ok(None);
            }
        };
        Ok(Some(SourceFile {
            filepath: dir.join(filename),
            metadata,
            year,
            date: parsed.date,
            election: parsed.election,
            is_special: parsed.is_special,
            excluded: metadata.is_excluded(filename),
            granularity: Granularity::of_filename(filename),
        }))
    }

    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    pub fn metadata(&self) -> &StateMetadata {
        self.metadata
    }

    pub fn year(&self) -> i64 {
        self.year
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn election(&self) -> &str {
        &self.election
    }

    pub fn is_special(&self) -> bool {
        self.is_special
    }

    pub fn excluded(&self) -> bool {
        self.excluded
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// The table transformers of this file: the column name normalization
    /// followed by the transformers of the state.
    pub fn transformers(&self) -> Vec<SharedTransformer> {
        let mut res: Vec<SharedTransformer> = vec![Arc::new(NormalizeColumnNames)];
        res.extend(self.metadata.table_transformers().iter().cloned());
        res
    }

    /// Adds the election metadata of the file as columns.
    ///
    /// The names are already normalized, so that they take precedence over
    /// the columns of the same name in the file.
    pub fn enrich(&self, table: Table) -> Table {
        table
            .with_constant_column("state", Value::Text(self.metadata.state().to_uppercase()))
            .with_constant_column("year", Value::Int(self.year))
            .with_constant_column("date", Value::Date(self.date))
            .with_constant_column("election", Value::Text(self.election.clone()))
            .with_constant_column("special", Value::Bool(self.is_special))
            .with_constant_column(
                "filepath",
                Value::Text(self.filepath.to_string_lossy().to_string()),
            )
    }

    /// Turns the raw content of the file into a table with the normalized
    /// column names.
    pub fn normalize_table(&self, raw: Table) -> CleaningResult<Table> {
        let raw_len = raw.len();
        let deduped = raw.drop_duplicates();
        if deduped.len() != raw_len {
            debug!(
                "normalize_table: {}: dropped {} duplicate rows",
                self.filepath.display(),
                raw_len - deduped.len()
            );
        }
        let mut table = self.enrich(deduped);
        for t in self.transformers().iter() {
            debug!(
                "normalize_table: {}: applying {}",
                self.filepath.display(),
                t.name()
            );
            table = t.transform(table)?;
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::states::StateOverrideRegistry;

    fn t(s: &str) -> Value {
        Value::text(s)
    }

    #[test]
    fn enrichment_wins_over_file_columns() {
        let metadata = Builder::national_precinct("ny")
            .unwrap()
            .resolve(&StateOverrideRegistry::builtin(), false)
            .unwrap();
        let sf = SourceFile::from_filename(
            2016,
            Path::new("/data/2016"),
            "20160913__ny__republican__primary__richmond__precinct.csv",
            &metadata,
        )
        .unwrap()
        .unwrap();
        assert!(!sf.excluded());
        let raw = Table::from_rows(
            vec!["State".to_string(), "Candidate".to_string(), "Vote".to_string()],
            vec![
                vec![t("New York"), t("A"), t("1")],
                vec![t("New York"), t("A"), t("1")],
            ],
        );
        let res = sf.normalize_table(raw).unwrap();
        assert_eq!(res.len(), 1);
        assert_eq!(res.get(0, "state"), Some(&t("NY")));
        assert_eq!(res.get(0, "election"), Some(&t("primary")));
        assert_eq!(res.get(0, "year"), Some(&Value::Int(2016)));
        assert_eq!(res.get(0, "special"), Some(&Value::Bool(false)));
        assert_eq!(res.get(0, "candidate"), Some(&t("A")));
        // Generic rename.
        assert_eq!(res.get(0, "votes"), Some(&t("1")));
    }

    #[test]
    fn county_file_is_skipped() {
        let metadata = Builder::national_precinct("az")
            .unwrap()
            .resolve(&StateOverrideRegistry::builtin(), false)
            .unwrap();
        let sf = SourceFile::from_filename(
            2014,
            Path::new("/data/2014"),
            "20141104__az__general__county.csv",
            &metadata,
        )
        .unwrap();
        assert!(sf.is_none());
        assert_eq!(
            Granularity::of_filename("20141104__az__general__county.csv"),
            Granularity::County
        );
        assert_eq!(
            Granularity::of_filename("20141104__az__general__governor.csv"),
            Granularity::Office
        );
    }

    #[test]
    fn excluded_files_are_flagged() {
        let metadata = Builder::national_precinct("az")
            .unwrap()
            .resolve(&StateOverrideRegistry::builtin(), false)
            .unwrap();
        let sf = SourceFile::from_filename(
            2016,
            Path::new("/data/2016"),
            "20160322__az__primary__president__apache__precinct.csv",
            &metadata,
        )
        .unwrap()
        .unwrap();
        assert!(sf.excluded());
        assert_eq!(sf.election(), "primary");
        assert_eq!(sf.year(), 2016);
        assert_eq!(sf.date(), NaiveDate::from_ymd_opt(2016, 3, 22).unwrap());
        assert!(!sf.is_special());
        assert_eq!(sf.granularity(), Granularity::Precinct);
    }

    #[test]
    fn breakout_tokens_reach_the_state_cleaners() {
        let metadata = Builder::national_precinct("ny")
            .unwrap()
            .resolve(&StateOverrideRegistry::builtin(), true)
            .unwrap();
        let sf = SourceFile::from_filename(
            2016,
            Path::new("/data/2016"),
            "20161108__ny__general__kings__precinct.csv",
            &metadata,
        )
        .unwrap()
        .unwrap();
        let raw = Table::from_rows(
            vec![
                "candidate".to_string(),
                "election_day".to_string(),
                "absentee".to_string(),
            ],
            vec![vec![t("A"), t("S"), t("3")], vec![t("B"), t("4"), t("3")]],
        );
        let table = sf.normalize_table(raw).unwrap();
        assert_eq!(table.get(0, "votes"), Some(&t("S")));
        let records = crate::extract_records(&table, &metadata).unwrap();
        assert_eq!(records[0].get("votes"), Some(&Value::Null));
        assert_eq!(records[1].get("votes"), Some(&Value::Int(7)));
    }
}
