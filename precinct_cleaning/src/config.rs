// ********* Configuration data structures ***********

use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Debug, Display};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::table::{Record, Table};

/// The columns that identify a result row, in the order of the composite key.
pub const PRIMARY_KEY_COLUMNS: [&str; 11] = [
    "state",
    "year",
    "date",
    "election",
    "special",
    "office",
    "district",
    "county",
    "precinct",
    "party",
    "candidate",
];

pub const VOTES_COLUMN: &str = "votes";

/// Placeholder for a missing primary key component.
pub const DEFAULT_PK_VALUE: &str = "NA";

/// The name of the table the national precinct data is loaded into.
pub const NATIONAL_TABLE: &str = "national_voting_data";

/// The closed set of states that can be processed.
pub const STATES: [&str; 50] = [
    "al", "ak", "az", "ar", "ca", "co", "ct", "de", "fl", "ga", "hi", "id", "il", "in", "ia", "ks",
    "ky", "la", "me", "md", "ma", "mi", "mn", "ms", "mo", "mt", "ne", "nv", "nh", "nj", "nm", "ny",
    "nc", "nd", "oh", "ok", "or", "pa", "ri", "sc", "sd", "tn", "tx", "ut", "vt", "va", "wa", "wv",
    "wi", "wy",
];

pub fn is_known_state(state: &str) -> bool {
    STATES.contains(&state)
}

/// Errors that stop the cleaning of a state or of a file.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum CleaningError {
    UnknownState {
        state: String,
    },
    /// Strict resolution was requested and the state has no override.
    MissingOverride {
        state: String,
    },
    InvalidOverride {
        state: String,
        reason: String,
    },
    InvalidMetadata {
        state: String,
        reason: String,
    },
    MalformedFilename {
        filename: String,
    },
    StateMismatch {
        filename: String,
        expected: String,
        found: String,
    },
    InvalidDate {
        filename: String,
        raw: String,
    },
    /// A vote count that none of the cleaners could make sense of.
    InvalidNumericValue {
        value: String,
    },
}

impl Error for CleaningError {}

impl Display for CleaningError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CleaningError::UnknownState { state } => {
                write!(f, "State {:?} is not one of the supported states", state)
            }
            CleaningError::MissingOverride { state } => {
                write!(f, "No override registered for state {:?}", state)
            }
            CleaningError::InvalidOverride { state, reason } => {
                write!(f, "Invalid override for state {:?}: {}", state, reason)
            }
            CleaningError::InvalidMetadata { state, reason } => {
                write!(f, "Invalid metadata for state {:?}: {}", state, reason)
            }
            CleaningError::MalformedFilename { filename } => {
                write!(f, "Cannot extract election metadata from file name {:?}", filename)
            }
            CleaningError::StateMismatch {
                filename,
                expected,
                found,
            } => write!(
                f,
                "File {:?} is for state {:?}, expected state {:?}",
                filename, found, expected
            ),
            CleaningError::InvalidDate { filename, raw } => {
                write!(f, "File {:?}: cannot parse date {:?}", filename, raw)
            }
            CleaningError::InvalidNumericValue { value } => {
                write!(f, "{:?} is not a valid numeric value", value)
            }
        }
    }
}

pub type CleaningResult<T> = Result<T, CleaningError>;

/// A table-level step. It receives the whole table of a file and returns the
/// transformed table.
pub trait TableTransformer: Debug + Send + Sync {
    fn name(&self) -> &str;
    fn transform(&self, table: Table) -> CleaningResult<Table>;
}

/// A row-level step, run on each output record after deduplication.
pub trait RowCleaner: Debug + Send + Sync {
    fn name(&self) -> &str;
    fn clean(&self, record: Record) -> CleaningResult<Record>;
}

pub type SharedTransformer = Arc<dyn TableTransformer>;
pub type SharedCleaner = Arc<dyn RowCleaner>;

/// State specific customizations of the generic pipeline.
///
/// All the fields are optional. The lists are merged with the generic
/// configuration by [crate::builder::Builder::resolve].
#[derive(Debug, Clone, Default)]
pub struct StateOverride {
    pub excluded_files: Vec<String>,
    pub columns: Vec<String>,
    pub vote_columns: Vec<String>,
    pub table_transformers: Vec<SharedTransformer>,
    pub row_cleaners: Vec<SharedCleaner>,
}

impl StateOverride {
    pub fn excluded_files(mut self, files: &[&str]) -> StateOverride {
        self.excluded_files
            .extend(files.iter().map(|s| s.to_string()));
        self
    }

    pub fn transformer<T: TableTransformer + 'static>(mut self, t: T) -> StateOverride {
        self.table_transformers.push(Arc::new(t));
        self
    }

    pub fn cleaner<C: RowCleaner + 'static>(mut self, c: C) -> StateOverride {
        self.row_cleaners.push(Arc::new(c));
        self
    }

    /// Appends everything from another override after the current content.
    pub fn extend(&mut self, other: StateOverride) {
        self.excluded_files.extend(other.excluded_files);
        self.columns.extend(other.columns);
        self.vote_columns.extend(other.vote_columns);
        self.table_transformers.extend(other.table_transformers);
        self.row_cleaners.extend(other.row_cleaners);
    }

    /// Checks the shape of the override, given the generic columns it will be
    /// merged with.
    pub fn validate(&self, state: &str, generic_columns: &[String]) -> CleaningResult<()> {
        let invalid = |reason: String| CleaningError::InvalidOverride {
            state: state.to_string(),
            reason,
        };
        for f in self.excluded_files.iter() {
            if f.trim().is_empty() || !f.ends_with(".csv") || f.contains('/') {
                return Err(invalid(format!("{:?} is not a data file name", f)));
            }
        }
        for c in self.columns.iter().chain(self.vote_columns.iter()) {
            if c.trim().is_empty() {
                return Err(invalid("blank column name".to_string()));
            }
        }
        for vc in self.vote_columns.iter() {
            if !self.columns.contains(vc) && !generic_columns.contains(vc) {
                return Err(invalid(format!(
                    "vote column {:?} is not an expected column",
                    vc
                )));
            }
        }
        Ok(())
    }
}

/// Everything needed to process the files of one state.
///
/// Built by [crate::builder::Builder]. Apart from the source directory, it does
/// not change after construction.
#[derive(Debug, Clone)]
pub struct StateMetadata {
    source_dir: PathBuf,
    state: String,
    expected_columns: Vec<String>,
    vote_columns: Vec<String>,
    table_transformers: Vec<SharedTransformer>,
    row_cleaners: Vec<SharedCleaner>,
    excluded_files: HashSet<String>,
}

impl StateMetadata {
    pub(crate) fn new(
        source_dir: PathBuf,
        state: String,
        expected_columns: Vec<String>,
        vote_columns: Vec<String>,
        table_transformers: Vec<SharedTransformer>,
        row_cleaners: Vec<SharedCleaner>,
        excluded_files: HashSet<String>,
    ) -> CleaningResult<StateMetadata> {
        if !is_known_state(&state) {
            return Err(CleaningError::UnknownState { state });
        }
        if let Some(vc) = vote_columns
            .iter()
            .find(|vc| !expected_columns.contains(vc))
        {
            return Err(CleaningError::InvalidMetadata {
                state,
                reason: format!("vote column {:?} is not an expected column", vc),
            });
        }
        Ok(StateMetadata {
            source_dir,
            state,
            expected_columns,
            vote_columns,
            table_transformers,
            row_cleaners,
            excluded_files,
        })
    }

    pub fn source_dir(&self) -> &Path {
        self.source_dir.as_path()
    }

    pub fn set_source_dir(&mut self, dir: PathBuf) {
        self.source_dir = dir;
    }

    /// The lowercase state code.
    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn expected_columns(&self) -> &[String] {
        &self.expected_columns
    }

    pub fn vote_columns(&self) -> &[String] {
        &self.vote_columns
    }

    pub fn table_transformers(&self) -> &[SharedTransformer] {
        &self.table_transformers
    }

    pub fn row_cleaners(&self) -> &[SharedCleaner] {
        &self.row_cleaners
    }

    pub fn is_excluded(&self, filename: &str) -> bool {
        self.excluded_files.contains(filename)
    }

    /// The excluded files, sorted.
    pub fn excluded_files(&self) -> Vec<&str> {
        let mut l: Vec<&str> = self.excluded_files.iter().map(|s| s.as_str()).collect();
        l.sort_unstable();
        l
    }
}
