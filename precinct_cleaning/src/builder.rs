use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{debug, info};

pub use crate::config::*;
use crate::coerce::ValueCoercer;
use crate::states::StateOverrideRegistry;
use crate::steps::{CoerceVotesNumeric, RenameColumn};

/// Builds the metadata of a state from the generic configuration and the
/// override registered for the state.
///
/// ```
/// use precinct_cleaning::builder::Builder;
/// use precinct_cleaning::states::StateOverrideRegistry;
/// # use precinct_cleaning::CleaningError;
/// use std::path::Path;
///
/// let metadata = Builder::national_precinct("AZ")?
///     .base_dir(Path::new("/data"))
///     .resolve(&StateOverrideRegistry::builtin(), true)?;
///
/// assert_eq!(metadata.state(), "az");
/// assert!(metadata.is_excluded("20160322__az__primary__president__apache__precinct.csv"));
/// # Ok::<(), CleaningError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Builder {
    pub(crate) _state: String,
    pub(crate) _base_dir: PathBuf,
    pub(crate) _columns: Vec<String>,
    pub(crate) _vote_columns: Vec<String>,
    pub(crate) _table_transformers: Vec<SharedTransformer>,
    pub(crate) _row_cleaners: Vec<SharedCleaner>,
    /// When set, the cleaning of the rows ends with the coercion of all the
    /// vote columns.
    pub(crate) _vote_coercer: Option<ValueCoercer>,
}

impl Builder {
    /// A builder with no columns and no steps.
    pub fn new(state: &str) -> CleaningResult<Builder> {
        let state = state.trim().to_lowercase();
        if !is_known_state(&state) {
            return Err(CleaningError::UnknownState { state });
        }
        Ok(Builder {
            _state: state,
            _base_dir: PathBuf::from("."),
            _columns: Vec::new(),
            _vote_columns: Vec::new(),
            _table_transformers: Vec::new(),
            _row_cleaners: Vec::new(),
            _vote_coercer: None,
        })
    }

    /// The generic configuration of the national precinct table: the primary
    /// key and the votes, with `vote` accepted for `votes`.
    pub fn national_precinct(state: &str) -> CleaningResult<Builder> {
        let mut columns: Vec<&str> = PRIMARY_KEY_COLUMNS.to_vec();
        columns.push(VOTES_COLUMN);
        Ok(Builder::new(state)?
            .columns(&columns)
            .vote_columns(&[VOTES_COLUMN])
            .table_transformer(RenameColumn::new("vote", VOTES_COLUMN))
            .coerce_votes(ValueCoercer::default()))
    }

    pub fn base_dir(mut self, base_dir: &Path) -> Builder {
        self._base_dir = base_dir.to_path_buf();
        self
    }

    pub fn columns(mut self, columns: &[&str]) -> Builder {
        self._columns = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn vote_columns(mut self, columns: &[&str]) -> Builder {
        self._vote_columns = columns.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn table_transformer<T: TableTransformer + 'static>(mut self, t: T) -> Builder {
        self._table_transformers.push(Arc::new(t));
        self
    }

    pub fn row_cleaner<C: RowCleaner + 'static>(mut self, c: C) -> Builder {
        self._row_cleaners.push(Arc::new(c));
        self
    }

    pub fn coerce_votes(mut self, coercer: ValueCoercer) -> Builder {
        self._vote_coercer = Some(coercer);
        self
    }

    /// Extra generic values that the final vote coercion turns into nulls.
    pub fn null_vote_values(mut self, values: &[String]) -> Builder {
        self._vote_coercer = Some(
            self._vote_coercer
                .unwrap_or_default()
                .with_sentinels(values),
        );
        self
    }

    pub fn state(&self) -> &str {
        &self._state
    }

    /// Merges the generic configuration with the override of the state.
    ///
    /// In strict mode, a state without override is an error.
    pub fn resolve(
        &self,
        registry: &StateOverrideRegistry,
        strict: bool,
    ) -> CleaningResult<StateMetadata> {
        let state = self._state.clone();
        let empty = StateOverride::default();
        let state_override = match registry.get(&state) {
            Some(so) => {
                so.validate(&state, &self._columns)?;
                so
            }
            None if strict => return Err(CleaningError::MissingOverride { state }),
            None => {
                info!("No override for state {}, using the generic configuration", state);
                &empty
            }
        };

        let columns = merge_names(&self._columns, &state_override.columns);
        let vote_columns = merge_names(&self._vote_columns, &state_override.vote_columns);

        let mut table_transformers = self._table_transformers.clone();
        table_transformers.extend(state_override.table_transformers.iter().cloned());

        // State specific cleaners run first: they turn the quirks of the
        // state into values the generic cleaners understand.
        let mut row_cleaners = state_override.row_cleaners.clone();
        row_cleaners.extend(self._row_cleaners.iter().cloned());
        if let Some(coercer) = self._vote_coercer.as_ref() {
            row_cleaners.push(Arc::new(CoerceVotesNumeric {
                columns: vote_columns.clone(),
                coercer: coercer.clone(),
            }));
        }

        let excluded_files: HashSet<String> =
            state_override.excluded_files.iter().cloned().collect();

        let source_dir = self
            ._base_dir
            .join(format!("openelections-data-{}", state));
        debug!(
            "resolve: state: {} source_dir: {} columns: {:?} transformers: {:?} cleaners: {:?} excluded: {}",
            state,
            source_dir.display(),
            columns,
            table_transformers.iter().map(|t| t.name()).collect::<Vec<_>>(),
            row_cleaners.iter().map(|c| c.name()).collect::<Vec<_>>(),
            excluded_files.len()
        );
        StateMetadata::new(
            source_dir,
            state,
            columns,
            vote_columns,
            table_transformers,
            row_cleaners,
            excluded_files,
        )
    }
}

fn merge_names(generic: &[String], extra: &[String]) -> Vec<String> {
    let mut res: Vec<String> = Vec::with_capacity(generic.len() + extra.len());
    for n in generic.iter().chain(extra.iter()) {
        if !res.contains(n) {
            res.push(n.clone());
        }
    }
    res
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::NullVoteTokens;

    #[test]
    fn unknown_state() {
        assert_eq!(
            Builder::new("zz").err(),
            Some(CleaningError::UnknownState {
                state: "zz".to_string()
            })
        );
    }

    #[test]
    fn strict_requires_override() {
        let registry = StateOverrideRegistry::new();
        let b = Builder::national_precinct("al").unwrap();
        assert_eq!(
            b.resolve(&registry, true).err(),
            Some(CleaningError::MissingOverride {
                state: "al".to_string()
            })
        );
        let m = b.resolve(&registry, false).unwrap();
        assert_eq!(m.vote_columns(), &["votes".to_string()]);
        assert_eq!(m.expected_columns().len(), 12);
        assert!(m.excluded_files().is_empty());
    }

    #[test]
    fn source_dir_follows_layout() {
        let m = Builder::national_precinct("NY")
            .unwrap()
            .base_dir(Path::new("/srv/oe"))
            .resolve(&StateOverrideRegistry::builtin(), false)
            .unwrap();
        assert_eq!(m.source_dir(), Path::new("/srv/oe/openelections-data-ny"));
    }

    #[test]
    fn merge_order() {
        let mut registry = StateOverrideRegistry::new();
        let so = StateOverride {
            columns: vec!["votes".to_string(), "absentee".to_string()],
            vote_columns: vec!["absentee".to_string()],
            ..StateOverride::default()
        }
        .transformer(RenameColumn::new("total", "votes"))
        .cleaner(NullVoteTokens::new(&["X"]));
        registry.insert("ms", so).unwrap();
        let m = Builder::national_precinct("ms")
            .unwrap()
            .resolve(&registry, true)
            .unwrap();
        assert_eq!(m.expected_columns().last(), Some(&"absentee".to_string()));
        assert_eq!(m.expected_columns().len(), 13);
        assert_eq!(
            m.vote_columns(),
            &["votes".to_string(), "absentee".to_string()]
        );
        let transformers: Vec<&str> = m.table_transformers().iter().map(|t| t.name()).collect();
        assert_eq!(transformers, vec!["rename_column", "rename_column"]);
        let cleaners: Vec<&str> = m.row_cleaners().iter().map(|c| c.name()).collect();
        assert_eq!(cleaners, vec!["null_vote_tokens", "coerce_votes_numeric"]);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let mut registry = StateOverrideRegistry::new();
        let so = StateOverride {
            vote_columns: vec!["early".to_string()],
            ..StateOverride::default()
        };
        registry.insert("tx", so).unwrap();
        let res = Builder::national_precinct("tx")
            .unwrap()
            .resolve(&registry, false);
        assert!(matches!(res, Err(CleaningError::InvalidOverride { .. })));
    }

    #[test]
    fn vote_columns_must_be_expected() {
        let res = Builder::new("ok")
            .unwrap()
            .columns(&["state"])
            .vote_columns(&["votes"])
            .resolve(&StateOverrideRegistry::new(), false);
        assert!(matches!(res, Err(CleaningError::InvalidMetadata { .. })));
    }
}
