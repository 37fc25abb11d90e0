use crate::oe::*;

use std::collections::BTreeMap;
use std::path::PathBuf;

use precinct_cleaning::builder::Builder;
use precinct_cleaning::states::StateOverrideRegistry;
use precinct_cleaning::steps::{NullVoteTokens, RenameColumn};
use precinct_cleaning::{StateMetadata, StateOverride, NATIONAL_TABLE};
use serde::{Deserialize, Serialize};

/// Simple customizations of a state, on top of the built-in ones.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct StateOverrideConfig {
    #[serde(rename = "excludedFiles")]
    pub excluded_files: Option<Vec<String>>,
    #[serde(rename = "nullVoteValues")]
    pub null_vote_values: Option<Vec<String>>,
    /// Pairs of (from, to) names.
    #[serde(rename = "columnRenames")]
    pub column_renames: Option<Vec<(String, String)>>,
}

impl StateOverrideConfig {
    pub fn to_override(&self, state: &str) -> OeResult<StateOverride> {
        let mut res = StateOverride {
            excluded_files: self.excluded_files.clone().unwrap_or_default(),
            ..StateOverride::default()
        };
        for (from, to) in self.column_renames.iter().flatten() {
            if from.trim().is_empty() || to.trim().is_empty() {
                return Err(CleaningError::InvalidOverride {
                    state: state.to_string(),
                    reason: format!("blank column rename {:?} -> {:?}", from, to),
                })
                .context(CleaningSnafu { state });
            }
            res = res.transformer(RenameColumn::new(
                from.trim().to_lowercase().as_str(),
                to.trim().to_lowercase().as_str(),
            ));
        }
        if let Some(values) = self.null_vote_values.as_ref() {
            let tokens: Vec<&str> = values.iter().map(|s| s.as_str()).collect();
            res = res.cleaner(NullVoteTokens::new(&tokens));
        }
        Ok(res)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoadConfig {
    #[serde(rename = "baseDirectory")]
    pub base_directory: Option<String>,
    #[serde(rename = "stateDirectories")]
    pub state_directories: Option<BTreeMap<String, String>>,
    #[serde(rename = "outputDirectory")]
    pub output_directory: Option<String>,
    #[serde(rename = "tableName")]
    pub table_name: Option<String>,
    pub strict: Option<bool>,
    #[serde(rename = "nullVoteValues")]
    pub null_vote_values: Option<Vec<String>>,
    #[serde(rename = "stateOverrides")]
    pub state_overrides: Option<BTreeMap<String, StateOverrideConfig>>,
}

impl LoadConfig {
    pub fn table_name(&self) -> String {
        self.table_name
            .clone()
            .unwrap_or_else(|| NATIONAL_TABLE.to_string())
    }

    pub fn is_strict(&self) -> bool {
        self.strict.unwrap_or(false)
    }

    /// The directory holding the `openelections-data-<state>` directories of
    /// a state.
    pub fn base_dir_for(&self, state: &str) -> PathBuf {
        let per_state = self
            .state_directories
            .as_ref()
            .and_then(|m| m.get(&state.to_lowercase()));
        match (per_state, self.base_directory.as_ref()) {
            (Some(d), _) => PathBuf::from(d),
            (None, Some(d)) => PathBuf::from(d),
            (None, None) => PathBuf::from("."),
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(self.output_directory.clone().unwrap_or_else(|| ".".to_string()))
    }

    /// The built-in overrides, extended with the overrides of the
    /// configuration.
    pub fn registry(&self) -> OeResult<StateOverrideRegistry> {
        let mut registry = StateOverrideRegistry::builtin();
        for (state, soc) in self.state_overrides.iter().flatten() {
            let so = soc.to_override(state)?;
            registry
                .extend_state(state, so)
                .context(CleaningSnafu { state })?;
        }
        Ok(registry)
    }

    pub fn resolve(&self, state: &str) -> OeResult<StateMetadata> {
        let registry = self.registry()?;
        let builder = Builder::national_precinct(state)
            .context(CleaningSnafu { state })?
            .base_dir(&self.base_dir_for(state))
            .null_vote_values(&self.null_vote_values.clone().unwrap_or_default());
        builder
            .resolve(&registry, self.is_strict())
            .context(CleaningSnafu { state })
    }
}

pub fn read_config(path: &str) -> OeResult<LoadConfig> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let config: LoadConfig =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    debug!("read_config: {:?}", config);
    Ok(config)
}
