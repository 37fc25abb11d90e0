//! The catalog of state overrides.
//!
//! Each state that needs it gets a function building its [StateOverride].
//! The registry is built once at startup and not modified afterwards.

use std::collections::BTreeMap;

use log::debug;

use crate::coerce::ValueCoercer;
use crate::config::{is_known_state, CleaningError, CleaningResult, StateOverride};
use crate::steps::{NullVoteTokens, RenameColumn, RenameColumnGroup, SumColumns};

#[derive(Debug, Clone, Default)]
pub struct StateOverrideRegistry {
    overrides: BTreeMap<String, StateOverride>,
}

impl StateOverrideRegistry {
    /// An empty registry: all the states use the generic configuration.
    pub fn new() -> StateOverrideRegistry {
        StateOverrideRegistry::default()
    }

    /// The overrides for all the states with known quirks.
    pub fn builtin() -> StateOverrideRegistry {
        let mut overrides: BTreeMap<String, StateOverride> = BTreeMap::new();
        let entries: Vec<(&str, StateOverride)> = vec![
            ("az", az()),
            ("ca", ca()),
            ("co", co()),
            ("ct", ct()),
            ("de", de()),
            ("ia", ia()),
            ("id", id()),
            ("il", il()),
            ("in", in_()),
            ("ks", ks()),
            ("mo", mo()),
            ("ms", ms()),
            ("nh", nh()),
            ("nj", nj()),
            ("ny", ny()),
            ("ok", ok()),
            ("pa", pa()),
            ("sd", sd()),
            ("tx", tx()),
            ("ut", ut()),
            ("wv", wv()),
        ];
        for (state, so) in entries {
            overrides.insert(state.to_string(), so);
        }
        StateOverrideRegistry { overrides }
    }

    /// Registers the override of a state, replacing any previous one.
    pub fn insert(&mut self, state: &str, state_override: StateOverride) -> CleaningResult<()> {
        let state = checked_state(state)?;
        self.overrides.insert(state, state_override);
        Ok(())
    }

    /// Appends more customizations to the override of a state (creating it if
    /// needed).
    pub fn extend_state(
        &mut self,
        state: &str,
        state_override: StateOverride,
    ) -> CleaningResult<()> {
        let state = checked_state(state)?;
        debug!("extend_state: adding to the override of {}", state);
        self.overrides
            .entry(state)
            .or_default()
            .extend(state_override);
        Ok(())
    }

    pub fn get(&self, state: &str) -> Option<&StateOverride> {
        self.overrides.get(&state.to_lowercase())
    }

    /// The states with an override, sorted.
    pub fn states(&self) -> Vec<&str> {
        self.overrides.keys().map(|s| s.as_str()).collect()
    }
}

fn checked_state(state: &str) -> CleaningResult<String> {
    let lc = state.trim().to_lowercase();
    if is_known_state(&lc) {
        Ok(lc)
    } else {
        Err(CleaningError::InvalidOverride {
            state: state.to_string(),
            reason: "unknown state code".to_string(),
        })
    }
}

// ********* Overrides, one per state ***********

fn az() -> StateOverride {
    let mut files: Vec<String> = Vec::new();
    let groups: [(&str, &[&str]); 4] = [
        (
            "20140826__az__primary",
            &[
                "greenlee", "coconino", "gila", "yuma", "pinal", "maricopa", "mohave", "apache",
                "pima",
            ],
        ),
        (
            "20141104__az__general",
            &[
                "greenlee",
                "coconino",
                "gila",
                "yuma",
                "pinal",
                "maricopa",
                "mohave",
                "apache",
                "pima",
                "santa_cruz",
                "la_paz",
            ],
        ),
        (
            "20160830__az__primary",
            &[
                "graham",
                "santa_cruz",
                "la_paz",
                "apache",
                "mohave",
                "yuma",
                "gila",
                "navajo",
                "yavapai",
                "pima",
                "pinal",
                "maricopa",
                "cochise",
                "coconino",
                "greenlee",
            ],
        ),
        (
            "20160322__az__primary__president",
            &[
                "la_paz",
                "apache",
                "cochise",
                "mohave",
                "pinal",
                "gila",
                "yuma",
                "coconino",
                "greenlee",
                "maricopa",
                "pima",
                "santa_cruz",
            ],
        ),
    ];
    for (prefix, counties) in groups.iter() {
        for county in counties.iter() {
            files.push(format!("{}__{}__precinct.csv", prefix, county));
        }
    }
    StateOverride {
        excluded_files: files,
        ..StateOverride::default()
    }
}

fn ca() -> StateOverride {
    StateOverride::default().cleaner(NullVoteTokens::new(&["-", "X"]))
}

fn co() -> StateOverride {
    StateOverride::default()
        .transformer(RenameColumn::new("total_votes", "votes"))
        .cleaner(NullVoteTokens::new(&["***", "(< 25)"]))
}

fn ct() -> StateOverride {
    StateOverride::default()
        .transformer(RenameColumn::new("total", "votes"))
        .transformer(SumColumns::any_of(
            &["poll", "edr", "abs"],
            ValueCoercer::new(&[" -   "]),
        ))
}

fn de() -> StateOverride {
    StateOverride::default().transformer(RenameColumn::new("election_district", "precinct"))
}

fn ia() -> StateOverride {
    StateOverride::default().cleaner(NullVoteTokens::new(&[" ", "None", "?", "O", "[1"]))
}

fn id() -> StateOverride {
    StateOverride::default().cleaner(NullVoteTokens::new(&[" "]))
}

fn il() -> StateOverride {
    StateOverride::default()
        .transformer(RenameColumn::new("total", "votes"))
        .cleaner(NullVoteTokens::new(&["-", " JR.\""]))
}

fn in_() -> StateOverride {
    StateOverride::default().cleaner(NullVoteTokens::new(&[
        "Ballots",
        "Cast",
        "SEC",
        "Karl Tatgenhorst [L]",
        "AUD",
        "Suzanne Crocuh [R]",
        "Michael Claytor [D]",
        "John Schick [L]",
        "TREAS",
        "Kelly Mitchell [R]",
        "Mike Boland [D]",
        "Mike Jasper [L]",
        "SEN",
        "o",
        "/46",
    ]))
}

fn ks() -> StateOverride {
    StateOverride::default()
        .transformer(RenameColumn::new("unnamed: 6", "votes"))
        .cleaner(NullVoteTokens::new(&["Write-ins", "ESTES R", "I"]))
}

fn mo() -> StateOverride {
    StateOverride::default().cleaner(NullVoteTokens::new(&[".", " ", "i"]))
}

fn ms() -> StateOverride {
    StateOverride::default().cleaner(NullVoteTokens::new(&[
        "x", "X", "X ", " ", "X394", "X.", "X:", "\"X\"", "-", "`",
    ]))
}

fn nh() -> StateOverride {
    StateOverride::default().cleaner(NullVoteTokens::new(&[" "]))
}

fn nj() -> StateOverride {
    StateOverride::default().cleaner(NullVoteTokens::new(&[
        "70S",
        "96S",
        "60S",
        "54S",
        "53S",
        "1 1",
        "Ballots Cast",
        "Votes",
    ]))
}

fn ny() -> StateOverride {
    StateOverride::default()
        .transformer(SumColumns::all_of(&["election_day", "absentee"]))
        .cleaner(NullVoteTokens::new(&[
            "S",
            "Michael L Conroy",
            "Kenneth P La Valle",
            "Blank",
            "Void",
            "Scattering",
            "John J Flanagan",
            "Joseph Lombardi",
            "Thomas D Croci",
            "Adrienne Esposito",
            "John R Alberts",
            "Philip M Boyle",
            "Georgina Bowman",
            "Bruce P Kennedy Jr",
            "Carl L Marcellino",
            "David W Denenberg",
            "Michael Venditto",
            "Bridget M Fleming",
            "Kenneth P Lavalle",
            "Errol D Toulon Jr",
            "Francis T Genco",
            "Lee M Zeldin",
            "Rick Montano",
            "David B Wright",
            "Charles J Fuschillo Jr",
            "Carol A Gordon",
        ]))
}

fn ok() -> StateOverride {
    StateOverride::default().transformer(RenameColumn::new("total_votes", "votes"))
}

// The statewide files duplicate the county files.
fn pa() -> StateOverride {
    let elections = [
        "20141104__pa__general",
        "20140520__pa__primary",
        "20121106__pa__general",
        "20120424__pa__primary",
        "20080422__pa__primary",
        "20081104__pa__general",
        "20060516__pa__primary",
        "20061107__pa__general",
        "20000404__pa__primary",
        "20001107__pa__general",
        "20100518__pa__primary",
        "20101102__pa__general",
        "20180517__pa__primary",
        "20160426__pa__primary",
        "20020521__pa__primary",
        "20021105__pa__general",
        "20040427__pa__primary",
        "20041102__pa__general",
    ];
    StateOverride {
        excluded_files: elections
            .iter()
            .map(|e| format!("{}__precinct.csv", e))
            .collect(),
        ..StateOverride::default()
    }
}

fn sd() -> StateOverride {
    // County names that ended up in the vote column.
    StateOverride::default().cleaner(NullVoteTokens::new(&[
        "Moody",
        "Hanson",
        "McPherson",
        "Hamlin",
        "McCook",
        "Day",
        "Harding",
        "Brule",
        "Grant",
        "Hutchinson",
        "Jones",
        "Gregory",
        "Jerauld",
        "Jackson",
        "Edmunds",
        "Campbell",
        "Buffalo",
        "Aurora",
        "Mellette",
        "Haakon",
    ]))
}

fn tx() -> StateOverride {
    StateOverride::default()
        .transformer(SumColumns::all_of(&["early_voting", "election_day"]))
        .cleaner(NullVoteTokens::new(&["#REF!", "REP", "DEM", "LIB", "GRN", "votes"]))
}

fn ut() -> StateOverride {
    StateOverride::default()
        .transformer(RenameColumn::new("total votes", "votes"))
        .transformer(RenameColumnGroup::new(&[
            ("attribute", "candidate"),
            ("value", "votes"),
        ]))
        .cleaner(NullVoteTokens::new(&["*", "-"]))
}

fn wv() -> StateOverride {
    StateOverride::default()
        .excluded_files(&["20021105__wv__general__monongalia__precinct.csv"])
        .transformer(RenameColumn::new("total votes", "votes"))
        .cleaner(NullVoteTokens::new(&[" "]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Builder;
    use crate::config::{PRIMARY_KEY_COLUMNS, VOTES_COLUMN};

    #[test]
    fn builtin_overrides_are_valid() {
        let registry = StateOverrideRegistry::builtin();
        let mut generic: Vec<String> = PRIMARY_KEY_COLUMNS.iter().map(|s| s.to_string()).collect();
        generic.push(VOTES_COLUMN.to_string());
        for state in registry.states() {
            let so = registry.get(state).unwrap();
            assert_eq!(so.validate(state, &generic), Ok(()), "{}", state);
            Builder::national_precinct(state)
                .unwrap()
                .resolve(&registry, true)
                .unwrap();
        }
    }

    #[test]
    fn excluded_files() {
        let registry = StateOverrideRegistry::builtin();
        let az = registry.get("AZ").unwrap();
        assert_eq!(az.excluded_files.len(), 9 + 11 + 15 + 12);
        assert!(az
            .excluded_files
            .contains(&"20160322__az__primary__president__apache__precinct.csv".to_string()));
        let pa = registry.get("pa").unwrap();
        assert_eq!(pa.excluded_files.len(), 18);
        assert!(pa
            .excluded_files
            .contains(&"20001107__pa__general__precinct.csv".to_string()));
    }

    #[test]
    fn unknown_states_are_rejected() {
        let mut registry = StateOverrideRegistry::new();
        let res = registry.insert("dc", StateOverride::default());
        assert!(matches!(res, Err(CleaningError::InvalidOverride { .. })));
    }

    #[test]
    fn extend_appends() {
        let mut registry = StateOverrideRegistry::builtin();
        registry
            .extend_state(
                "WV",
                StateOverride::default().cleaner(NullVoteTokens::new(&["n/a"])),
            )
            .unwrap();
        let wv = registry.get("wv").unwrap();
        assert_eq!(wv.excluded_files.len(), 1);
        let names: Vec<&str> = wv.row_cleaners.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["null_vote_tokens", "null_vote_tokens"]);
        registry
            .extend_state("al", StateOverride::default().excluded_files(&["x.csv"]))
            .unwrap();
        assert_eq!(registry.states().len(), 22);
    }
}
