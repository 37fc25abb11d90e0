//! Election metadata encoded in the names of the data files.
//!
//! Files follow the convention
//! `YYYYMMDD__<state>__<election>[__<party>]...__(precinct|ward)[__special].csv`,
//! for example `20160913__ny__republican__primary__richmond__precinct.csv`.

use chrono::NaiveDate;
use log::{debug, error};

use crate::config::{CleaningError, CleaningResult};

const DATE_POS: usize = 0;
const STATE_POS: usize = 1;
const ELECTION_POS: usize = 2;

const SEPARATOR: &str = "__";
const SPECIAL: &str = "special";
const PRIMARY: &str = "primary";
const PRECINCT_TOKENS: [&str; 2] = ["precinct", "ward"];
const PARTY_TOKENS: [&str; 2] = ["republican", "democrat"];

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ElectionFileName {
    /// The state token, as found in the file name.
    pub state: String,
    pub date: NaiveDate,
    pub election: String,
    pub is_special: bool,
}

/// Extracts the election metadata from the name of a precinct file.
///
/// Returns `Ok(None)` for files that are not precinct-level results. The state
/// found in the name must match `expected_state` (case-insensitive).
pub fn parse_precinct_filename(
    filename: &str,
    expected_state: &str,
) -> CleaningResult<Option<ElectionFileName>> {
    let stem = filename.split('.').next().unwrap_or_default();
    let mut tokens: Vec<&str> = stem.split(SEPARATOR).collect();

    let is_special = tokens.contains(&SPECIAL);
    tokens.retain(|t| *t != SPECIAL);

    if !tokens.iter().any(|t| PRECINCT_TOKENS.contains(t)) {
        return Ok(None);
    }

    // 20160913__ny__republican__primary__richmond__precinct.csv: the party is
    // already in its own column and must not be taken for the election type.
    if tokens.contains(&PRIMARY) {
        tokens.retain(|t| !PARTY_TOKENS.contains(t));
    }

    if tokens.len() <= ELECTION_POS {
        return Err(CleaningError::MalformedFilename {
            filename: filename.to_string(),
        });
    }
    let date_str = tokens[DATE_POS];
    let state = tokens[STATE_POS];
    let election = tokens[ELECTION_POS];
    debug!(
        "parse_precinct_filename: {:?} -> date: {:?} state: {:?} election: {:?} special: {:?}",
        filename, date_str, state, election, is_special
    );

    if !state.eq_ignore_ascii_case(expected_state) {
        error!(
            "File {:?} has state token {:?} but is processed for state {:?}, tokens: {:?}",
            filename, state, expected_state, tokens
        );
        return Err(CleaningError::StateMismatch {
            filename: filename.to_string(),
            expected: expected_state.to_string(),
            found: state.to_string(),
        });
    }

    let date = NaiveDate::parse_from_str(date_str.trim_start_matches('_'), "%Y%m%d").map_err(
        |_| {
            error!(
                "File {:?}: cannot parse date from {:?}, tokens: {:?}",
                filename, date_str, tokens
            );
            CleaningError::InvalidDate {
                filename: filename.to_string(),
                raw: date_str.to_string(),
            }
        },
    )?;

    Ok(Some(ElectionFileName {
        state: state.to_string(),
        date,
        election: election.to_string(),
        is_special,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn general_election() {
        let res = parse_precinct_filename("20141104__az__general__pima__precinct.csv", "az")
            .unwrap()
            .unwrap();
        assert_eq!(
            res,
            ElectionFileName {
                state: "az".to_string(),
                date: ymd(2014, 11, 4),
                election: "general".to_string(),
                is_special: false,
            }
        );
    }

    #[test]
    fn party_before_primary_is_dropped() {
        let res = parse_precinct_filename(
            "20160913__ny__republican__primary__richmond__precinct.csv",
            "ny",
        )
        .unwrap()
        .unwrap();
        assert_eq!(res.election, "primary");
        assert_eq!(res.date, ymd(2016, 9, 13));
    }

    #[test]
    fn special_ward_file() {
        let res = parse_precinct_filename("20170411__wi__general__milwaukee__ward__special.csv", "wi")
            .unwrap()
            .unwrap();
        assert!(res.is_special);
        assert_eq!(res.election, "general");
    }

    #[test]
    fn leading_underscore_date() {
        let res = parse_precinct_filename("_20001107__pa__general__precinct.csv", "PA")
            .unwrap()
            .unwrap();
        assert_eq!(res.date, ymd(2000, 11, 7));
    }

    #[test]
    fn county_files_are_not_applicable() {
        let res = parse_precinct_filename("20141104__az__general__county.csv", "az").unwrap();
        assert_eq!(res, None);
    }

    #[test]
    fn state_mismatch_is_an_error() {
        let res = parse_precinct_filename("20141104__nv__general__clark__precinct.csv", "az");
        assert!(matches!(res, Err(CleaningError::StateMismatch { .. })));
    }

    #[test]
    fn bad_date_is_an_error() {
        let res = parse_precinct_filename("2014110__az__general__pima__precinct.csv", "az");
        assert!(matches!(res, Err(CleaningError::InvalidDate { .. })));
        let res = parse_precinct_filename("20141304__az__general__pima__precinct.csv", "az");
        assert!(matches!(res, Err(CleaningError::InvalidDate { .. })));
    }

    #[test]
    fn too_few_tokens() {
        let res = parse_precinct_filename("20141104__precinct.csv", "az");
        assert!(matches!(res, Err(CleaningError::MalformedFilename { .. })));
    }
}
