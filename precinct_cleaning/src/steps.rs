//! The built-in table transformers and row cleaners.
//!
//! The steps are small, named and pure. They are combined per state in
//! [crate::states].

use log::{debug, warn};

use crate::coerce::ValueCoercer;
use crate::config::{CleaningResult, RowCleaner, TableTransformer, VOTES_COLUMN};
use crate::table::{Record, Table, Value};

// ********* Table transformers ***********

/// Trims and lowercases the column names.
///
/// A column without a name and without any content is dropped. A column
/// without a name but with some content is called `unnamed: <position>`.
/// When two columns end up with the same name, the one on the right wins.
#[derive(Debug, Clone, Default)]
pub struct NormalizeColumnNames;

impl TableTransformer for NormalizeColumnNames {
    fn name(&self) -> &str {
        "normalize_column_names"
    }

    fn transform(&self, table: Table) -> CleaningResult<Table> {
        let mut names: Vec<Option<String>> = Vec::with_capacity(table.columns().len());
        for (idx, col) in table.columns().iter().enumerate() {
            let clean = col.trim().to_lowercase();
            if !clean.is_empty() {
                names.push(Some(clean));
            } else if table.rows().iter().all(|r| r[idx].is_blank()) {
                debug!("normalize_column_names: dropping blank column {}", idx);
                names.push(None);
            } else {
                names.push(Some(format!("unnamed: {}", idx)));
            }
        }
        let mut positions: Vec<usize> = Vec::new();
        let mut kept_names: Vec<String> = Vec::new();
        for (idx, name) in names.into_iter().enumerate() {
            if let Some(n) = name {
                if let Some(prev) = kept_names.iter().position(|k| *k == n) {
                    debug!("normalize_column_names: column {:?} appears twice", n);
                    kept_names.remove(prev);
                    positions.remove(prev);
                }
                kept_names.push(n);
                positions.push(idx);
            }
        }
        Ok(table.keep_positions(&positions).with_column_names(kept_names))
    }
}

/// Renames a column when it is present (and the target name is not).
#[derive(Debug, Clone)]
pub struct RenameColumn {
    pub from: String,
    pub to: String,
}

impl RenameColumn {
    pub fn new(from: &str, to: &str) -> RenameColumn {
        RenameColumn {
            from: from.to_string(),
            to: to.to_string(),
        }
    }
}

impl TableTransformer for RenameColumn {
    fn name(&self) -> &str {
        "rename_column"
    }

    fn transform(&self, table: Table) -> CleaningResult<Table> {
        Ok(table.rename_column(&self.from, &self.to))
    }
}

/// Renames a group of columns, only if all of them are present.
///
/// Some files are laid out as `attribute,value` pairs, which really are
/// `candidate,votes`.
#[derive(Debug, Clone)]
pub struct RenameColumnGroup {
    pub renames: Vec<(String, String)>,
}

impl RenameColumnGroup {
    pub fn new(renames: &[(&str, &str)]) -> RenameColumnGroup {
        RenameColumnGroup {
            renames: renames
                .iter()
                .map(|(f, t)| (f.to_string(), t.to_string()))
                .collect(),
        }
    }
}

impl TableTransformer for RenameColumnGroup {
    fn name(&self) -> &str {
        "rename_column_group"
    }

    fn transform(&self, table: Table) -> CleaningResult<Table> {
        if !self.renames.iter().all(|(from, _)| table.has_column(from)) {
            return Ok(table);
        }
        Ok(self
            .renames
            .iter()
            .fold(table, |t, (from, to)| t.rename_column(from, to)))
    }
}

/// Builds the `votes` column from breakout columns (election day, absentee,
/// ...) when the file has no total.
#[derive(Debug, Clone)]
pub struct SumColumns {
    pub parts: Vec<String>,
    pub target: String,
    /// If true, all the parts must be present and a missing count makes the
    /// total missing. Otherwise, the parts that are present are added and
    /// missing counts are skipped.
    pub require_all: bool,
    pub coercer: ValueCoercer,
}

impl SumColumns {
    pub fn all_of(parts: &[&str]) -> SumColumns {
        SumColumns {
            parts: parts.iter().map(|s| s.to_string()).collect(),
            target: VOTES_COLUMN.to_string(),
            require_all: true,
            coercer: ValueCoercer::default(),
        }
    }

    pub fn any_of(parts: &[&str], coercer: ValueCoercer) -> SumColumns {
        SumColumns {
            parts: parts.iter().map(|s| s.to_string()).collect(),
            target: VOTES_COLUMN.to_string(),
            require_all: false,
            coercer,
        }
    }
}

impl SumColumns {
    /// A part that is not a count leaves its raw content as the total, so
    /// that the row cleaners and the reports still see it.
    fn row_total(&self, row_idx: usize, row: &[Value], present: &[usize]) -> Value {
        let mut total: i64 = 0;
        let mut missing = false;
        for idx in present.iter() {
            match self.coercer.coerce(&row[*idx]) {
                Ok(Value::Int(i)) => match total.checked_add(i) {
                    Some(x) => total = x,
                    None => {
                        warn!(
                            "sum_columns: row {}: the total of {:?} overflows",
                            row_idx, self.parts
                        );
                        return Value::Null;
                    }
                },
                Ok(_) => missing = true,
                Err(_) => {
                    warn!(
                        "sum_columns: row {}: {:?} is not a count, keeping it as {}",
                        row_idx, row[*idx], self.target
                    );
                    return row[*idx].clone();
                }
            }
        }
        if missing && self.require_all {
            Value::Null
        } else {
            Value::Int(total)
        }
    }
}

impl TableTransformer for SumColumns {
    fn name(&self) -> &str {
        "sum_columns"
    }

    fn transform(&self, table: Table) -> CleaningResult<Table> {
        if table.has_column(&self.target) {
            return Ok(table);
        }
        let present: Vec<usize> = self
            .parts
            .iter()
            .filter_map(|p| table.column_index(p))
            .collect();
        if present.is_empty() || (self.require_all && present.len() < self.parts.len()) {
            return Ok(table);
        }
        let mut totals: Vec<Value> = Vec::with_capacity(table.len());
        for (row_idx, row) in table.rows().iter().enumerate() {
            totals.push(self.row_total(row_idx, row, &present));
        }
        Ok(table.with_column(&self.target, totals))
    }
}

// ********* Row cleaners ***********

/// Nulls out vote counts that are known garbage for a source: stray names,
/// labels, spreadsheet errors.
#[derive(Debug, Clone)]
pub struct NullVoteTokens {
    pub column: String,
    pub tokens: Vec<String>,
}

impl NullVoteTokens {
    pub fn new(tokens: &[&str]) -> NullVoteTokens {
        NullVoteTokens {
            column: VOTES_COLUMN.to_string(),
            tokens: tokens.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl RowCleaner for NullVoteTokens {
    fn name(&self) -> &str {
        "null_vote_tokens"
    }

    fn clean(&self, record: Record) -> CleaningResult<Record> {
        let is_token = match record.get(&self.column).and_then(|v| v.as_text()) {
            Some(s) => self.tokens.iter().any(|t| t == s),
            None => false,
        };
        if is_token {
            Ok(record.with(&self.column, Value::Null))
        } else {
            Ok(record)
        }
    }
}

/// Turns the vote columns into integers or nulls.
///
/// It fails on anything it does not understand, so it has to come after all
/// the other cleaners.
#[derive(Debug, Clone)]
pub struct CoerceVotesNumeric {
    pub columns: Vec<String>,
    pub coercer: ValueCoercer,
}

impl CoerceVotesNumeric {
    pub fn new(coercer: ValueCoercer) -> CoerceVotesNumeric {
        CoerceVotesNumeric {
            columns: vec![VOTES_COLUMN.to_string()],
            coercer,
        }
    }
}

impl Default for CoerceVotesNumeric {
    fn default() -> CoerceVotesNumeric {
        CoerceVotesNumeric::new(ValueCoercer::default())
    }
}

impl RowCleaner for CoerceVotesNumeric {
    fn name(&self) -> &str {
        "coerce_votes_numeric"
    }

    fn clean(&self, record: Record) -> CleaningResult<Record> {
        let mut res = record;
        for col in self.columns.iter() {
            // Missing columns are reported by the integrity checks.
            let coerced = match res.get(col) {
                Some(v) => self.coercer.coerce(v)?,
                None => continue,
            };
            res = res.with(col, coerced);
        }
        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(s: &str) -> Value {
        Value::text(s)
    }

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn column_names_are_normalized() {
        let table = Table::from_rows(
            cols(&["County ", "VOTES", "", "", "state"]),
            vec![
                vec![t("Pima"), t("12"), Value::Null, t("x"), t("AZ")],
                vec![t("Yuma"), t("3"), t(""), Value::Null, t("AZ")],
            ],
        );
        let res = NormalizeColumnNames.transform(table).unwrap();
        assert_eq!(res.columns(), &cols(&["county", "votes", "unnamed: 3", "state"])[..]);
        assert_eq!(res.get(0, "unnamed: 3"), Some(&t("x")));
    }

    #[test]
    fn later_column_wins_on_collision() {
        let table = Table::from_rows(
            cols(&["State", "votes", "state"]),
            vec![vec![t("Arizona"), t("1"), t("AZ")]],
        );
        let res = NormalizeColumnNames.transform(table).unwrap();
        assert_eq!(res.columns(), &cols(&["votes", "state"])[..]);
        assert_eq!(res.get(0, "state"), Some(&t("AZ")));
    }

    #[test]
    fn group_rename_needs_all_columns() {
        let step = RenameColumnGroup::new(&[("attribute", "candidate"), ("value", "votes")]);
        let only_one = Table::new(cols(&["attribute", "votes"]));
        let res = step.transform(only_one).unwrap();
        assert_eq!(res.columns(), &cols(&["attribute", "votes"])[..]);
        let both = Table::new(cols(&["attribute", "value"]));
        let res = step.transform(both).unwrap();
        assert_eq!(res.columns(), &cols(&["candidate", "votes"])[..]);
    }

    #[test]
    fn sum_all_of_propagates_missing() {
        let table = Table::from_rows(
            cols(&["election_day", "absentee"]),
            vec![
                vec![t("10"), t("2")],
                vec![t("4"), Value::Null],
            ],
        );
        let res = SumColumns::all_of(&["election_day", "absentee"])
            .transform(table)
            .unwrap();
        assert_eq!(res.get(0, "votes"), Some(&Value::Int(12)));
        assert_eq!(res.get(1, "votes"), Some(&Value::Null));
    }

    #[test]
    fn sum_any_of_skips_missing() {
        let table = Table::from_rows(
            cols(&["poll", "abs"]),
            vec![
                vec![t("1,000"), t(" -   ")],
                vec![Value::Null, Value::Null],
            ],
        );
        let res = SumColumns::any_of(&["poll", "edr", "abs"], ValueCoercer::new(&[" -   "]))
            .transform(table)
            .unwrap();
        assert_eq!(res.get(0, "votes"), Some(&Value::Int(1000)));
        assert_eq!(res.get(1, "votes"), Some(&Value::Int(0)));
    }

    #[test]
    fn sum_keeps_tokens_for_the_cleaners() {
        let table = Table::from_rows(
            cols(&["candidate", "election_day", "absentee"]),
            vec![vec![t("A"), t("S"), t("3")], vec![t("B"), t("2"), t("3")]],
        );
        let res = SumColumns::all_of(&["election_day", "absentee"])
            .transform(table)
            .unwrap();
        assert_eq!(res.get(0, "votes"), Some(&t("S")));
        assert_eq!(res.get(1, "votes"), Some(&Value::Int(5)));
    }

    #[test]
    fn sum_overflow_is_missing() {
        let table = Table::from_rows(
            cols(&["election_day", "absentee"]),
            vec![vec![t("9223372036854775807"), t("1")]],
        );
        let res = SumColumns::all_of(&["election_day", "absentee"])
            .transform(table)
            .unwrap();
        assert_eq!(res.get(0, "votes"), Some(&Value::Null));
    }

    #[test]
    fn sum_keeps_existing_total() {
        let table = Table::from_rows(
            cols(&["poll", "votes"]),
            vec![vec![t("1"), t("5")]],
        );
        let res = SumColumns::any_of(&["poll"], ValueCoercer::default())
            .transform(table)
            .unwrap();
        assert_eq!(res.get(0, "votes"), Some(&t("5")));
    }

    #[test]
    fn tokens_are_nulled() {
        let step = NullVoteTokens::new(&["X", "-"]);
        let r = Record::new().with("votes", t("X"));
        assert_eq!(step.clean(r).unwrap().get("votes"), Some(&Value::Null));
        let r = Record::new().with("votes", t("12"));
        assert_eq!(step.clean(r).unwrap().get("votes"), Some(&t("12")));
    }

    #[test]
    fn coercion_skips_missing_column() {
        let r = Record::new().with("candidate", t("A"));
        let res = CoerceVotesNumeric::default().clean(r.clone()).unwrap();
        assert_eq!(res, r);
    }
}
