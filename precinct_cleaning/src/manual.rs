/*!

This is the long-form manual for `precinct_cleaning` and `oeload`.

## Source layout

The data of a state lives under `<base>/openelections-data-<state>`. The
results are grouped by year in directories whose name starts with four
digits (`2016`, `2016_special`, ...). These directories are walked
recursively and all the `.csv` files are considered.

A year directory whose name is not a year (for example `2016_special`) is
reported as an error and its files are skipped.

## File names

Precinct files are named:

```text
YYYYMMDD__<state>__<election>[__<party>]...__(precinct|ward)[__special].csv
```

For example:
- `20141104__az__general__pima__precinct.csv`
- `20160913__ny__republican__primary__richmond__precinct.csv`: for primaries,
  the party (`republican` or `democrat`) is not part of the election type.
- `20170411__wi__general__milwaukee__ward__special.csv`: a special election.

Files without a `precinct` or `ward` token (county level results, for
example) are skipped with a warning. A file with a state token that is not
the state being processed, or with an invalid date, stops the processing of
the state.

## Output

Each output record has the columns of the primary key, in order:

`state, year, date, election, special, office, district, county, precinct,
party, candidate`

followed by `votes` and by the extra columns configured for the state. The
key columns are never empty: missing values are replaced by `NA`. The votes
are integers or null.

## Writing overrides

The quirks of a state are described by a [crate::StateOverride]:

- `excluded_files`: the names (not the paths) of files to skip, typically
  statewide files that duplicate the county files.
- `columns` and `vote_columns`: extra columns to keep in the output.
- table transformers: steps applied to the whole table of a file, after the
  column names have been trimmed and lowercased. They run after the generic
  transformers.
- row cleaners: steps applied to each record. They run before the generic
  cleaners, so that they can null out values that the final conversion to
  numbers would reject.

The built-in steps are in [crate::steps]. For example, for a state that
reports its totals in a `total` column and writes `X` for redacted counts:

```
use precinct_cleaning::StateOverride;
use precinct_cleaning::steps::{NullVoteTokens, RenameColumn};

let so = StateOverride::default()
    .transformer(RenameColumn::new("total", "votes"))
    .cleaner(NullVoteTokens::new(&["X"]));
# assert_eq!(so.row_cleaners.len(), 1);
```

Simple overrides can also be written in the JSON configuration of `oeload`,
under `stateOverrides`:

```json
{
  "stateOverrides": {
    "wy": {
      "excludedFiles": ["20181106__wy__general__precinct.csv"],
      "nullVoteValues": ["-"],
      "columnRenames": [["total", "votes"]]
    }
  }
}
```

## Reports

- `pre-clean` lists, for every precinct file (excluded files included), the
  vote values that do not look like numbers, and the files that could not be
  parsed.
- `post-clean` runs the extraction file by file and lists the vote values
  that are still not numbers after cleaning, as well as the records without
  vote column.
- `check-schema` checks the raw files against a per-year schema, which can be
  extended with a `column_types.csv` file at the root of the state directory:

```text
year,column,type
2016,votes,integer
2016,absentee,integer
```

*/
