use clap::{Parser, Subcommand};

/// Loads the per-precinct election results of the OpenElections project into a
/// single national table.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) A JSON configuration file. See the documentation of the
    /// precinct_cleaning crate for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (directory, optional) The directory that contains the openelections-data-<state>
    /// directories. Setting this option overrides the baseDirectory of the configuration.
    #[clap(long, value_parser)]
    pub base_dir: Option<String>,

    /// If passed as an argument, every processed state must have an override.
    #[clap(long, takes_value = false)]
    pub strict: bool,

    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Prints the resolved metadata of a state.
    Metadata {
        #[clap(long, value_parser)]
        state: String,
    },
    /// Cleans all the precinct files of a state and writes the records.
    Load {
        #[clap(long, value_parser)]
        state: String,
        /// (directory, optional) Where the <table>.jsonl file is written. Overrides the
        /// outputDirectory of the configuration.
        #[clap(short, long, value_parser)]
        out: Option<String>,
        /// Runs all the cleaning but keeps the records in memory.
        #[clap(long, takes_value = false)]
        dry_run: bool,
        /// (file path) A JSON lines file with the expected records. If provided, the
        /// cleaned records must match it exactly.
        #[clap(short, long, value_parser)]
        reference: Option<String>,
    },
    /// Reports the vote values that do not look like numbers, before cleaning.
    PreClean {
        /// (list of comma-separated state codes)
        #[clap(long, value_parser, value_delimiter = ',', required = true)]
        states: Vec<String>,
        /// (file path, optional) Where the JSON report is written, stdout otherwise.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
    /// Reports the vote values that are missing or rejected, after cleaning.
    PostClean {
        /// (list of comma-separated state codes)
        #[clap(long, value_parser, value_delimiter = ',', required = true)]
        states: Vec<String>,
        /// (file path, optional) Where the JSON report is written, stdout otherwise.
        #[clap(short, long, value_parser)]
        out: Option<String>,
    },
    /// Checks the columns and the types of the raw files of a state.
    CheckSchema {
        #[clap(long, value_parser)]
        state: String,
        /// (list of comma-separated years or not specified) Only checks these years.
        #[clap(long, value_parser, value_delimiter = ',')]
        years: Vec<i64>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_load() {
        let args = Args::parse_from([
            "oeload", "--base-dir", "/data", "--strict", "load", "--state", "az", "--dry-run",
        ]);
        assert_eq!(args.base_dir.as_deref(), Some("/data"));
        assert!(args.strict);
        match args.command {
            Command::Load {
                state,
                dry_run,
                out,
                reference,
            } => {
                assert_eq!(state, "az");
                assert!(dry_run);
                assert_eq!(out, None);
                assert_eq!(reference, None);
            }
            x => panic!("unexpected {:?}", x),
        }
    }

    #[test]
    fn parse_state_lists() {
        let args = Args::parse_from(["oeload", "pre-clean", "--states", "az,ny,pa"]);
        match args.command {
            Command::PreClean { states, .. } => assert_eq!(states, vec!["az", "ny", "pa"]),
            x => panic!("unexpected {:?}", x),
        }
        let args = Args::parse_from(["oeload", "check-schema", "--state", "ut", "--years", "2016,2018"]);
        match args.command {
            Command::CheckSchema { years, .. } => assert_eq!(years, vec![2016, 2018]),
            x => panic!("unexpected {:?}", x),
        }
    }
}
