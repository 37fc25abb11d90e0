use clap::Parser;
use log::{debug, info};
use snafu::ErrorCompat;

use std::path::{Path, PathBuf};

mod args;
mod oe;

use crate::args::{Args, Command};
use crate::oe::config_reader::{read_config, LoadConfig};
use crate::oe::sink::{JsonLinesSink, MemorySink, Sink};
use crate::oe::OeResult;

/// Returns whether the command found problems in the data.
fn run(args: Args) -> OeResult<bool> {
    let mut config = match args.config.as_ref() {
        Some(p) => read_config(p)?,
        None => LoadConfig::default(),
    };
    if let Some(d) = args.base_dir.clone() {
        config.base_directory = Some(d);
    }
    if args.strict {
        config.strict = Some(true);
    }
    debug!("run: config: {:?}", config);

    match args.command {
        Command::Metadata { state } => {
            let metadata = config.resolve(&state)?;
            oe::write_report(&oe::describe_metadata(&metadata), None)?;
            Ok(false)
        }
        Command::Load {
            state,
            out,
            dry_run,
            reference,
        } => {
            let out_dir: PathBuf = out.map(PathBuf::from).unwrap_or_else(|| config.output_dir());
            let mut sink: Box<dyn Sink> = if dry_run {
                info!("Dry run: the records are not written");
                Box::new(MemorySink::new())
            } else {
                Box::new(JsonLinesSink::new(&out_dir))
            };
            let summary = oe::load_state(&config, &state, sink.as_mut(), reference)?;
            oe::write_report(&summary, None)?;
            Ok(false)
        }
        Command::PreClean { states, out } => {
            let report = oe::pre_clean(&config, &states)?;
            oe::write_report(&report, out.as_deref().map(Path::new))?;
            Ok(!report.is_empty())
        }
        Command::PostClean { states, out } => {
            let report = oe::post_clean(&config, &states)?;
            oe::write_report(&report, out.as_deref().map(Path::new))?;
            Ok(!report.is_empty())
        }
        Command::CheckSchema { state, years } => {
            let exceptions = oe::check_state_schema(&config, &state, &years)?;
            oe::write_report(&exceptions, None)?;
            Ok(!exceptions.is_empty())
        }
    }
}

fn main() {
    let args = Args::parse();
    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();
    debug!("main: args: {:?}", args);

    match run(args) {
        Ok(false) => {}
        Ok(true) => {
            eprintln!("Problems were found in the data");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("An error occured {}", e);
            if let Some(bt) = ErrorCompat::backtrace(&e) {
                eprintln!("trace: {}", bt);
            } else {
                eprintln!("No trace found");
            }
            std::process::exit(2);
        }
    }
}
