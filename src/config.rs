use std::{ffi::OsString, path::PathBuf};

use clap::{Arg, ArgAction, ArgMatches, Command};

use crate::{
    error::{Error, Result},
    sql::engine::kv::DEFAULT_NAMESPACE,
};

/// Runtime configuration of the REPL
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Prefix for every storage key
    pub namespace: String,
    /// Data file for the disk engine; None keeps everything in memory
    pub data_file: Option<PathBuf>,
    /// Seed the demo tables into an empty catalog at startup
    pub seed_demo: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            data_file: None,
            seed_demo: true,
        }
    }
}

impl Config {
    pub fn command() -> Command {
        Command::new("pesadb")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Minimal relational engine with a SQL-like REPL")
            .arg(
                Arg::new("data")
                    .long("data")
                    .value_name("FILE")
                    .value_parser(clap::value_parser!(PathBuf))
                    .help("Data file to persist tables to (in-memory when omitted)"),
            )
            .arg(
                Arg::new("namespace")
                    .long("namespace")
                    .value_name("PREFIX")
                    .default_value(DEFAULT_NAMESPACE)
                    .help("Prefix for every storage key"),
            )
            .arg(
                Arg::new("no-demo")
                    .long("no-demo")
                    .action(ArgAction::SetTrue)
                    .help("Do not seed demo tables into an empty database"),
            )
    }

    /// Builds the config from arguments already matched against [`Config::command`]
    pub fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            namespace: matches
                .get_one::<String>("namespace")
                .cloned()
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            data_file: matches.get_one::<PathBuf>("data").cloned(),
            seed_demo: !matches.get_flag("no-demo"),
        }
    }

    /// Parses command-line arguments, the first item being the program name.
    /// `--help` and `--version` come back as errors too; the binary matches
    /// with `get_matches` instead so clap can print them and exit.
    pub fn from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = Self::command()
            .try_get_matches_from(args)
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(Self::from_matches(&matches))
    }
}
