//! Command-line interface handling for the module launcher.
//!
//! Every option here overrides the matching value of the configuration file.

use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    /// Path to the configuration file
    pub config_path: PathBuf,
    /// Optional override for the module package directory
    pub modules_dir: Option<PathBuf>,
    /// Optional override for the library cache directory
    pub cache_dir: Option<PathBuf>,
    /// Optional override for log level
    pub log_level: Option<String>,
    /// Whether to force JSON log output
    pub json_logs: bool,
    /// Whether to skip all repository requests
    pub offline: bool,
    /// Whether to install module updates before loading
    pub install_updates: bool,
}

impl CliArgs {
    fn command() -> Command {
        Command::new("Module Launcher")
            .version(env!("CARGO_PKG_VERSION"))
            .about("Loads modules and their libraries into a host process")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .default_value("launcher.toml"),
            )
            .arg(
                Arg::new("modules")
                    .short('m')
                    .long("modules")
                    .value_name("DIR")
                    .help("Module package directory"),
            )
            .arg(
                Arg::new("cache")
                    .long("cache")
                    .value_name("DIR")
                    .help("Library cache directory"),
            )
            .arg(
                Arg::new("log-level")
                    .short('l')
                    .long("log-level")
                    .value_name("LEVEL")
                    .help("Log level (trace, debug, info, warn, error)"),
            )
            .arg(
                Arg::new("json-logs")
                    .long("json-logs")
                    .help("Output logs in JSON format")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("offline")
                    .long("offline")
                    .help("Resolve libraries from the local cache only")
                    .action(ArgAction::SetTrue),
            )
            .arg(
                Arg::new("install-updates")
                    .long("install-updates")
                    .help("Install available module updates before loading")
                    .action(ArgAction::SetTrue),
            )
    }

    /// Parses the process arguments.
    ///
    /// Exits the process with usage information when parsing fails.
    pub fn parse() -> Self {
        Self::from_matches(&Self::command().get_matches())
    }

    /// Parses an explicit argument list, the first item being the binary name.
    pub fn try_parse_from<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Ok(Self::from_matches(&Self::command().try_get_matches_from(args)?))
    }

    fn from_matches(matches: &ArgMatches) -> Self {
        Self {
            config_path: matches
                .get_one::<String>("config")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("launcher.toml")),
            modules_dir: matches.get_one::<String>("modules").map(PathBuf::from),
            cache_dir: matches.get_one::<String>("cache").map(PathBuf::from),
            log_level: matches.get_one::<String>("log-level").cloned(),
            json_logs: matches.get_flag("json-logs"),
            offline: matches.get_flag("offline"),
            install_updates: matches.get_flag("install-updates"),
        }
    }
}
