//! CLI error handling with user-friendly messages.
//!
//! Every command returns `Result<(), CliError>`; `main` calls
//! [`CliError::exit`] on failure.

use artfetch::config::ConfigFileError;
use artfetch::loader::ConfigError;
use std::fmt;
use std::process;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// The configuration file could not be read or written
    ConfigFile(ConfigFileError),
    /// The loader rejected its configuration
    Loader(ConfigError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
    /// One or more sources could not be resolved
    Fetch { failed: usize, total: usize },
    /// Sources still pending when the wait ran out
    Timeout { pending: usize, seconds: u64 },
    /// Failed to write an output file
    FileWrite { path: String, error: std::io::Error },
    /// Failed to inspect or modify the disk cache
    Cache(String),
}

impl CliError {
    /// Print the error and exit with status 1.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::ConfigFile(ConfigFileError::InvalidValue { .. }) | CliError::Loader(_) => {
                eprintln!();
                eprintln!("Check the settings with: artfetch config show");
                eprintln!("Recreate the defaults with: artfetch init --force");
            }
            CliError::Timeout { .. } => {
                eprintln!();
                eprintln!("Raise the wait with --wait <SECONDS>, or check connectivity.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::ConfigFile(e) => write!(f, "{}", e),
            CliError::Loader(e) => write!(f, "Invalid loader configuration: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start runtime: {}", e),
            CliError::Fetch { failed, total } => {
                write!(f, "{} of {} sources failed to load", failed, total)
            }
            CliError::Timeout { pending, seconds } => {
                write!(f, "{} sources still pending after {}s", pending, seconds)
            }
            CliError::FileWrite { path, error } => {
                write!(f, "Failed to write file '{}': {}", path, error)
            }
            CliError::Cache(msg) => write!(f, "Cache error: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Loader(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::FileWrite { error, .. } => Some(error),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Loader(e)
    }
}
