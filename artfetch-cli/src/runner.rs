//! CLI runner for common setup.
//!
//! Loads the configuration file and initializes logging once, so command
//! handlers only deal with their own work.

use crate::error::CliError;
use artfetch::config::{ConfigFile, DEFAULT_LOG_FILE};
use artfetch::loader::LoaderBuilder;
use artfetch::logging::{init_logging_with, LoggingGuard};
use std::path::Path;
use tracing::info;

/// Configuration and logging shared by command handlers.
pub struct CliRunner {
    _logging_guard: LoggingGuard,
    config: ConfigFile,
}

impl CliRunner {
    /// Load `~/.artfetch/config.ini` and start logging to its log file.
    ///
    /// Log events also go to stdout when `verbose` is set.
    pub fn new(verbose: bool) -> Result<Self, CliError> {
        let config = ConfigFile::load()?;

        let log_path = &config.logging.file;
        let log_dir = log_path.parent().unwrap_or_else(|| Path::new("."));
        let log_file = log_path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string());

        let logging_guard = init_logging_with(log_dir, &log_file, verbose)
            .map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            _logging_guard: logging_guard,
            config,
        })
    }

    /// The loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!(version = artfetch::VERSION, command, "artfetch CLI starting");
    }

    /// A loader builder preloaded from the configuration file.
    pub fn loader_builder(&self) -> LoaderBuilder {
        self.config.to_loader_builder()
    }
}
