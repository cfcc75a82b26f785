//! Configuration file for the loader and the CLI.
//!
//! `~/.artfetch/config.ini` holds `[cache]`, `[loader]`, `[download]` and
//! `[logging]` sections. Missing keys fall back to defaults.
//!
//! ```no_run
//! use artfetch::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let loader = config.to_loader_builder().build()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::{DEFAULT_DOWNLOAD_TIMEOUT_SECS, DEFAULT_EXPIRY_DAYS, DEFAULT_LOG_FILE};
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{CacheSettings, ConfigFile, DownloadSettings, LoaderSettings, LoggingSettings};
pub use size::{format_size, parse_size, SizeParseError};
