//! Settings structs, one per `[section]` of `config.ini`.
//!
//! Pure data. Parsing lives in [`super::parser`], serialization in
//! [`super::writer`], defaults in [`super::defaults`].

use crate::loader::MemoryCacheSize;
use std::path::PathBuf;

/// Complete configuration loaded from `config.ini`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub cache: CacheSettings,
    pub loader: LoaderSettings,
    pub download: DownloadSettings,
    pub logging: LoggingSettings,
}

/// `[cache]`
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Disk cache directory
    pub directory: PathBuf,
    /// Memory tier capacity, absolute or a share of system memory
    pub memory_size: MemoryCacheSize,
    /// Disk tier capacity in bytes
    pub disk_size: usize,
    pub memory_enabled: bool,
    pub disk_enabled: bool,
}

/// `[loader]`
#[derive(Debug, Clone)]
pub struct LoaderSettings {
    /// Worker slots
    pub workers: usize,
    /// Freshness of entries whose origin reports none, in days
    pub expiry_days: u64,
    /// Share remote fetches of one source between consumers
    pub coalesce_fetches: bool,
}

/// `[download]`
#[derive(Debug, Clone)]
pub struct DownloadSettings {
    /// Request timeout in seconds
    pub timeout: u64,
}

/// `[logging]`
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}
