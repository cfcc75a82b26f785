//! Default values for every configuration setting.

use super::file::config_directory;
use super::settings::*;
use crate::loader::{
    default_disk_cache_dir, MemoryCacheSize, DEFAULT_CACHE_EXPIRY, DEFAULT_DISK_CACHE_SIZE,
    DEFAULT_DOWNLOAD_TIMEOUT, DEFAULT_WORKER_THREADS,
};

/// Default entry freshness in days.
pub const DEFAULT_EXPIRY_DAYS: u64 = DEFAULT_CACHE_EXPIRY.as_secs() / (24 * 60 * 60);

/// Default downloader timeout in seconds.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = DEFAULT_DOWNLOAD_TIMEOUT.as_secs();

/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "artfetch.log";

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            cache: CacheSettings {
                directory: default_disk_cache_dir(),
                memory_size: MemoryCacheSize::default(),
                disk_size: DEFAULT_DISK_CACHE_SIZE as usize,
                memory_enabled: true,
                disk_enabled: true,
            },
            loader: LoaderSettings {
                workers: DEFAULT_WORKER_THREADS,
                expiry_days: DEFAULT_EXPIRY_DAYS,
                coalesce_fetches: false,
            },
            download: DownloadSettings {
                timeout: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            },
            logging: LoggingSettings {
                file: config_directory().join(DEFAULT_LOG_FILE),
            },
        }
    }
}
