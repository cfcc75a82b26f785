//! Loader configuration record and builder.
//!
//! [`LoaderConfig`] holds every tunable with its default. [`LoaderBuilder`]
//! adds the pluggable collaborators and validates the whole once, in
//! [`LoaderBuilder::build`]. Nothing is validated later inside a task.

use crate::cache::{CacheError, DiskCache, EvictionListener, FileNameGenerator};
use crate::config::{format_size, parse_size};
use crate::download::{Downloader, FetchError};
use crate::key::DisplayConfig;
use crate::loader::callback::LoadCallback;
use crate::loader::ArtifactLoader;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;

/// Default share of system memory given to the memory tier.
pub const DEFAULT_MEMORY_CACHE_FRACTION: f32 = 0.25;

/// Smallest accepted memory fraction.
pub const MIN_MEMORY_CACHE_FRACTION: f32 = 0.05;

/// Largest accepted memory fraction.
pub const MAX_MEMORY_CACHE_FRACTION: f32 = 0.8;

/// Default disk tier capacity: 50 MiB.
pub const DEFAULT_DISK_CACHE_SIZE: u64 = 50 * 1024 * 1024;

/// Default number of worker slots.
pub const DEFAULT_WORKER_THREADS: usize = 3;

/// Default freshness of stored entries: 30 days.
pub const DEFAULT_CACHE_EXPIRY: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default downloader request timeout.
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Loader configuration errors. Raised by [`LoaderBuilder::build`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Memory tier enabled with zero capacity
    #[error("Memory cache capacity must be greater than zero")]
    ZeroMemoryCapacity,

    /// Memory fraction outside the accepted range
    #[error(
        "Memory cache fraction {0} is out of range ({min}..={max})",
        min = MIN_MEMORY_CACHE_FRACTION,
        max = MAX_MEMORY_CACHE_FRACTION
    )]
    MemoryFractionOutOfRange(f32),

    /// Disk tier enabled with zero capacity
    #[error("Disk cache capacity must be greater than zero")]
    ZeroDiskCapacity,

    /// Worker pool with no slots
    #[error("Worker pool needs at least one thread")]
    ZeroWorkers,

    /// Zero default expiry would make every entry stale on arrival
    #[error("Default cache expiry must be greater than zero")]
    ZeroExpiry,

    /// The disk cache could not be opened
    #[error("Failed to open disk cache: {0}")]
    DiskCache(#[from] CacheError),

    /// The default downloader could not be created
    #[error("Failed to create downloader: {0}")]
    Downloader(#[from] FetchError),

    /// No tokio runtime was supplied and none could be started
    #[error("Failed to start loader runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

/// Capacity of the memory tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MemoryCacheSize {
    /// Absolute size in bytes.
    Bytes(usize),
    /// Fraction of total system memory.
    Fraction(f32),
}

impl MemoryCacheSize {
    /// Resolve to a byte count.
    pub fn resolve(self) -> usize {
        match self {
            Self::Bytes(bytes) => bytes,
            Self::Fraction(fraction) => crate::system::memory_fraction(fraction),
        }
    }

    fn validate(self) -> Result<(), ConfigError> {
        match self {
            Self::Bytes(0) => Err(ConfigError::ZeroMemoryCapacity),
            Self::Bytes(_) => Ok(()),
            Self::Fraction(f)
                if (MIN_MEMORY_CACHE_FRACTION..=MAX_MEMORY_CACHE_FRACTION).contains(&f) =>
            {
                Ok(())
            }
            Self::Fraction(f) => Err(ConfigError::MemoryFractionOutOfRange(f)),
        }
    }
}

impl Default for MemoryCacheSize {
    fn default() -> Self {
        Self::Fraction(DEFAULT_MEMORY_CACHE_FRACTION)
    }
}

impl fmt::Display for MemoryCacheSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(bytes) => write!(f, "{}", format_size(*bytes)),
            Self::Fraction(fraction) => write!(f, "{}%", (fraction * 100.0).round()),
        }
    }
}

impl FromStr for MemoryCacheSize {
    type Err = String;

    /// Accepts sizes like `64MB` and percentages like `25%`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(percent) = s.strip_suffix('%') {
            let percent: f32 = percent
                .trim()
                .parse()
                .map_err(|_| format!("invalid percentage '{}'", s))?;
            return Ok(Self::Fraction(percent / 100.0));
        }
        parse_size(s).map(Self::Bytes).map_err(|e| e.to_string())
    }
}

/// Every tunable of a loader, with defaults.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Memory tier capacity
    pub memory_cache_size: MemoryCacheSize,
    /// Disk tier capacity in bytes
    pub disk_cache_size: u64,
    /// Disk tier directory
    pub disk_cache_dir: PathBuf,
    /// Worker slots
    pub worker_threads: usize,
    /// Freshness applied when the origin reports none
    pub default_expiry: Duration,
    /// Use the memory tier
    pub memory_cache_enabled: bool,
    /// Use the disk tier
    pub disk_cache_enabled: bool,
    /// Share remote fetches of one source between consumers
    pub coalesce_fetches: bool,
    /// Request timeout of the default downloader
    pub download_timeout: Duration,
    /// Display config used when a request carries none
    pub default_display: DisplayConfig,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            memory_cache_size: MemoryCacheSize::default(),
            disk_cache_size: DEFAULT_DISK_CACHE_SIZE,
            disk_cache_dir: default_disk_cache_dir(),
            worker_threads: DEFAULT_WORKER_THREADS,
            default_expiry: DEFAULT_CACHE_EXPIRY,
            memory_cache_enabled: true,
            disk_cache_enabled: true,
            coalesce_fetches: false,
            download_timeout: DEFAULT_DOWNLOAD_TIMEOUT,
            default_display: DisplayConfig::default(),
        }
    }
}

impl LoaderConfig {
    /// Check every value. Called by [`LoaderBuilder::build`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory_cache_enabled {
            self.memory_cache_size.validate()?;
        }
        if self.disk_cache_enabled && self.disk_cache_size == 0 {
            return Err(ConfigError::ZeroDiskCapacity);
        }
        if self.worker_threads == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.default_expiry.is_zero() {
            return Err(ConfigError::ZeroExpiry);
        }
        Ok(())
    }
}

/// Platform cache directory for the disk tier.
///
/// `~/.cache/artfetch` on Linux, falling back to `./artfetch-cache`.
pub fn default_disk_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("artfetch"))
        .unwrap_or_else(|| PathBuf::from("artfetch-cache"))
}

/// Fluent assembly of an [`ArtifactLoader`].
///
/// # Example
///
/// ```no_run
/// use artfetch::loader::{ArtifactLoader, MemoryCacheSize};
///
/// let loader = ArtifactLoader::builder()
///     .memory_cache_size(MemoryCacheSize::Bytes(64 * 1024 * 1024))
///     .disk_cache_dir("/tmp/artfetch")
///     .worker_threads(4)
///     .build()?;
/// # Ok::<(), artfetch::loader::ConfigError>(())
/// ```
#[derive(Default)]
pub struct LoaderBuilder {
    pub(crate) config: LoaderConfig,
    pub(crate) downloader: Option<Arc<dyn Downloader>>,
    pub(crate) disk_cache: Option<Arc<dyn DiskCache>>,
    pub(crate) file_names: Option<Arc<dyn FileNameGenerator>>,
    pub(crate) eviction_listener: Option<Arc<dyn EvictionListener>>,
    pub(crate) callback: Option<Arc<dyn LoadCallback>>,
    pub(crate) runtime: Option<Handle>,
}

impl LoaderBuilder {
    /// Start from defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an explicit configuration record.
    pub fn from_config(config: LoaderConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The configuration assembled so far.
    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn memory_cache_size(mut self, size: MemoryCacheSize) -> Self {
        self.config.memory_cache_size = size;
        self
    }

    pub fn disk_cache_size(mut self, bytes: u64) -> Self {
        self.config.disk_cache_size = bytes;
        self
    }

    pub fn disk_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.disk_cache_dir = dir.into();
        self
    }

    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.config.worker_threads = threads;
        self
    }

    pub fn default_expiry(mut self, expiry: Duration) -> Self {
        self.config.default_expiry = expiry;
        self
    }

    pub fn memory_cache_enabled(mut self, enabled: bool) -> Self {
        self.config.memory_cache_enabled = enabled;
        self
    }

    pub fn disk_cache_enabled(mut self, enabled: bool) -> Self {
        self.config.disk_cache_enabled = enabled;
        self
    }

    pub fn coalesce_fetches(mut self, enabled: bool) -> Self {
        self.config.coalesce_fetches = enabled;
        self
    }

    pub fn download_timeout(mut self, timeout: Duration) -> Self {
        self.config.download_timeout = timeout;
        self
    }

    pub fn default_display(mut self, display: DisplayConfig) -> Self {
        self.config.default_display = display;
        self
    }

    /// Replace the default HTTP downloader.
    pub fn downloader(mut self, downloader: Arc<dyn Downloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    /// Replace the default file-system disk cache.
    ///
    /// Disk size, directory and file-name strategy are then ignored.
    pub fn disk_cache(mut self, disk: Arc<dyn DiskCache>) -> Self {
        self.disk_cache = Some(disk);
        self
    }

    /// File-name strategy of the default disk cache.
    pub fn file_names(mut self, names: Arc<dyn FileNameGenerator>) -> Self {
        self.file_names = Some(names);
        self
    }

    /// Observer of memory-tier evictions.
    pub fn eviction_listener(mut self, listener: Arc<dyn EvictionListener>) -> Self {
        self.eviction_listener = Some(listener);
        self
    }

    /// Callback used by requests whose display config names none.
    pub fn callback(mut self, callback: Arc<dyn LoadCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Run tasks on an existing tokio runtime.
    ///
    /// Without one, the loader uses the ambient runtime if `build` is
    /// called inside one, or starts its own.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Validate and assemble the loader.
    pub fn build(self) -> Result<ArtifactLoader, ConfigError> {
        self.config.validate()?;
        ArtifactLoader::from_builder(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = LoaderConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.worker_threads, DEFAULT_WORKER_THREADS);
        assert_eq!(config.disk_cache_size, DEFAULT_DISK_CACHE_SIZE);
        assert!(config.memory_cache_enabled);
        assert!(config.disk_cache_enabled);
        assert!(!config.coalesce_fetches);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let config = LoaderConfig {
            worker_threads: 0,
            ..LoaderConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroWorkers)));
    }

    #[test]
    fn test_memory_fraction_range() {
        for bad in [0.0, 0.01, 0.81, 1.5] {
            let config = LoaderConfig {
                memory_cache_size: MemoryCacheSize::Fraction(bad),
                ..LoaderConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(ConfigError::MemoryFractionOutOfRange(_))
            ));
        }

        let config = LoaderConfig {
            memory_cache_size: MemoryCacheSize::Fraction(0.5),
            ..LoaderConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fraction_error_message_names_range() {
        let err = ConfigError::MemoryFractionOutOfRange(1.5);
        assert_eq!(
            err.to_string(),
            "Memory cache fraction 1.5 is out of range (0.05..=0.8)"
        );
    }

    #[test]
    fn test_collaborator_errors_convert() {
        let err: ConfigError = CacheError::Closed.into();
        assert!(matches!(err, ConfigError::DiskCache(CacheError::Closed)));

        let err: ConfigError = FetchError::Cancelled.into();
        assert!(matches!(err, ConfigError::Downloader(FetchError::Cancelled)));
    }

    #[test]
    fn test_disabled_tiers_skip_capacity_checks() {
        let config = LoaderConfig {
            memory_cache_enabled: false,
            memory_cache_size: MemoryCacheSize::Bytes(0),
            disk_cache_enabled: false,
            disk_cache_size: 0,
            ..LoaderConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_disk_and_expiry_rejected() {
        let config = LoaderConfig {
            disk_cache_size: 0,
            ..LoaderConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroDiskCapacity)));

        let config = LoaderConfig {
            default_expiry: Duration::ZERO,
            ..LoaderConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::ZeroExpiry)));
    }

    #[test]
    fn test_memory_size_parse_and_display() {
        assert_eq!(
            "64MB".parse::<MemoryCacheSize>(),
            Ok(MemoryCacheSize::Bytes(64 * 1024 * 1024))
        );
        assert_eq!(
            " 25% ".parse::<MemoryCacheSize>(),
            Ok(MemoryCacheSize::Fraction(0.25))
        );
        assert!("lots".parse::<MemoryCacheSize>().is_err());
        assert!("x%".parse::<MemoryCacheSize>().is_err());

        assert_eq!(MemoryCacheSize::Bytes(1024).to_string(), "1KB");
        assert_eq!(MemoryCacheSize::Fraction(0.25).to_string(), "25%");
    }

    #[test]
    fn test_builder_collects_values() {
        let builder = LoaderBuilder::new()
            .worker_threads(5)
            .disk_cache_dir("/tmp/x")
            .coalesce_fetches(true)
            .memory_cache_size(MemoryCacheSize::Bytes(1024));

        let config = builder.config();
        assert_eq!(config.worker_threads, 5);
        assert_eq!(config.disk_cache_dir, PathBuf::from("/tmp/x"));
        assert!(config.coalesce_fetches);
        assert_eq!(config.memory_cache_size, MemoryCacheSize::Bytes(1024));
    }

    #[test]
    fn test_build_fails_fast_on_invalid_config() {
        let result = LoaderBuilder::new().worker_threads(0).build();
        assert!(matches!(result, Err(ConfigError::ZeroWorkers)));
    }
}
