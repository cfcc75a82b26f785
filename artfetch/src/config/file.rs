//! Loading and saving `~/.artfetch/config.ini`.

use ini::Ini;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use super::settings::ConfigFile;
use crate::loader::LoaderBuilder;

/// Configuration file errors.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read or parse the file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    /// Failed to write the file
    #[error("Failed to write config file: {0}")]
    WriteError(String),

    /// A value could not be parsed
    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },

    /// Failed to create the config directory
    #[error("Failed to create config directory: {0}")]
    DirectoryError(std::io::Error),
}

impl ConfigFile {
    /// Load from `~/.artfetch/config.ini`, or defaults if it is absent.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Load from `path`, or defaults if it is absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Save to `~/.artfetch/config.ini`.
    pub fn save(&self) -> Result<(), ConfigFileError> {
        self.save_to(&config_file_path())
    }

    /// Save to `path`, creating its parent directory.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigFileError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigFileError::DirectoryError)?;
        }
        let content = super::writer::to_config_string(self);
        std::fs::write(path, content).map_err(|e| ConfigFileError::WriteError(e.to_string()))
    }

    /// Write the default file unless one exists. Returns its path.
    pub fn ensure_exists() -> Result<PathBuf, ConfigFileError> {
        let path = config_file_path();
        if !path.exists() {
            Self::default().save_to(&path)?;
        }
        Ok(path)
    }

    /// A loader builder preloaded with these settings.
    ///
    /// Nothing is validated until [`LoaderBuilder::build`].
    pub fn to_loader_builder(&self) -> LoaderBuilder {
        LoaderBuilder::new()
            .disk_cache_dir(self.cache.directory.clone())
            .memory_cache_size(self.cache.memory_size)
            .disk_cache_size(self.cache.disk_size as u64)
            .memory_cache_enabled(self.cache.memory_enabled)
            .disk_cache_enabled(self.cache.disk_enabled)
            .worker_threads(self.loader.workers)
            .default_expiry(Duration::from_secs(
                self.loader.expiry_days.saturating_mul(24 * 60 * 60),
            ))
            .coalesce_fetches(self.loader.coalesce_fetches)
            .download_timeout(Duration::from_secs(self.download.timeout))
    }
}

/// `~/.artfetch`
pub fn config_directory() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".artfetch")
}

/// `~/.artfetch/config.ini`
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{MemoryCacheSize, DEFAULT_CACHE_EXPIRY};
    use tempfile::TempDir;

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ConfigFile::load_from(&temp.path().join("absent.ini")).unwrap();
        assert_eq!(config.loader.workers, ConfigFile::default().loader.workers);
    }

    #[test]
    fn test_save_creates_parent_and_loads_back() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.ini");

        let mut config = ConfigFile::default();
        config.download.timeout = 12;
        config.save_to(&path).unwrap();

        let loaded = ConfigFile::load_from(&path).unwrap();
        assert_eq!(loaded.download.timeout, 12);
    }

    #[test]
    fn test_malformed_file_is_read_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.ini");
        std::fs::write(&path, "[cache\nbroken").unwrap();

        assert!(matches!(
            ConfigFile::load_from(&path),
            Err(ConfigFileError::ReadError(_))
        ));
    }

    #[test]
    fn test_to_loader_builder_carries_settings() {
        let mut config = ConfigFile::default();
        config.cache.directory = PathBuf::from("/tmp/artfetch-test");
        config.cache.memory_size = MemoryCacheSize::Bytes(4096);
        config.loader.workers = 7;
        config.loader.coalesce_fetches = true;

        let builder = config.to_loader_builder();
        let loader_config = builder.config();

        assert_eq!(loader_config.disk_cache_dir, PathBuf::from("/tmp/artfetch-test"));
        assert_eq!(loader_config.memory_cache_size, MemoryCacheSize::Bytes(4096));
        assert_eq!(loader_config.worker_threads, 7);
        assert!(loader_config.coalesce_fetches);
        assert_eq!(loader_config.default_expiry, DEFAULT_CACHE_EXPIRY);
    }
}
