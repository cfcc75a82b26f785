//! `Ini` → [`ConfigFile`].
//!
//! The only place INI key names map onto struct fields. Values found in the
//! file overlay the defaults; missing keys keep them.

use ini::{Ini, Properties};
use std::path::PathBuf;
use std::str::FromStr;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;
use crate::loader::MemoryCacheSize;

pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = non_empty(section, "directory") {
            config.cache.directory = expand_tilde(v);
        }
        if let Some(v) = section.get("memory_size") {
            config.cache.memory_size = MemoryCacheSize::from_str(v).map_err(|_| {
                invalid(
                    "cache",
                    "memory_size",
                    v,
                    "expected a size like '256MB' or a share like '25%'",
                )
            })?;
        }
        if let Some(v) = section.get("disk_size") {
            config.cache.disk_size = parse_size(v).map_err(|_| {
                invalid("cache", "disk_size", v, "expected a size like '50MB' or '2GB'")
            })?;
        }
        if let Some(v) = section.get("memory_enabled") {
            config.cache.memory_enabled = parse_bool(v);
        }
        if let Some(v) = section.get("disk_enabled") {
            config.cache.disk_enabled = parse_bool(v);
        }
    }

    if let Some(section) = ini.section(Some("loader")) {
        if let Some(v) = section.get("workers") {
            config.loader.workers = parse_positive(v)
                .ok_or_else(|| invalid("loader", "workers", v, "must be a positive integer"))?;
        }
        if let Some(v) = section.get("expiry_days") {
            config.loader.expiry_days = parse_positive(v).ok_or_else(|| {
                invalid("loader", "expiry_days", v, "must be a positive number of days")
            })?;
        }
        if let Some(v) = section.get("coalesce_fetches") {
            config.loader.coalesce_fetches = parse_bool(v);
        }
    }

    if let Some(section) = ini.section(Some("download")) {
        if let Some(v) = section.get("timeout") {
            config.download.timeout = parse_positive(v).ok_or_else(|| {
                invalid("download", "timeout", v, "must be a positive integer (seconds)")
            })?;
        }
    }

    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = non_empty(section, "file") {
            config.logging.file = expand_tilde(v);
        }
    }

    Ok(config)
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn invalid(section: &str, key: &str, value: &str, reason: &str) -> ConfigFileError {
    ConfigFileError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_positive<T>(value: &str) -> Option<T>
where
    T: FromStr + PartialOrd + Default,
{
    value.trim().parse().ok().filter(|n| *n > T::default())
}

/// `true`, `1`, `yes` and `on` (any case) are true; anything else is false.
pub(super) fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}

/// Expand a leading `~/` to the home directory.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
