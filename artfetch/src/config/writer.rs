//! [`ConfigFile`] → commented INI text.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

pub(super) fn to_config_string(config: &ConfigFile) -> String {
    format!(
        r#"[cache]
; Directory of the persistent disk cache
; Default: platform cache directory (~/.cache/artfetch on Linux)
directory = {}
; Memory cache capacity: a size (256MB, 1GB) or a share of system memory (5%..80%)
memory_size = {}
; Disk cache capacity (KB, MB, GB suffixes)
disk_size = {}
; Turn individual cache tiers on or off
memory_enabled = {}
disk_enabled = {}

[loader]
; Number of artifacts resolved concurrently
workers = {}
; Days an artifact stays fresh when the origin gives no expiry
expiry_days = {}
; Share one download between consumers requesting the same source
coalesce_fetches = {}

[download]
; HTTP request timeout in seconds
timeout = {}

[logging]
; Log file location
file = {}
"#,
        path_to_string(&config.cache.directory),
        config.cache.memory_size,
        format_size(config.cache.disk_size),
        config.cache.memory_enabled,
        config.cache.disk_enabled,
        config.loader.workers,
        config.loader.expiry_days,
        config.loader.coalesce_fetches,
        config.download.timeout,
        path_to_string(&config.logging.file),
    )
}

/// Write paths under the home directory with a `~/` prefix.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(relative) = path.strip_prefix(&home) {
            return format!("~/{}", relative.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parser::parse_ini;
    use crate::loader::MemoryCacheSize;
    use ini::Ini;
    use std::path::PathBuf;

    #[test]
    fn test_written_config_parses_back() {
        let mut config = ConfigFile::default();
        config.cache.directory = PathBuf::from("/srv/artfetch");
        config.cache.memory_size = MemoryCacheSize::Bytes(256 * 1024 * 1024);
        config.cache.disk_enabled = false;
        config.loader.workers = 6;
        config.loader.coalesce_fetches = true;

        let text = to_config_string(&config);
        let parsed = parse_ini(&Ini::load_from_str(&text).unwrap()).unwrap();

        assert_eq!(parsed.cache.directory, PathBuf::from("/srv/artfetch"));
        assert_eq!(parsed.cache.memory_size, config.cache.memory_size);
        assert_eq!(parsed.cache.disk_size, config.cache.disk_size);
        assert!(!parsed.cache.disk_enabled);
        assert_eq!(parsed.loader.workers, 6);
        assert!(parsed.loader.coalesce_fetches);
        assert_eq!(parsed.logging.file, config.logging.file);
    }

    #[test]
    fn test_default_memory_share_written_as_percent() {
        let text = to_config_string(&ConfigFile::default());
        assert!(text.contains("memory_size = 25%"));
        assert!(text.contains("disk_size = 50MB"));
    }
}
