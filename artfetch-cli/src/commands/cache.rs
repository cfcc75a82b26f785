//! Cache management CLI commands.

use artfetch::cache::{DiskCache, FsDiskCache};
use artfetch::config::{format_size, ConfigFile};
use clap::Subcommand;

use crate::error::CliError;
use crate::runner::CliRunner;

/// Cache action subcommands.
#[derive(Debug, Subcommand)]
pub enum CacheAction {
    /// Remove every entry from the disk cache
    Clear,
    /// Show disk cache usage
    Stats,
    /// Print the cache file holding a source
    Path {
        /// Source identifier (URL or path) as it was requested
        source: String,
    },
}

/// Run a cache subcommand.
pub fn run(action: CacheAction, verbose: bool) -> Result<(), CliError> {
    let runner = CliRunner::new(verbose)?;
    runner.log_startup("cache");
    let disk = open_disk(runner.config())?;

    match action {
        CacheAction::Clear => {
            let entries = disk.entry_count();
            let bytes = disk.size_bytes();
            println!("Clearing disk cache at: {}", disk.cache_dir().display());
            disk.clear().map_err(|e| CliError::Cache(e.to_string()))?;
            println!(
                "Deleted {} entries, freed {}",
                entries,
                format_size(bytes as usize)
            );
        }
        CacheAction::Stats => {
            let used = disk.size_bytes();
            let max = disk.max_size_bytes();
            println!("Disk cache: {}", disk.cache_dir().display());
            println!("  Entries: {}", disk.entry_count());
            println!(
                "  Size:    {} of {} ({:.1}%)",
                format_size(used as usize),
                format_size(max as usize),
                used as f64 * 100.0 / max as f64
            );
        }
        CacheAction::Path { source } => match disk.path_for(&source) {
            Some(path) => println!("{}", path.display()),
            None => println!("(not cached)"),
        },
    }

    disk.close().map_err(|e| CliError::Cache(e.to_string()))
}

fn open_disk(config: &ConfigFile) -> Result<FsDiskCache, CliError> {
    FsDiskCache::open(&config.cache.directory, config.cache.disk_size as u64)
        .map_err(|e| CliError::Cache(e.to_string()))
}
