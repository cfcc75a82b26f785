//! Configuration CLI commands.

use artfetch::config::{config_file_path, format_size, ConfigFile};
use clap::Subcommand;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Print the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(),
        ConfigCommands::Path => {
            println!("{}", config_file_path().display());
            Ok(())
        }
    }
}

fn run_show() -> Result<(), CliError> {
    let path = config_file_path();
    let config = ConfigFile::load_from(&path)?;

    if path.exists() {
        println!("Configuration: {}", path.display());
    } else {
        println!("Configuration: defaults ({} not found)", path.display());
    }
    println!();

    println!("[cache]");
    println!("  directory = {}", config.cache.directory.display());
    println!("  memory_size = {}", config.cache.memory_size);
    println!("  disk_size = {}", format_size(config.cache.disk_size));
    println!("  memory_enabled = {}", config.cache.memory_enabled);
    println!("  disk_enabled = {}", config.cache.disk_enabled);
    println!();
    println!("[loader]");
    println!("  workers = {}", config.loader.workers);
    println!("  expiry_days = {}", config.loader.expiry_days);
    println!("  coalesce_fetches = {}", config.loader.coalesce_fetches);
    println!();
    println!("[download]");
    println!("  timeout = {}", config.download.timeout);
    println!();
    println!("[logging]");
    println!("  file = {}", config.logging.file.display());

    Ok(())
}
