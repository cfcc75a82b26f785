//! Init command - write the default configuration file.

use artfetch::config::{config_file_path, ConfigFile};

use crate::error::CliError;

/// Write `~/.artfetch/config.ini` with defaults.
///
/// An existing file is kept unless `force` is set.
pub fn run(force: bool) -> Result<(), CliError> {
    let path = config_file_path();

    if path.exists() && !force {
        println!("Configuration already exists: {}", path.display());
        println!("Use --force to overwrite it with defaults.");
        return Ok(());
    }

    ConfigFile::default().save_to(&path)?;
    println!("Wrote default configuration: {}", path.display());
    Ok(())
}
