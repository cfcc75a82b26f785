//! artfetch CLI
//!
//! Resolves sources through the artfetch loader and manages its cache and
//! configuration file.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use commands::cache::CacheAction;
use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;

#[derive(Parser)]
#[command(name = "artfetch", version, about = "Fetch and cache artifacts", long_about = None)]
struct Cli {
    /// Also print log events to stdout
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write ~/.artfetch/config.ini with default settings
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Resolve sources through the memory, disk and remote tiers
    Fetch {
        /// URLs or file paths to resolve
        #[arg(required = true)]
        sources: Vec<String>,

        /// Directory to save resolved artifacts into
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Maximum width of the requested variant (0 = unbounded)
        #[arg(long, default_value_t = 0)]
        max_width: u32,

        /// Maximum height of the requested variant (0 = unbounded)
        #[arg(long, default_value_t = 0)]
        max_height: u32,

        /// Request the untouched source
        #[arg(long)]
        original: bool,

        /// Bypass both cache tiers
        #[arg(long)]
        no_cache: bool,

        /// Seconds to wait for all sources
        #[arg(long, default_value_t = 60)]
        wait: u64,
    },

    /// Inspect or clear the disk cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Show the configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { force } => commands::init::run(force),
        Commands::Fetch {
            sources,
            output,
            max_width,
            max_height,
            original,
            no_cache,
            wait,
        } => commands::fetch::run(FetchArgs {
            sources,
            output,
            max_width,
            max_height,
            original,
            no_cache,
            wait,
            verbose: cli.verbose,
        }),
        Commands::Cache { action } => commands::cache::run(action, cli.verbose),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
