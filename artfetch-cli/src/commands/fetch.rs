//! Fetch command - resolve sources through the loader and report the tier.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use artfetch::config::format_size;
use artfetch::loader::{ConsumerHandle, LoadCallback, LoadFailure};
use artfetch::{Artifact, DisplayConfig, LoadedFrom, RequestKey};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the fetch command.
pub struct FetchArgs {
    pub sources: Vec<String>,
    pub output: Option<PathBuf>,
    pub max_width: u32,
    pub max_height: u32,
    pub original: bool,
    pub no_cache: bool,
    pub wait: u64,
    pub verbose: bool,
}

enum Outcome {
    Loaded {
        source: String,
        artifact: Artifact,
        from: LoadedFrom,
    },
    Failed {
        source: String,
        reason: String,
    },
}

/// Forwards terminal callbacks to the command's wait loop.
struct ChannelCallback {
    outcomes: mpsc::UnboundedSender<Outcome>,
}

impl LoadCallback for ChannelCallback {
    fn on_completed(
        &self,
        key: &RequestKey,
        _consumer: &ConsumerHandle,
        artifact: &Artifact,
        _config: &DisplayConfig,
        from: LoadedFrom,
    ) {
        let _ = self.outcomes.send(Outcome::Loaded {
            source: key.source().to_string(),
            artifact: artifact.clone(),
            from,
        });
    }

    fn on_failed(
        &self,
        key: &RequestKey,
        _consumer: &ConsumerHandle,
        _fallback: Option<&Artifact>,
        failure: &LoadFailure,
    ) {
        let _ = self.outcomes.send(Outcome::Failed {
            source: key.source().to_string(),
            reason: failure.to_string(),
        });
    }
}

/// Run the fetch command.
pub fn run(args: FetchArgs) -> Result<(), CliError> {
    let runner = CliRunner::new(args.verbose)?;
    runner.log_startup("fetch");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("artfetch-cli")
        .enable_all()
        .build()
        .map_err(CliError::Runtime)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let mut builder = runner
        .loader_builder()
        .runtime(runtime.handle().clone())
        .callback(Arc::new(ChannelCallback { outcomes: tx }));
    if args.no_cache {
        builder = builder
            .memory_cache_enabled(false)
            .disk_cache_enabled(false);
    }
    let loader = builder.build()?;

    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir).map_err(|e| CliError::FileWrite {
            path: dir.display().to_string(),
            error: e,
        })?;
    }

    let display = DisplayConfig::new()
        .with_max_size(args.max_width, args.max_height)
        .with_show_original(args.original);

    // One consumer per source, so no request supersedes another
    let consumers: Vec<ConsumerHandle> = args.sources.iter().map(|_| ConsumerHandle::new()).collect();
    for (consumer, source) in consumers.iter().zip(&args.sources) {
        loader.request(consumer, source, Some(display.clone()));
    }

    let expected = args.sources.len();
    let outcomes = runtime.block_on(collect(rx, expected, Duration::from_secs(args.wait)));

    let mut failed = 0;
    let mut taken = HashSet::new();
    for outcome in &outcomes {
        match outcome {
            Outcome::Loaded {
                source,
                artifact,
                from,
            } => {
                println!(
                    "✓ {} ({}, from {})",
                    source,
                    format_size(artifact.len()),
                    from
                );
                if let Some(dir) = &args.output {
                    save(dir, &claim_name(output_name(source), &mut taken), artifact)?;
                }
            }
            Outcome::Failed { source, reason } => {
                failed += 1;
                warn!(source = %source, reason = %reason, "Fetch failed");
                println!("✗ {} ({})", source, reason);
            }
        }
    }

    let stats = loader.stats();
    println!();
    println!(
        "Memory hits: {}  Disk hits: {}  Downloads: {} ({})",
        stats.memory_hits,
        stats.disk_hits,
        stats.downloads,
        format_size(stats.bytes_downloaded as usize)
    );

    loader.close();
    info!(loaded = outcomes.len() - failed, failed, "Fetch finished");

    if outcomes.len() < expected {
        return Err(CliError::Timeout {
            pending: expected - outcomes.len(),
            seconds: args.wait,
        });
    }
    if failed > 0 {
        return Err(CliError::Fetch {
            failed,
            total: expected,
        });
    }
    Ok(())
}

/// Wait for `expected` outcomes or until `wait` elapses.
async fn collect(
    mut rx: mpsc::UnboundedReceiver<Outcome>,
    expected: usize,
    wait: Duration,
) -> Vec<Outcome> {
    let deadline = tokio::time::Instant::now() + wait;
    let mut outcomes = Vec::with_capacity(expected);
    while outcomes.len() < expected {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(outcome)) => outcomes.push(outcome),
            Ok(None) | Err(_) => break,
        }
    }
    outcomes
}

fn save(dir: &Path, name: &str, artifact: &Artifact) -> Result<(), CliError> {
    let path = dir.join(name);
    std::fs::write(&path, artifact.as_bytes()).map_err(|e| CliError::FileWrite {
        path: path.display().to_string(),
        error: e,
    })?;
    println!("  saved {}", path.display());
    Ok(())
}

/// File name for a saved artifact: the last path segment of the source,
/// reduced to safe characters, or `artifact`.
fn output_name(source: &str) -> String {
    let path = source.split(['?', '#']).next().unwrap_or_default();
    let segment = path.trim_end_matches('/').rsplit('/').next().unwrap_or_default();
    let name: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if name.is_empty() || name.chars().all(|c| c == '.') {
        "artifact".to_string()
    } else {
        name
    }
}

/// Reserve `name` in `taken`, numbering it `stem-N.ext` if already used.
fn claim_name(name: String, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.clone()) {
        return name;
    }
    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name.as_str(), None),
    };
    let mut n = 1;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{}-{}.{}", stem, n, ext),
            None => format!("{}-{}", stem, n),
        };
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
