//! Artifact loader: the public front of the resolution pipeline.
//!
//! # Architecture
//!
//! ```text
//! request(consumer, source, config)
//!     │
//!     ├── blank source ──────────────► on_failed(EmptySource)
//!     ├── memory hit ────────────────► on_started + on_completed(memory)
//!     └── miss ──► TaskScheduler ──► dedup / supersede ──► worker pool
//!                                                            │
//!                        pause gate ► disk ► remote ► store ◄┘
//!                                                 │
//!                          deliver if still bound ◄┘
//! ```
//!
//! Each consumer has at most one pending task. A newer request for a
//! different key silently supersedes the older one; a repeated request for
//! the same key is folded into the pending task.
//!
//! # Example
//!
//! ```no_run
//! use artfetch::loader::{ArtifactLoader, ConsumerHandle};
//!
//! let loader = ArtifactLoader::builder()
//!     .disk_cache_dir("/tmp/artfetch")
//!     .build()?;
//!
//! let view = ConsumerHandle::new();
//! loader.request(&view, "https://example.com/cat.png", None);
//! # Ok::<(), artfetch::loader::ConfigError>(())
//! ```

mod callback;
mod config;
mod consumer;
mod pause;
mod pool;
mod scheduler;
mod task;

pub use callback::{LoadCallback, LoadFailure, LoggingCallback};
pub use config::{
    default_disk_cache_dir, ConfigError, LoaderBuilder, LoaderConfig, MemoryCacheSize,
    DEFAULT_CACHE_EXPIRY, DEFAULT_DISK_CACHE_SIZE, DEFAULT_DOWNLOAD_TIMEOUT,
    DEFAULT_MEMORY_CACHE_FRACTION, DEFAULT_WORKER_THREADS, MAX_MEMORY_CACHE_FRACTION,
    MIN_MEMORY_CACHE_FRACTION,
};
pub use consumer::{ConsumerHandle, ConsumerId};
pub use pause::{GateState, PauseGate};
pub use pool::{WorkerPermit, WorkerPool};
pub use scheduler::Submission;
pub use task::{TaskId, TaskState};

use crate::artifact::{Artifact, LoadedFrom};
use crate::cache::{CacheFacade, CacheStats, DiskCache, FsDiskCache, MemoryCache};
use crate::download::{CoalescerStats, Downloader, FetchCoalescer, HttpDownloader};
use crate::key::{DisplayConfig, RequestKey};
use consumer::{ConsumerBinding, DeliveryLock};
use scheduler::{LoaderContext, TaskScheduler};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::{Handle, Runtime};
use tracing::{debug, info};

/// What [`ArtifactLoader::request`] did with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestStatus {
    /// The source was blank; `on_failed` already fired.
    EmptySource,
    /// Served from memory; both callbacks already fired.
    MemoryHit,
    /// A new task was queued.
    Scheduled(TaskId),
    /// The consumer's pending task already serves this key.
    Deduplicated(TaskId),
}

impl From<Submission> for RequestStatus {
    fn from(submission: Submission) -> Self {
        match submission {
            Submission::Scheduled(id) => Self::Scheduled(id),
            Submission::Deduplicated(id) => Self::Deduplicated(id),
        }
    }
}

/// Resolves artifacts for consumers through memory, disk and remote tiers.
pub struct ArtifactLoader {
    scheduler: TaskScheduler,
    default_display: DisplayConfig,
    /// Present when the loader started its own runtime
    owned_runtime: Option<Runtime>,
}

impl ArtifactLoader {
    /// Start assembling a loader.
    pub fn builder() -> LoaderBuilder {
        LoaderBuilder::new()
    }

    /// Build a loader from a configuration record with default collaborators.
    pub fn new(config: LoaderConfig) -> Result<Self, ConfigError> {
        LoaderBuilder::from_config(config).build()
    }

    pub(crate) fn from_builder(builder: LoaderBuilder) -> Result<Self, ConfigError> {
        let LoaderBuilder {
            config,
            downloader,
            disk_cache,
            file_names,
            eviction_listener,
            callback,
            runtime,
        } = builder;

        let downloader: Arc<dyn Downloader> = match downloader {
            Some(downloader) => downloader,
            None => Arc::new(HttpDownloader::with_timeout(config.download_timeout)?),
        };

        let memory = if config.memory_cache_enabled {
            let cache = MemoryCache::new(config.memory_cache_size.resolve());
            Some(match eviction_listener {
                Some(listener) => cache.with_eviction_listener(listener),
                None => cache,
            })
        } else {
            None
        };

        let disk: Option<Arc<dyn DiskCache>> = match (config.disk_cache_enabled, disk_cache) {
            (false, _) => None,
            (true, Some(disk)) => Some(disk),
            (true, None) => {
                let dir = config.disk_cache_dir.clone();
                let fs = match file_names {
                    Some(names) => FsDiskCache::with_file_names(dir, config.disk_cache_size, names)?,
                    None => FsDiskCache::open(dir, config.disk_cache_size)?,
                };
                Some(Arc::new(fs))
            }
        };

        let (handle, owned_runtime) = match runtime {
            Some(handle) => (handle, None),
            None => match Handle::try_current() {
                Ok(handle) => (handle, None),
                Err(_) => {
                    let rt = tokio::runtime::Builder::new_multi_thread()
                        .worker_threads(config.worker_threads)
                        .thread_name("artfetch-worker")
                        .enable_all()
                        .build()
                        .map_err(ConfigError::Runtime)?;
                    (rt.handle().clone(), Some(rt))
                }
            },
        };

        info!(
            memory_bytes = memory.as_ref().map(|m| m.max_size_bytes()),
            disk_enabled = disk.is_some(),
            disk_dir = %config.disk_cache_dir.display(),
            workers = config.worker_threads,
            coalesce = config.coalesce_fetches,
            "Artifact loader started"
        );

        let facade = CacheFacade::new(memory, disk, downloader, config.default_expiry);
        let ctx = LoaderContext {
            facade: Arc::new(facade),
            binding: ConsumerBinding::new(),
            delivery: DeliveryLock::new(),
            gate: PauseGate::new(),
            pool: WorkerPool::new(config.worker_threads),
            coalescer: config.coalesce_fetches.then(FetchCoalescer::new),
            callback: callback.unwrap_or_else(|| Arc::new(LoggingCallback)),
        };

        Ok(Self {
            scheduler: TaskScheduler::new(ctx, handle),
            default_display: config.default_display,
            owned_runtime,
        })
    }

    fn ctx(&self) -> &LoaderContext {
        self.scheduler.context()
    }

    fn facade(&self) -> &CacheFacade {
        &self.ctx().facade
    }

    fn key_for(&self, source: &str, config: Option<&DisplayConfig>) -> RequestKey {
        RequestKey::new(source, config.unwrap_or(&self.default_display))
    }

    /// Ask for `source` on behalf of `consumer`.
    ///
    /// Never fails: a blank source or a fetch error reaches the consumer
    /// through `on_failed`. A memory hit is delivered before this returns.
    /// `config` falls back to the loader's default display config.
    pub fn request(
        &self,
        consumer: &ConsumerHandle,
        source: &str,
        config: Option<DisplayConfig>,
    ) -> RequestStatus {
        let config = config.unwrap_or_else(|| self.default_display.clone());
        let key = RequestKey::new(source, &config);
        let callback = config
            .callback
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.ctx().callback));

        let _delivery = self.ctx().delivery.lock();

        if key.is_empty() {
            self.scheduler.supersede(consumer);
            debug!(consumer = %consumer.id(), "Rejected request with blank source");
            callback.on_failed(
                &key,
                consumer,
                config.failed_artifact.as_ref(),
                &LoadFailure::EmptySource,
            );
            return RequestStatus::EmptySource;
        }

        if let Some(entry) = self.facade().lookup_memory(&key) {
            self.scheduler.supersede(consumer);
            debug!(consumer = %consumer.id(), key = %key, "Memory cache hit");
            callback.on_started(&key, consumer, &config);
            callback.on_completed(
                &key,
                consumer,
                &entry.artifact,
                &config,
                LoadedFrom::MemoryCache,
            );
            return RequestStatus::MemoryHit;
        }

        self.scheduler.submit(consumer, key, config).into()
    }

    /// Cancel whatever `consumer` is waiting for. No callback fires.
    pub fn cancel(&self, consumer: &ConsumerHandle) {
        let _delivery = self.ctx().delivery.lock();
        self.scheduler.supersede(consumer);
    }

    /// Drop every entry from both tiers. May block on disk I/O.
    pub fn clear_cache(&self) {
        info!("Clearing memory and disk caches");
        self.facade().clear();
    }

    /// Drop the entries for `source` from both tiers. May block on disk I/O.
    ///
    /// The memory entry removed is the variant `config` selects.
    pub fn clear_cache_for(&self, source: &str, config: Option<&DisplayConfig>) {
        self.facade().clear_for(&self.key_for(source, config));
    }

    /// Drop every entry from the memory tier.
    pub fn clear_memory_cache(&self) {
        self.facade().clear_memory();
    }

    /// Drop the memory entry of `source` rendered with `config`.
    pub fn clear_memory_cache_for(&self, source: &str, config: Option<&DisplayConfig>) {
        self.facade().clear_memory_for(&self.key_for(source, config));
    }

    /// Drop every entry from the disk tier. May block.
    pub fn clear_disk_cache(&self) {
        self.facade().clear_disk();
    }

    /// Drop the disk entry of `source`. May block.
    pub fn clear_disk_cache_for(&self, source: &str) {
        self.facade().clear_disk_for(source);
    }

    /// Persist pending disk writes. May block.
    pub fn flush(&self) {
        self.facade().flush();
    }

    /// Cancel all pending work and close the disk tier.
    ///
    /// Blocks until in-flight disk writes complete. Later stores only reach
    /// the memory tier.
    pub fn close(&self) {
        let cancelled = self.scheduler.cancel_all();
        info!(cancelled, "Closing artifact loader");
        self.facade().close();
    }

    /// Hold every task at its next pause check and flush the disk tier in
    /// the background. Cancels nothing.
    pub fn pause(&self) {
        self.ctx().gate.pause();
        if self.facade().disk_enabled() {
            let facade = Arc::clone(&self.ctx().facade);
            self.scheduler
                .runtime()
                .spawn_blocking(move || facade.flush());
        }
    }

    /// Release tasks held by [`pause`](Self::pause) or [`stop`](Self::stop).
    pub fn resume(&self) {
        self.ctx().gate.resume();
    }

    /// Cancel every pending task and keep the gate shut.
    ///
    /// Waiting tasks wake up and leave without a callback. New requests
    /// queue until [`resume`](Self::resume).
    pub fn stop(&self) {
        let cancelled = self.scheduler.cancel_all();
        self.ctx().gate.stop();
        info!(cancelled, "Pending tasks cancelled");
    }

    /// Current pause gate state.
    pub fn gate_state(&self) -> GateState {
        self.ctx().gate.state()
    }

    /// Returns true while paused or stopped.
    pub fn is_paused(&self) -> bool {
        self.ctx().gate.is_paused()
    }

    /// The memory-tier artifact for `source` rendered with `config`.
    pub fn memory_artifact(&self, source: &str, config: Option<&DisplayConfig>) -> Option<Artifact> {
        self.facade()
            .lookup_memory(&self.key_for(source, config))
            .map(|entry| entry.artifact)
    }

    /// On-disk file holding `source`, if it is stored.
    pub fn disk_path(&self, source: &str) -> Option<PathBuf> {
        self.facade().disk_path(source)
    }

    /// Snapshot of cache and download statistics.
    pub fn stats(&self) -> CacheStats {
        self.facade().stats()
    }

    /// Coalescing statistics, if coalescing is enabled.
    pub fn coalescer_stats(&self) -> Option<CoalescerStats> {
        self.ctx().coalescer.as_ref().map(FetchCoalescer::stats)
    }

    /// Tasks spawned and not yet finished, including cancelled ones still
    /// unwinding.
    pub fn active_tasks(&self) -> usize {
        self.scheduler.active_tasks()
    }

    /// Consumers with a pending task.
    pub fn pending_consumers(&self) -> usize {
        self.ctx().binding.len()
    }

    /// Worker slots currently held.
    pub fn busy_workers(&self) -> usize {
        self.ctx().pool.in_flight()
    }

    /// Total worker slots.
    pub fn worker_capacity(&self) -> usize {
        self.ctx().pool.capacity()
    }

    /// The runtime tasks are spawned on.
    pub fn runtime(&self) -> &Handle {
        self.scheduler.runtime()
    }
}

impl Drop for ArtifactLoader {
    fn drop(&mut self) {
        self.scheduler.cancel_all();
        if let Some(rt) = self.owned_runtime.take() {
            rt.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::download::{Download, FetchError};
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl LoadCallback for Recorder {
        fn on_started(&self, key: &RequestKey, _: &ConsumerHandle, _: &DisplayConfig) {
            self.events.lock().push(format!("started {}", key.source()));
        }

        fn on_completed(
            &self,
            key: &RequestKey,
            _: &ConsumerHandle,
            _: &Artifact,
            _: &DisplayConfig,
            from: LoadedFrom,
        ) {
            self.events
                .lock()
                .push(format!("completed {} {}", key.source(), from));
        }

        fn on_failed(
            &self,
            key: &RequestKey,
            _: &ConsumerHandle,
            fallback: Option<&Artifact>,
            failure: &LoadFailure,
        ) {
            self.events.lock().push(format!(
                "failed '{}' {} fallback={}",
                key.source(),
                failure,
                fallback.is_some()
            ));
        }
    }

    fn memory_only(callback: Arc<Recorder>) -> ArtifactLoader {
        let downloader: Arc<dyn Downloader> =
            Arc::new(|source: &str, _: &CancellationToken| -> Result<Download, FetchError> {
                Ok(Download::new(source.as_bytes().to_vec()))
            });
        ArtifactLoader::builder()
            .memory_cache_size(MemoryCacheSize::Bytes(1024))
            .disk_cache_enabled(false)
            .downloader(downloader)
            .callback(callback)
            .build()
            .unwrap()
    }

    #[test]
    fn test_blank_source_fails_without_scheduling() {
        let recorder = Arc::new(Recorder::default());
        let loader = memory_only(Arc::clone(&recorder));
        let consumer = ConsumerHandle::new();

        let config = DisplayConfig::new().with_failed_artifact(Artifact::from(vec![0]));
        let status = loader.request(&consumer, "  ", Some(config));

        assert_eq!(status, RequestStatus::EmptySource);
        assert_eq!(loader.active_tasks(), 0);
        assert_eq!(
            *recorder.events.lock(),
            vec!["failed '  ' empty source fallback=true".to_string()]
        );
    }

    #[test]
    fn test_memory_hit_is_synchronous() {
        let recorder = Arc::new(Recorder::default());
        let loader = memory_only(Arc::clone(&recorder));
        let consumer = ConsumerHandle::new();

        let key = RequestKey::new("a", &DisplayConfig::default());
        loader
            .facade()
            .store_memory(&key, &crate::cache::CacheEntry::new(Artifact::from(vec![1, 2])));

        assert_eq!(loader.request(&consumer, "a", None), RequestStatus::MemoryHit);
        assert_eq!(
            *recorder.events.lock(),
            vec!["started a".to_string(), "completed a memory".to_string()]
        );
        assert_eq!(
            loader.memory_artifact("a", None),
            Some(Artifact::from(vec![1, 2]))
        );
    }

    #[test]
    fn test_owned_runtime_resolves_remote() {
        let recorder = Arc::new(Recorder::default());
        let loader = memory_only(Arc::clone(&recorder));
        let consumer = ConsumerHandle::new();

        assert!(matches!(
            loader.request(&consumer, "remote", None),
            RequestStatus::Scheduled(_)
        ));

        for _ in 0..200 {
            if recorder.events.lock().len() == 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(
            *recorder.events.lock(),
            vec![
                "started remote".to_string(),
                "completed remote remote".to_string()
            ]
        );
        assert!(loader.memory_artifact("remote", None).is_some());
    }

    #[test]
    fn test_worker_capacity_follows_config() {
        let loader = ArtifactLoader::builder()
            .memory_cache_size(MemoryCacheSize::Bytes(1024))
            .disk_cache_enabled(false)
            .worker_threads(5)
            .callback(Arc::new(Recorder::default()))
            .build()
            .unwrap();

        assert_eq!(loader.worker_capacity(), 5);
        assert_eq!(loader.busy_workers(), 0);
    }

    #[test]
    fn test_pause_and_stop_toggle_gate() {
        let loader = memory_only(Arc::new(Recorder::default()));
        assert_eq!(loader.gate_state(), GateState::Open);

        loader.pause();
        assert!(loader.is_paused());
        loader.stop();
        assert_eq!(loader.gate_state(), GateState::Stopped);
        loader.resume();
        assert!(!loader.is_paused());
    }

    #[test]
    fn test_request_status_from_submission() {
        let id = TaskId::new(4);
        assert_eq!(
            RequestStatus::from(Submission::Scheduled(id)),
            RequestStatus::Scheduled(id)
        );
        assert_eq!(
            RequestStatus::from(Submission::Deduplicated(id)),
            RequestStatus::Deduplicated(id)
        );
    }
}
