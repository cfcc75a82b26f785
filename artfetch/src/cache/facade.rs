//! Single front for the memory tier, the disk tier and the downloader.
//!
//! Tasks never touch the tiers directly. Every lookup, store and clear goes
//! through [`CacheFacade`], which applies the per-tier enable flags, turns
//! disk failures into misses, stamps default expiries and keeps the
//! statistics.

use crate::cache::disk::DiskCache;
use crate::cache::memory::MemoryCache;
use crate::cache::types::{CacheEntry, CacheError};
use crate::cache::CacheStats;
use crate::artifact::Artifact;
use crate::download::{Downloader, FetchError};
use crate::key::RequestKey;
use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Orchestrates both cache tiers and the remote fetch.
pub struct CacheFacade {
    memory: Option<MemoryCache>,
    disk: Option<Arc<dyn DiskCache>>,
    downloader: Arc<dyn Downloader>,
    default_expiry: Duration,
    /// Disk and download counters; memory counters live in the memory tier
    stats: Mutex<CacheStats>,
}

impl CacheFacade {
    /// Assemble a facade. Passing `None` for a tier disables it.
    pub fn new(
        memory: Option<MemoryCache>,
        disk: Option<Arc<dyn DiskCache>>,
        downloader: Arc<dyn Downloader>,
        default_expiry: Duration,
    ) -> Self {
        Self {
            memory,
            disk,
            downloader,
            default_expiry,
            stats: Mutex::new(CacheStats::new()),
        }
    }

    /// Whether the memory tier is enabled.
    pub fn memory_enabled(&self) -> bool {
        self.memory.is_some()
    }

    /// Whether the disk tier is enabled.
    pub fn disk_enabled(&self) -> bool {
        self.disk.is_some()
    }

    /// Synchronous memory lookup. Never blocks on I/O.
    pub fn lookup_memory(&self, key: &RequestKey) -> Option<CacheEntry> {
        self.memory.as_ref()?.get(key)
    }

    /// Disk lookup. May block; any disk error is logged and becomes a miss.
    pub fn lookup_disk(&self, key: &RequestKey) -> Option<CacheEntry> {
        let disk = self.disk.as_ref()?;
        match disk.get(key.source()) {
            Ok(Some(entry)) => {
                self.stats.lock().record_disk_hit();
                Some(entry)
            }
            Ok(None) => {
                self.stats.lock().record_disk_miss();
                None
            }
            Err(e) => {
                warn!(source = key.source(), error = %e, "Disk cache read failed, treating as miss");
                self.stats.lock().record_disk_read_error();
                None
            }
        }
    }

    /// Fetch `source` through the downloader. May block.
    ///
    /// The returned entry carries the origin's expiry when it reported one,
    /// otherwise the configured default.
    pub fn fetch_remote(
        &self,
        source: &str,
        cancel: &CancellationToken,
    ) -> Result<CacheEntry, FetchError> {
        match self.downloader.fetch(source, cancel) {
            Ok(download) => {
                self.stats.lock().record_download(download.data.len() as u64);
                let expires_at = download
                    .expires_at
                    .or_else(|| SystemTime::now().checked_add(self.default_expiry));
                Ok(CacheEntry {
                    artifact: Artifact::new(download.data),
                    expires_at,
                })
            }
            Err(FetchError::Cancelled) => Err(FetchError::Cancelled),
            Err(e) => {
                self.stats.lock().record_download_failure();
                Err(e)
            }
        }
    }

    /// Store `entry` in every enabled tier. May block on the disk write.
    pub fn store(&self, key: &RequestKey, entry: &CacheEntry) {
        self.store_memory(key, entry);

        if let Some(disk) = &self.disk {
            match disk.put(key.source(), entry) {
                Ok(()) => self.stats.lock().record_disk_write(),
                Err(CacheError::TooLarge { size, capacity }) => {
                    debug!(
                        source = key.source(),
                        size,
                        capacity,
                        "Artifact exceeds disk capacity, kept in memory only"
                    );
                }
                Err(e) => {
                    warn!(source = key.source(), error = %e, "Disk cache write failed");
                    self.stats.lock().record_disk_write_failure();
                }
            }
        }
    }

    /// Store `entry` in the memory tier only.
    pub fn store_memory(&self, key: &RequestKey, entry: &CacheEntry) {
        if let Some(memory) = &self.memory {
            if !memory.put(key.clone(), entry.clone()) {
                debug!(key = %key, "Artifact exceeds memory capacity, kept on disk only");
            }
        }
    }

    /// Drop every entry from both tiers.
    pub fn clear(&self) {
        self.clear_memory();
        self.clear_disk();
    }

    /// Drop `key` from both tiers.
    pub fn clear_for(&self, key: &RequestKey) {
        self.clear_memory_for(key);
        self.clear_disk_for(key.source());
    }

    /// Drop every entry from the memory tier.
    pub fn clear_memory(&self) {
        if let Some(memory) = &self.memory {
            memory.clear();
        }
    }

    /// Drop `key` from the memory tier.
    pub fn clear_memory_for(&self, key: &RequestKey) {
        if let Some(memory) = &self.memory {
            memory.remove(key);
        }
    }

    /// Drop every entry from the disk tier. May block.
    pub fn clear_disk(&self) {
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.clear() {
                warn!(error = %e, "Failed to clear disk cache");
            }
        }
    }

    /// Drop the disk entry for `source`. May block.
    pub fn clear_disk_for(&self, source: &str) {
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.remove(source) {
                warn!(source, error = %e, "Failed to remove disk cache entry");
            }
        }
    }

    /// Persist pending disk writes. May block.
    pub fn flush(&self) {
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.flush() {
                warn!(error = %e, "Failed to flush disk cache");
            }
        }
    }

    /// Close the disk tier, waiting for in-flight writes. May block.
    pub fn close(&self) {
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.close() {
                warn!(error = %e, "Failed to close disk cache cleanly");
            }
        }
    }

    /// On-disk location of the entry for `source`, if it is stored.
    pub fn disk_path(&self, source: &str) -> Option<PathBuf> {
        self.disk.as_ref()?.path_for(source)
    }

    /// Snapshot of the combined statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.lock().clone();
        if let Some(memory) = &self.memory {
            stats.merge_memory(&memory.stats());
        }
        stats
    }
}
