//! Persistent disk tier.
//!
//! [`DiskCache`] is the seam the loader talks to; [`FsDiskCache`] is the
//! default implementation, storing one file per source under a single
//! directory.
//!
//! # File layout
//!
//! ```text
//! <cache_dir>/<file_name(source)>
//!     [0..8)  expiry, big-endian milliseconds since the Unix epoch (0 = never)
//!     [8..)   payload
//! ```
//!
//! Writes land in a hidden temporary file first and are renamed into place,
//! so a crash never leaves a half-written entry under a live name.

use crate::cache::filename::{FileNameGenerator, HashedFileNames};
use crate::cache::lru_index::LruIndex;
use crate::cache::types::{CacheEntry, CacheError};
use crate::artifact::Artifact;
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

const HEADER_LEN: usize = 8;
const TMP_SUFFIX: &str = ".tmp";

/// Persistent source-keyed artifact store.
///
/// All methods may block on I/O. Implementations serialise their own
/// mutations; callers may invoke them from any thread.
pub trait DiskCache: Send + Sync {
    /// Read the entry stored for `source`.
    ///
    /// Expired entries are removed and reported as `Ok(None)`.
    fn get(&self, source: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Store `entry` for `source`, replacing any previous entry.
    fn put(&self, source: &str, entry: &CacheEntry) -> Result<(), CacheError>;

    /// Remove the entry for `source`. Returns true if one was present.
    fn remove(&self, source: &str) -> Result<bool, CacheError>;

    /// Remove every entry.
    fn clear(&self) -> Result<(), CacheError>;

    /// Persist pending writes to stable storage.
    fn flush(&self) -> Result<(), CacheError>;

    /// Wait for in-flight writes, flush, and reject further writes.
    fn close(&self) -> Result<(), CacheError>;

    /// Location of the stored entry for `source`, if there is one.
    fn path_for(&self, source: &str) -> Option<PathBuf>;
}

/// File-system disk cache with LRU eviction.
pub struct FsDiskCache {
    /// Cache directory root
    cache_dir: PathBuf,
    /// Maximum total size of stored files in bytes
    max_size_bytes: u64,
    /// Source to file name strategy
    names: Arc<dyn FileNameGenerator>,
    /// File name -> path, in recency order
    index: Mutex<LruIndex<String, PathBuf>>,
    /// Files written since the last flush
    dirty: Mutex<HashSet<PathBuf>>,
    /// Write gate; the flag is true once closed
    closed: RwLock<bool>,
    /// Disambiguates concurrent temporary files
    tmp_seq: AtomicU64,
}

impl FsDiskCache {
    /// Open (or create) a disk cache rooted at `cache_dir`.
    ///
    /// # Arguments
    ///
    /// * `cache_dir` - Root directory for cache storage
    /// * `max_size_bytes` - Maximum disk space to use
    pub fn open(cache_dir: impl Into<PathBuf>, max_size_bytes: u64) -> Result<Self, CacheError> {
        Self::with_file_names(cache_dir, max_size_bytes, Arc::new(HashedFileNames))
    }

    /// Open a disk cache that names files with `names`.
    pub fn with_file_names(
        cache_dir: impl Into<PathBuf>,
        max_size_bytes: u64,
        names: Arc<dyn FileNameGenerator>,
    ) -> Result<Self, CacheError> {
        if max_size_bytes == 0 {
            return Err(CacheError::InvalidConfig(
                "disk cache capacity must be greater than zero".to_string(),
            ));
        }

        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)?;

        let cache = Self {
            cache_dir,
            max_size_bytes,
            names,
            index: Mutex::new(LruIndex::new()),
            dirty: Mutex::new(HashSet::new()),
            closed: RwLock::new(false),
            tmp_seq: AtomicU64::new(0),
        };

        cache.scan_cache_dir()?;

        info!(
            dir = %cache.cache_dir.display(),
            entries = cache.entry_count(),
            size_bytes = cache.size_bytes(),
            max_size_bytes,
            "Disk cache opened"
        );

        Ok(cache)
    }

    /// Root directory of the cache.
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the number of entries in the cache.
    pub fn entry_count(&self) -> usize {
        self.index.lock().len()
    }

    /// Get the current size of the cache in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.index.lock().total_cost()
    }

    /// Get the maximum size of the cache in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_bytes
    }

    /// Rebuild the index from the files already on disk.
    ///
    /// Files are ordered by modification time so the oldest writes are the
    /// first eviction candidates. Leftover temporary files are deleted.
    fn scan_cache_dir(&self) -> Result<(), CacheError> {
        let mut found: Vec<(String, PathBuf, SystemTime, u64)> = Vec::new();

        for entry in fs::read_dir(&self.cache_dir)? {
            let entry = entry?;
            let path = entry.path();
            let metadata = match entry.metadata() {
                Ok(metadata) if metadata.is_file() => metadata,
                _ => continue,
            };
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if name.ends_with(TMP_SUFFIX) {
                debug!(path = %path.display(), "Removing interrupted cache write");
                let _ = fs::remove_file(&path);
                continue;
            }

            let modified = metadata.modified().unwrap_or(UNIX_EPOCH);
            found.push((name.to_string(), path, modified, metadata.len()));
        }

        found.sort_by_key(|(_, _, modified, _)| *modified);

        let evicted = {
            let mut index = self.index.lock();
            for (name, path, _, len) in found {
                index.insert(name, path, len);
            }
            self.evict_over_limit(&mut index)
        };

        if evicted > 0 {
            info!(evicted, "Disk cache trimmed to capacity on open");
        }
        Ok(())
    }

    /// Evict least-recently-used files until the index fits the capacity.
    ///
    /// Must be called with the index lock held.
    fn evict_over_limit(&self, index: &mut LruIndex<String, PathBuf>) -> usize {
        let mut evicted = 0;
        while index.total_cost() > self.max_size_bytes {
            let Some((name, path, _)) = index.pop_oldest() else {
                break;
            };
            if let Err(e) = remove_if_exists(&path) {
                warn!(file = %name, error = %e, "Failed to delete evicted cache file");
            }
            self.dirty.lock().remove(&path);
            evicted += 1;
        }
        evicted
    }

    fn entry_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(name)
    }

    fn tmp_path(&self, name: &str) -> PathBuf {
        let seq = self.tmp_seq.fetch_add(1, Ordering::Relaxed);
        self.cache_dir
            .join(format!(".{}.{}{}", name, seq, TMP_SUFFIX))
    }

    fn forget(&self, name: &str, path: &Path) {
        self.index.lock().remove(&name.to_string());
        self.dirty.lock().remove(path);
        let _ = remove_if_exists(path);
    }
}

impl DiskCache for FsDiskCache {
    fn get(&self, source: &str) -> Result<Option<CacheEntry>, CacheError> {
        let name = self.names.file_name(source);
        let path = {
            let mut index = self.index.lock();
            match index.get(&name) {
                Some(path) => path.clone(),
                None => return Ok(None),
            }
        };

        let data = match fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // Removed behind our back
                self.forget(&name, &path);
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        if data.len() < HEADER_LEN {
            self.forget(&name, &path);
            return Err(CacheError::Corrupt {
                path: path.display().to_string(),
                reason: format!("{} bytes is shorter than the entry header", data.len()),
            });
        }

        let mut header = [0u8; HEADER_LEN];
        header.copy_from_slice(&data[..HEADER_LEN]);
        let entry = CacheEntry {
            artifact: Artifact::from(data[HEADER_LEN..].to_vec()),
            expires_at: decode_expiry(header),
        };

        if entry.is_expired() {
            debug!(source, "Disk cache entry expired");
            self.forget(&name, &path);
            return Ok(None);
        }

        Ok(Some(entry))
    }

    fn put(&self, source: &str, entry: &CacheEntry) -> Result<(), CacheError> {
        let closed = self.closed.read();
        if *closed {
            return Err(CacheError::Closed);
        }

        let name = self.names.file_name(source);
        let size = (HEADER_LEN + entry.artifact.len()) as u64;
        if size > self.max_size_bytes {
            // A stale smaller version must not outlive the newer store
            let _ = self.remove(source);
            return Err(CacheError::TooLarge {
                size,
                capacity: self.max_size_bytes,
            });
        }

        let path = self.entry_path(&name);
        let tmp = self.tmp_path(&name);

        let written = (|| -> io::Result<u64> {
            let mut file = File::create(&tmp)?;
            file.write_all(&encode_expiry(entry.expires_at))?;
            file.write_all(entry.artifact.as_bytes())?;
            Ok((HEADER_LEN + entry.artifact.len()) as u64)
        })();
        let len = match written {
            Ok(len) => len,
            Err(e) => {
                let _ = fs::remove_file(&tmp);
                return Err(e.into());
            }
        };

        let evicted = {
            let mut index = self.index.lock();
            if let Err(e) = fs::rename(&tmp, &path) {
                let _ = fs::remove_file(&tmp);
                return Err(e.into());
            }
            index.insert(name, path.clone(), len);
            self.dirty.lock().insert(path);
            self.evict_over_limit(&mut index)
        };

        if evicted > 0 {
            debug!(evicted, "Disk cache evicted least-recently-used files");
        }
        Ok(())
    }

    fn remove(&self, source: &str) -> Result<bool, CacheError> {
        let name = self.names.file_name(source);
        let mut index = self.index.lock();
        match index.remove(&name) {
            Some((path, _)) => {
                self.dirty.lock().remove(&path);
                remove_if_exists(&path)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clear(&self) -> Result<(), CacheError> {
        let mut index = self.index.lock();

        let mut first_error = None;
        for path in index.values() {
            if let Err(e) = remove_if_exists(path) {
                warn!(path = %path.display(), error = %e, "Failed to delete cache file");
                first_error.get_or_insert(e);
            }
        }

        index.clear();
        self.dirty.lock().clear();

        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn flush(&self) -> Result<(), CacheError> {
        let pending: Vec<PathBuf> = self.dirty.lock().drain().collect();
        if pending.is_empty() {
            return Ok(());
        }

        for path in &pending {
            match File::open(path).and_then(|file| file.sync_all()) {
                Ok(()) => {}
                // Evicted or replaced since it was written
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }

        debug!(files = pending.len(), "Disk cache flushed");
        Ok(())
    }

    fn close(&self) -> Result<(), CacheError> {
        let mut closed = self.closed.write();
        if *closed {
            return Ok(());
        }
        let result = self.flush();
        *closed = true;
        info!(dir = %self.cache_dir.display(), "Disk cache closed");
        result
    }

    fn path_for(&self, source: &str) -> Option<PathBuf> {
        let name = self.names.file_name(source);
        self.index.lock().peek(&name).cloned()
    }
}

fn encode_expiry(expires_at: Option<SystemTime>) -> [u8; HEADER_LEN] {
    let millis = expires_at
        .map(|at| {
            at.duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0)
                // 0 is reserved for "never"
                .max(1)
        })
        .unwrap_or(0);
    millis.to_be_bytes()
}

fn decode_expiry(header: [u8; HEADER_LEN]) -> Option<SystemTime> {
    match u64::from_be_bytes(header) {
        0 => None,
        millis => UNIX_EPOCH.checked_add(Duration::from_millis(millis)),
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
