//! In-memory cache with LRU eviction.

use crate::cache::lru_index::LruIndex;
use crate::cache::types::CacheEntry;
use crate::cache::CacheStats;
use crate::key::RequestKey;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Observer notified when the memory tier evicts an entry to stay within
/// its capacity.
///
/// Called once per evicted key, outside the cache lock. Explicit removals
/// and clears are not reported.
pub trait EvictionListener: Send + Sync {
    /// `key` was evicted, freeing `cost` bytes.
    fn on_evicted(&self, key: &RequestKey, cost: usize);
}

impl<F> EvictionListener for F
where
    F: Fn(&RequestKey, usize) + Send + Sync,
{
    fn on_evicted(&self, key: &RequestKey, cost: usize) {
        self(key, cost)
    }
}

struct Inner {
    index: LruIndex<RequestKey, CacheEntry>,
    stats: CacheStats,
}

/// In-memory cache for resolved artifacts.
///
/// Provides fast synchronous access to recently used artifacts. The total
/// cost of resident entries never exceeds `max_size_bytes`: an insertion
/// that would overflow evicts least-recently-used entries first, and an
/// entry larger than the whole cache is not admitted.
pub struct MemoryCache {
    inner: Mutex<Inner>,
    max_size_bytes: usize,
    listener: Option<Arc<dyn EvictionListener>>,
}

impl MemoryCache {
    /// Create a new memory cache with the given size limit.
    ///
    /// # Arguments
    ///
    /// * `max_size_bytes` - Maximum total cost in bytes
    pub fn new(max_size_bytes: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                index: LruIndex::new(),
                stats: CacheStats::new(),
            }),
            max_size_bytes,
            listener: None,
        }
    }

    /// Attach an eviction listener.
    pub fn with_eviction_listener(mut self, listener: Arc<dyn EvictionListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Get a cached entry.
    ///
    /// Returns `Some(entry)` if present and fresh. Expired entries are
    /// dropped and reported as misses.
    pub fn get(&self, key: &RequestKey) -> Option<CacheEntry> {
        let mut inner = self.inner.lock();
        let now = SystemTime::now();

        let expired = match inner.index.get(key) {
            Some(entry) if !entry.is_expired_at(now) => {
                let entry = entry.clone();
                inner.stats.record_memory_hit();
                return Some(entry);
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            inner.index.remove(key);
            Self::refresh_size(&mut inner);
        }
        inner.stats.record_memory_miss();
        None
    }

    /// Put an entry into the cache.
    ///
    /// Evicts least-recently-used entries until the new entry fits. Returns
    /// `false` if the entry alone exceeds the capacity and was not stored.
    pub fn put(&self, key: RequestKey, entry: CacheEntry) -> bool {
        let cost = entry.cost();
        if cost > self.max_size_bytes {
            debug!(
                key = %key,
                cost,
                capacity = self.max_size_bytes,
                "Entry larger than memory cache, not admitted"
            );
            // A stale smaller version must not outlive the newer store.
            self.remove(&key);
            return false;
        }

        let evicted = {
            let mut inner = self.inner.lock();
            inner.index.remove(&key);

            let mut evicted = Vec::new();
            while inner.index.total_cost() as usize + cost > self.max_size_bytes {
                match inner.index.pop_oldest() {
                    Some((old_key, _, old_cost)) => evicted.push((old_key, old_cost as usize)),
                    None => break,
                }
            }

            inner.index.insert(key, entry, cost as u64);
            inner.stats.record_memory_eviction(evicted.len() as u64);
            Self::refresh_size(&mut inner);
            evicted
        };

        if !evicted.is_empty() {
            debug!(
                evicted = evicted.len(),
                "Memory cache evicted least-recently-used entries"
            );
        }
        if let Some(listener) = &self.listener {
            for (key, cost) in &evicted {
                listener.on_evicted(key, *cost);
            }
        }

        true
    }

    /// Remove a single entry. Returns true if it was present.
    pub fn remove(&self, key: &RequestKey) -> bool {
        let mut inner = self.inner.lock();
        let removed = inner.index.remove(key).is_some();
        Self::refresh_size(&mut inner);
        removed
    }

    /// Check if a key exists in the cache, without touching its recency.
    pub fn contains(&self, key: &RequestKey) -> bool {
        self.inner.lock().index.contains(key)
    }

    /// Get the current number of entries in the cache.
    pub fn entry_count(&self) -> usize {
        self.inner.lock().index.len()
    }

    /// Get the current size of the cache in bytes.
    pub fn size_bytes(&self) -> usize {
        self.inner.lock().index.total_cost() as usize
    }

    /// Get the maximum size of the cache in bytes.
    pub fn max_size_bytes(&self) -> usize {
        self.max_size_bytes
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().stats.clone()
    }

    /// Clear all entries from the cache.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.index.clear();
        Self::refresh_size(&mut inner);
    }

    fn refresh_size(inner: &mut Inner) {
        let size = inner.index.total_cost() as usize;
        let count = inner.index.len();
        inner.stats.update_memory_size(size, count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Artifact;
    use proptest::prelude::*;
    use std::time::Duration;

    fn create_test_key(n: u32) -> RequestKey {
        RequestKey::with_variant(format!("https://example.com/{}.png", n), "0x0_argb8888")
    }

    fn entry_of(size: usize) -> CacheEntry {
        CacheEntry::new(Artifact::from(vec![0u8; size]))
    }

    #[derive(Default)]
    struct RecordingListener {
        evicted: Mutex<Vec<(RequestKey, usize)>>,
    }

    impl EvictionListener for RecordingListener {
        fn on_evicted(&self, key: &RequestKey, cost: usize) {
            self.evicted.lock().push((key.clone(), cost));
        }
    }

    #[test]
    fn test_memory_cache_new() {
        let cache = MemoryCache::new(1_000_000);
        assert_eq!(cache.max_size_bytes(), 1_000_000);
        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_memory_cache_put_and_get() {
        let cache = MemoryCache::new(1_000_000);
        let key = create_test_key(1);
        let entry = CacheEntry::new(Artifact::from(vec![1, 2, 3, 4, 5]));

        assert!(cache.put(key.clone(), entry.clone()));

        assert_eq!(cache.get(&key), Some(entry));
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_memory_cache_miss() {
        let cache = MemoryCache::new(1_000_000);
        assert_eq!(cache.get(&create_test_key(1)), None);
    }

    #[test]
    fn test_memory_cache_size_tracking() {
        let cache = MemoryCache::new(1_000_000);

        cache.put(create_test_key(1), entry_of(1000));
        assert_eq!(cache.size_bytes(), 1000);

        cache.put(create_test_key(2), entry_of(2000));
        assert_eq!(cache.size_bytes(), 3000);
        assert_eq!(cache.entry_count(), 2);
    }

    #[test]
    fn test_memory_cache_clear() {
        let cache = MemoryCache::new(1_000_000);
        let key = create_test_key(1);

        cache.put(key.clone(), entry_of(5));
        cache.clear();

        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.size_bytes(), 0);
        assert!(!cache.contains(&key));
    }

    #[test]
    fn test_memory_cache_lru_eviction() {
        let cache = MemoryCache::new(2500);

        cache.put(create_test_key(1), entry_of(1000));
        cache.put(create_test_key(2), entry_of(1000));
        cache.put(create_test_key(3), entry_of(1000));

        assert!(!cache.contains(&create_test_key(1)), "Oldest entry should be evicted");
        assert!(cache.contains(&create_test_key(2)));
        assert!(cache.contains(&create_test_key(3)));
        assert!(cache.size_bytes() <= 2500);
    }

    #[test]
    fn test_memory_cache_access_updates_lru() {
        let cache = MemoryCache::new(2500);

        cache.put(create_test_key(1), entry_of(1000));
        cache.put(create_test_key(2), entry_of(1000));
        cache.get(&create_test_key(1));
        cache.put(create_test_key(3), entry_of(1000));

        assert!(cache.contains(&create_test_key(1)), "Accessed entry should remain");
        assert!(!cache.contains(&create_test_key(2)));
        assert!(cache.contains(&create_test_key(3)));
    }

    #[test]
    fn test_eviction_listener_notified_once_per_key() {
        let listener = Arc::new(RecordingListener::default());
        let cache = MemoryCache::new(2000).with_eviction_listener(listener.clone());

        for i in 1..=5 {
            cache.put(create_test_key(i), entry_of(1000));
        }

        let evicted = listener.evicted.lock().clone();
        assert_eq!(
            evicted,
            vec![
                (create_test_key(1), 1000),
                (create_test_key(2), 1000),
                (create_test_key(3), 1000),
            ]
        );
        assert_eq!(cache.stats().memory_evictions, 3);
    }

    #[test]
    fn test_clear_and_remove_do_not_notify_listener() {
        let listener = Arc::new(RecordingListener::default());
        let cache = MemoryCache::new(10_000).with_eviction_listener(listener.clone());

        cache.put(create_test_key(1), entry_of(10));
        cache.put(create_test_key(2), entry_of(10));
        assert!(cache.remove(&create_test_key(1)));
        cache.clear();

        assert!(listener.evicted.lock().is_empty());
    }

    #[test]
    fn test_closure_listener() {
        let count = Arc::new(Mutex::new(0usize));
        let seen = count.clone();
        let cache = MemoryCache::new(100).with_eviction_listener(Arc::new(
            move |_: &RequestKey, _: usize| {
                *seen.lock() += 1;
            },
        ));

        cache.put(create_test_key(1), entry_of(100));
        cache.put(create_test_key(2), entry_of(100));

        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_memory_cache_oversized_entry_rejected() {
        let cache = MemoryCache::new(1000);
        cache.put(create_test_key(1), entry_of(500));

        assert!(!cache.put(create_test_key(2), entry_of(5000)));
        assert!(cache.contains(&create_test_key(1)));
        assert!(!cache.contains(&create_test_key(2)));
        assert_eq!(cache.size_bytes(), 500);
    }

    #[test]
    fn test_memory_cache_replace_existing() {
        let cache = MemoryCache::new(1_000_000);
        let key = create_test_key(1);
        let newer = CacheEntry::new(Artifact::from(vec![4, 5, 6, 7, 8]));

        cache.put(key.clone(), entry_of(3));
        cache.put(key.clone(), newer.clone());

        assert_eq!(cache.get(&key), Some(newer));
        assert_eq!(cache.entry_count(), 1);
        assert_eq!(cache.size_bytes(), 5);
    }

    #[test]
    fn test_replacing_does_not_evict_itself() {
        let listener = Arc::new(RecordingListener::default());
        let cache = MemoryCache::new(1000).with_eviction_listener(listener.clone());
        let key = create_test_key(1);

        cache.put(key.clone(), entry_of(900));
        cache.put(key.clone(), entry_of(950));

        assert!(listener.evicted.lock().is_empty());
        assert_eq!(cache.size_bytes(), 950);
    }

    #[test]
    fn test_expired_entry_is_a_miss() {
        let cache = MemoryCache::new(1000);
        let key = create_test_key(1);
        let stale = CacheEntry::expiring_at(
            Artifact::from(vec![1, 2]),
            SystemTime::now() - Duration::from_secs(1),
        );

        cache.put(key.clone(), stale);

        assert_eq!(cache.get(&key), None);
        assert!(!cache.contains(&key));
        assert_eq!(cache.stats().memory_misses, 1);
    }

    #[test]
    fn test_memory_cache_statistics() {
        let cache = MemoryCache::new(1_000_000);
        let key = create_test_key(1);

        cache.put(key.clone(), entry_of(5000));
        cache.get(&key);
        cache.get(&key);
        cache.get(&create_test_key(2));

        let stats = cache.stats();
        assert_eq!(stats.memory_hits, 2);
        assert_eq!(stats.memory_misses, 1);
        assert_eq!(stats.memory_size_bytes, 5000);
        assert_eq!(stats.memory_entry_count, 1);
    }

    proptest! {
        #[test]
        fn prop_size_never_exceeds_capacity(
            capacity in 1usize..4096,
            ops in proptest::collection::vec((0u32..16, 0usize..2048), 1..64),
        ) {
            let cache = MemoryCache::new(capacity);
            for (key, size) in ops {
                cache.put(create_test_key(key), entry_of(size));
                prop_assert!(cache.size_bytes() <= capacity);
            }
        }
    }
}
