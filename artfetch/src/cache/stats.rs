//! Cache statistics tracking and reporting.

use std::time::Instant;

/// Cache statistics for monitoring and debugging.
#[derive(Debug, Clone)]
pub struct CacheStats {
    // Memory cache metrics
    pub memory_hits: u64,
    pub memory_misses: u64,
    pub memory_size_bytes: usize,
    pub memory_entry_count: usize,
    pub memory_evictions: u64,

    // Disk cache metrics
    pub disk_hits: u64,
    pub disk_misses: u64,
    pub disk_read_errors: u64,
    pub disk_writes: u64,
    pub disk_write_failures: u64,

    // Download metrics
    pub downloads: u64,
    pub download_failures: u64,
    pub bytes_downloaded: u64,

    // Timing
    pub created_at: Instant,
}

impl Default for CacheStats {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheStats {
    /// Create a new statistics tracker.
    pub fn new() -> Self {
        Self {
            memory_hits: 0,
            memory_misses: 0,
            memory_size_bytes: 0,
            memory_entry_count: 0,
            memory_evictions: 0,
            disk_hits: 0,
            disk_misses: 0,
            disk_read_errors: 0,
            disk_writes: 0,
            disk_write_failures: 0,
            downloads: 0,
            download_failures: 0,
            bytes_downloaded: 0,
            created_at: Instant::now(),
        }
    }

    /// Calculate memory cache hit rate (0.0 to 1.0).
    pub fn memory_hit_rate(&self) -> f64 {
        let total = self.memory_hits + self.memory_misses;
        if total == 0 {
            0.0
        } else {
            self.memory_hits as f64 / total as f64
        }
    }

    /// Calculate disk cache hit rate (0.0 to 1.0).
    pub fn disk_hit_rate(&self) -> f64 {
        let total = self.disk_hits + self.disk_misses;
        if total == 0 {
            0.0
        } else {
            self.disk_hits as f64 / total as f64
        }
    }

    /// Calculate overall cache hit rate (0.0 to 1.0).
    ///
    /// Every lookup that reached the disk tier was a memory miss, so the
    /// denominator is memory lookups alone.
    pub fn overall_hit_rate(&self) -> f64 {
        let total = self.memory_hits + self.memory_misses;
        if total == 0 {
            0.0
        } else {
            (self.memory_hits + self.disk_hits) as f64 / total as f64
        }
    }

    /// Get the uptime duration since statistics started.
    pub fn uptime(&self) -> std::time::Duration {
        self.created_at.elapsed()
    }

    /// Record a memory cache hit.
    pub fn record_memory_hit(&mut self) {
        self.memory_hits += 1;
    }

    /// Record a memory cache miss.
    pub fn record_memory_miss(&mut self) {
        self.memory_misses += 1;
    }

    /// Record memory cache evictions.
    pub fn record_memory_eviction(&mut self, count: u64) {
        self.memory_evictions += count;
    }

    /// Update memory cache size snapshot.
    pub fn update_memory_size(&mut self, size_bytes: usize, entry_count: usize) {
        self.memory_size_bytes = size_bytes;
        self.memory_entry_count = entry_count;
    }

    /// Record a disk cache hit.
    pub fn record_disk_hit(&mut self) {
        self.disk_hits += 1;
    }

    /// Record a disk cache miss.
    pub fn record_disk_miss(&mut self) {
        self.disk_misses += 1;
    }

    /// Record a disk read that failed and was treated as a miss.
    pub fn record_disk_read_error(&mut self) {
        self.disk_read_errors += 1;
        self.disk_misses += 1;
    }

    /// Record a successful disk write.
    pub fn record_disk_write(&mut self) {
        self.disk_writes += 1;
    }

    /// Record a failed disk write.
    pub fn record_disk_write_failure(&mut self) {
        self.disk_write_failures += 1;
    }

    /// Record a successful download.
    pub fn record_download(&mut self, bytes: u64) {
        self.downloads += 1;
        self.bytes_downloaded += bytes;
    }

    /// Record a failed download.
    pub fn record_download_failure(&mut self) {
        self.download_failures += 1;
    }

    /// Fold the memory-tier counters from `memory` into these stats.
    pub(crate) fn merge_memory(&mut self, memory: &CacheStats) {
        self.memory_hits = memory.memory_hits;
        self.memory_misses = memory.memory_misses;
        self.memory_evictions = memory.memory_evictions;
        self.memory_size_bytes = memory.memory_size_bytes;
        self.memory_entry_count = memory.memory_entry_count;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_stats_are_zero() {
        let stats = CacheStats::new();
        assert_eq!(stats.memory_hits, 0);
        assert_eq!(stats.disk_hits, 0);
        assert_eq!(stats.downloads, 0);
        assert_eq!(stats.memory_hit_rate(), 0.0);
        assert_eq!(stats.disk_hit_rate(), 0.0);
        assert_eq!(stats.overall_hit_rate(), 0.0);
    }

    #[test]
    fn test_memory_hit_rate() {
        let mut stats = CacheStats::new();
        stats.record_memory_hit();
        stats.record_memory_hit();
        stats.record_memory_hit();
        stats.record_memory_miss();

        assert_eq!(stats.memory_hit_rate(), 0.75);
    }

    #[test]
    fn test_overall_hit_rate_counts_both_tiers() {
        let mut stats = CacheStats::new();
        stats.record_memory_hit();
        stats.record_memory_miss();
        stats.record_memory_miss();
        stats.record_disk_hit();
        stats.record_disk_miss();

        assert!((stats.overall_hit_rate() - 2.0 / 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_disk_read_error_counts_as_miss() {
        let mut stats = CacheStats::new();
        stats.record_disk_read_error();

        assert_eq!(stats.disk_read_errors, 1);
        assert_eq!(stats.disk_misses, 1);
    }

    #[test]
    fn test_download_tracking() {
        let mut stats = CacheStats::new();
        stats.record_download(1000);
        stats.record_download(500);
        stats.record_download_failure();

        assert_eq!(stats.downloads, 2);
        assert_eq!(stats.bytes_downloaded, 1500);
        assert_eq!(stats.download_failures, 1);
    }

    #[test]
    fn test_merge_memory() {
        let mut memory = CacheStats::new();
        memory.record_memory_hit();
        memory.record_memory_eviction(3);
        memory.update_memory_size(2048, 2);

        let mut stats = CacheStats::new();
        stats.record_disk_hit();
        stats.merge_memory(&memory);

        assert_eq!(stats.memory_hits, 1);
        assert_eq!(stats.memory_evictions, 3);
        assert_eq!(stats.memory_size_bytes, 2048);
        assert_eq!(stats.disk_hits, 1);
    }
}
