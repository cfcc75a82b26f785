//! Core types for the cache tiers.

use crate::artifact::Artifact;
use std::time::{Duration, SystemTime};
use thiserror::Error;

/// A resolved artifact together with its accounting metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The cached artifact
    pub artifact: Artifact,
    /// Instant after which the entry is stale, `None` if it never expires
    pub expires_at: Option<SystemTime>,
}

impl CacheEntry {
    /// Create an entry that never expires.
    pub fn new(artifact: Artifact) -> Self {
        Self {
            artifact,
            expires_at: None,
        }
    }

    /// Create an entry that expires at `expires_at`.
    pub fn expiring_at(artifact: Artifact, expires_at: SystemTime) -> Self {
        Self {
            artifact,
            expires_at: Some(expires_at),
        }
    }

    /// Create an entry that expires `ttl` from now.
    pub fn expiring_in(artifact: Artifact, ttl: Duration) -> Self {
        let expires_at = SystemTime::now().checked_add(ttl);
        Self {
            artifact,
            expires_at,
        }
    }

    /// Capacity cost of this entry (payload size in bytes).
    pub fn cost(&self) -> usize {
        self.artifact.len()
    }

    /// Returns true if the entry is stale at `now`.
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Returns true if the entry is stale now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }
}

/// Cache-related errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// I/O error during cache operations
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The cache was closed and rejects further writes
    #[error("Cache is closed")]
    Closed,

    /// The entry alone exceeds the cache capacity
    #[error("Entry of {size} bytes exceeds cache capacity of {capacity} bytes")]
    TooLarge { size: u64, capacity: u64 },

    /// A stored entry could not be decoded
    #[error("Corrupt cache entry at {path}: {reason}")]
    Corrupt { path: String, reason: String },

    /// Invalid cache configuration
    #[error("Invalid cache configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_cost_is_payload_size() {
        let entry = CacheEntry::new(Artifact::from(vec![0u8; 1500]));
        assert_eq!(entry.cost(), 1500);
    }

    #[test]
    fn test_entry_without_expiry_never_expires() {
        let entry = CacheEntry::new(Artifact::from(vec![1]));
        let far_future = SystemTime::now() + Duration::from_secs(100 * 365 * 24 * 3600);
        assert!(!entry.is_expired_at(far_future));
    }

    #[test]
    fn test_entry_expiry() {
        let now = SystemTime::now();
        let entry = CacheEntry::expiring_at(Artifact::from(vec![1]), now);

        assert!(entry.is_expired_at(now));
        assert!(!entry.is_expired_at(now - Duration::from_secs(1)));
    }

    #[test]
    fn test_entry_expiring_in_future() {
        let entry = CacheEntry::expiring_in(Artifact::from(vec![1]), Duration::from_secs(60));
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_error_display() {
        assert_eq!(CacheError::Closed.to_string(), "Cache is closed");
        assert_eq!(
            CacheError::InvalidConfig("zero capacity".into()).to_string(),
            "Invalid cache configuration: zero capacity"
        );
    }
}
