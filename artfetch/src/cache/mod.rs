//! Two-tier artifact cache.
//!
//! Provides a bounded memory tier and a persistent disk tier with LRU
//! eviction, statistics tracking, and a facade that puts both in front of
//! the downloader.

mod disk;
mod facade;
mod filename;
mod lru_index;
mod memory;
mod stats;
mod types;

pub use disk::{DiskCache, FsDiskCache};
pub use facade::CacheFacade;
pub use filename::{FileNameGenerator, HashedFileNames};
pub use memory::{EvictionListener, MemoryCache};
pub use stats::CacheStats;
pub use types::{CacheEntry, CacheError};
