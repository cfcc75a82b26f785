//! artfetch - asynchronous artifact loading for UI consumers
//!
//! Resolves artifacts (images and other visual resources) through a bounded
//! memory cache, a persistent disk cache and a remote downloader, while
//! keeping at most one pending task per consumer and dropping results that
//! arrive after the consumer moved on.
//!
//! # High-Level API
//!
//! ```no_run
//! use artfetch::loader::{ArtifactLoader, ConsumerHandle};
//! use artfetch::key::DisplayConfig;
//!
//! let loader = ArtifactLoader::builder().worker_threads(4).build()?;
//!
//! let thumbnail = ConsumerHandle::new();
//! let config = DisplayConfig::new().with_max_size(128, 128);
//! loader.request(&thumbnail, "https://example.com/a.png", Some(config));
//! # Ok::<(), artfetch::loader::ConfigError>(())
//! ```
//!
//! Decoding, scaling and rendering are left to the consumer; the loader
//! only decides whether and from where an artifact is fetched, and whether
//! the result is still wanted.

pub mod artifact;
pub mod cache;
pub mod config;
pub mod download;
pub mod key;
pub mod loader;
pub mod logging;
pub mod system;

pub use artifact::{Artifact, LoadedFrom};
pub use key::{DisplayConfig, PixelFormat, RequestKey};
pub use loader::{ArtifactLoader, ConsumerHandle, LoadCallback, RequestStatus};

/// Version of the library and CLI, shared across the workspace.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
