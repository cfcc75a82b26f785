//! Remote fetch seam.
//!
//! The loader never talks to the network directly. It hands a source
//! identifier to a [`Downloader`] from a blocking worker thread and waits
//! for the raw bytes. [`HttpDownloader`] is the default implementation;
//! tests and embedders plug in their own.

mod coalesce;
mod http;

pub use coalesce::{CoalescerStats, FetchCoalescer};
pub use http::{HttpDownloader, DEFAULT_MAX_DOWNLOAD_SIZE};

use bytes::Bytes;
use std::time::SystemTime;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Raw data returned by a [`Downloader`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Download {
    /// Payload bytes
    pub data: Bytes,
    /// Freshness reported by the origin, if any
    pub expires_at: Option<SystemTime>,
}

impl Download {
    /// Create a download with no origin-provided expiry.
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            expires_at: None,
        }
    }

    /// Attach an origin-provided expiry.
    pub fn with_expiry(mut self, expires_at: SystemTime) -> Self {
        self.expires_at = Some(expires_at);
        self
    }
}

/// Errors that can occur while fetching a source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The source identifier is not something this downloader can fetch
    #[error("Unsupported source '{0}'")]
    UnsupportedSource(String),

    /// The request could not be sent or the body could not be read
    #[error("Request to {url} failed: {message}")]
    Http { url: String, message: String },

    /// The origin answered with a non-success status
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Reading a local source failed
    #[error("I/O error reading {url}: {message}")]
    Io { url: String, message: String },

    /// The payload exceeds the downloader's size limit
    #[error("{url} exceeds the {limit} byte download limit")]
    TooLarge { url: String, limit: u64 },

    /// The fetch observed its cancellation signal
    #[error("Fetch cancelled")]
    Cancelled,

    /// The blocking worker running the fetch died
    #[error("Download worker failed: {0}")]
    Worker(String),
}

/// Fetches raw source data.
///
/// Called from a blocking thread; implementations may block freely. A
/// cancellable implementation should poll `cancel` between chunks and
/// return [`FetchError::Cancelled`] once it fires.
pub trait Downloader: Send + Sync {
    /// Fetch the bytes for `source`.
    fn fetch(&self, source: &str, cancel: &CancellationToken) -> Result<Download, FetchError>;
}

impl<F> Downloader for F
where
    F: Fn(&str, &CancellationToken) -> Result<Download, FetchError> + Send + Sync,
{
    fn fetch(&self, source: &str, cancel: &CancellationToken) -> Result<Download, FetchError> {
        self(source, cancel)
    }
}
