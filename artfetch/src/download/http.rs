//! Default downloader backed by a blocking reqwest client.

use super::{Download, Downloader, FetchError};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::{Duration, SystemTime};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Size of the read buffer; cancellation is checked between chunks.
const CHUNK_SIZE: usize = 16 * 1024;

/// Upper bound on the buffer reserved from a reported length.
const MAX_PREALLOCATION: usize = CHUNK_SIZE * 64;

/// Default largest payload accepted: 64 MiB.
pub const DEFAULT_MAX_DOWNLOAD_SIZE: u64 = 64 * 1024 * 1024;

/// Default User-Agent sent with every request.
const DEFAULT_USER_AGENT: &str = concat!("artfetch/", env!("CARGO_PKG_VERSION"));

/// Fetches `http://`, `https://` and `file://` sources.
///
/// Absolute filesystem paths are accepted as local sources too. HTTP
/// responses carrying `Cache-Control: max-age` report a matching expiry.
/// Payloads larger than the size limit fail with [`FetchError::TooLarge`].
#[derive(Clone)]
pub struct HttpDownloader {
    client: reqwest::blocking::Client,
    max_bytes: u64,
}

impl HttpDownloader {
    /// Creates a downloader with a 30 second request timeout.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    /// Creates a downloader with a custom request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(DEFAULT_USER_AGENT)
            .build()
            .map_err(|e| FetchError::Http {
                url: String::new(),
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            max_bytes: DEFAULT_MAX_DOWNLOAD_SIZE,
        })
    }

    /// Replace the payload size limit.
    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn read_failure(&self, url: &str, failure: ReadFailure) -> FetchError {
        match failure {
            ReadFailure::Cancelled => FetchError::Cancelled,
            ReadFailure::TooLarge => FetchError::TooLarge {
                url: url.to_string(),
                limit: self.max_bytes,
            },
            ReadFailure::Io(e) => FetchError::Http {
                url: url.to_string(),
                message: format!("failed to read response: {}", e),
            },
        }
    }

    fn fetch_http(&self, url: &str, cancel: &CancellationToken) -> Result<Download, FetchError> {
        let response = self.client.get(url).send().map_err(|e| FetchError::Http {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let max_age = response
            .headers()
            .get(reqwest::header::CACHE_CONTROL)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_max_age);

        let reported = response.content_length();
        if reported.is_some_and(|len| len > self.max_bytes) {
            return Err(self.read_failure(url, ReadFailure::TooLarge));
        }

        let data = read_cancellable(response, reported.unwrap_or(0), self.max_bytes, cancel)
            .map_err(|e| self.read_failure(url, e))?;

        trace!(url, bytes = data.len(), ?max_age, "HTTP fetch complete");

        let download = Download::new(data);
        Ok(match max_age.and_then(|age| SystemTime::now().checked_add(age)) {
            Some(expires_at) => download.with_expiry(expires_at),
            None => download,
        })
    }

    fn fetch_file(
        &self,
        source: &str,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<Download, FetchError> {
        let io_error = |e: std::io::Error| FetchError::Io {
            url: source.to_string(),
            message: e.to_string(),
        };

        let file = File::open(path).map_err(io_error)?;
        let len = file.metadata().map(|m| m.len()).unwrap_or(0);
        let data = read_cancellable(file, len, self.max_bytes, cancel).map_err(|e| match e {
            ReadFailure::Io(e) => io_error(e),
            other => self.read_failure(source, other),
        })?;

        Ok(Download::new(data))
    }
}

impl Downloader for HttpDownloader {
    fn fetch(&self, source: &str, cancel: &CancellationToken) -> Result<Download, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }

        let source = source.trim();
        debug!(source, "Fetching");

        if source.starts_with("http://") || source.starts_with("https://") {
            self.fetch_http(source, cancel)
        } else if let Some(path) = source.strip_prefix("file://") {
            self.fetch_file(source, Path::new(path), cancel)
        } else if Path::new(source).is_absolute() {
            self.fetch_file(source, Path::new(source), cancel)
        } else {
            Err(FetchError::UnsupportedSource(source.to_string()))
        }
    }
}

#[derive(Debug)]
enum ReadFailure {
    Cancelled,
    TooLarge,
    Io(std::io::Error),
}

/// Read `reader` to the end in chunks.
///
/// `expected_len` is a hint only; the reservation is capped so a bogus
/// length cannot force a huge allocation. Fails once more than
/// `max_bytes` arrive.
fn read_cancellable(
    mut reader: impl Read,
    expected_len: u64,
    max_bytes: u64,
    cancel: &CancellationToken,
) -> Result<Vec<u8>, ReadFailure> {
    let capacity = usize::try_from(expected_len.min(max_bytes))
        .unwrap_or(MAX_PREALLOCATION)
        .min(MAX_PREALLOCATION);
    let mut data = Vec::with_capacity(capacity);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        if cancel.is_cancelled() {
            return Err(ReadFailure::Cancelled);
        }
        match reader.read(&mut chunk) {
            Ok(0) => return Ok(data),
            Ok(n) => {
                if (data.len() + n) as u64 > max_bytes {
                    return Err(ReadFailure::TooLarge);
                }
                data.extend_from_slice(&chunk[..n]);
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(ReadFailure::Io(e)),
        }
    }
}

/// Extract the `max-age` directive from a `Cache-Control` header value.
///
/// `no-store` and `no-cache` yield a zero age.
fn parse_max_age(header: &str) -> Option<Duration> {
    let mut max_age = None;
    for directive in header.split(',') {
        let directive = directive.trim().to_ascii_lowercase();
        if directive == "no-store" || directive == "no-cache" {
            return Some(Duration::ZERO);
        }
        if let Some(value) = directive.strip_prefix("max-age=") {
            max_age = value.trim_matches('"').parse::<u64>().ok().map(Duration::from_secs);
        }
    }
    max_age
}
