//! Fetch coalescing across consumers.
//!
//! When several consumers ask for the same source at once, only the first
//! task (the leader) calls the downloader. Later tasks subscribe to the
//! leader's result instead of starting their own fetch.
//!
//! ```text
//! Task A (leader) ───► Downloader ───┐
//! Task B (follower) ─┐               │
//! Task C (follower) ─┴── broadcast ◄─┘
//! ```
//!
//! A follower whose leader was cancelled, or vanished without answering,
//! falls back to fetching on its own. A follower's own cancellation ends
//! its wait immediately.

use super::FetchError;
use dashmap::DashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::debug;

type SharedResult<T> = Result<T, FetchError>;

/// Statistics for monitoring coalescing effectiveness.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CoalescerStats {
    /// Total fetches routed through the coalescer
    pub total_requests: u64,
    /// Fetches that waited on another task's download
    pub coalesced_requests: u64,
    /// Fetches that called the downloader themselves
    pub new_requests: u64,
}

impl CoalescerStats {
    /// Returns the coalescing ratio (0.0 to 1.0)
    pub fn coalescing_ratio(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.coalesced_requests as f64 / self.total_requests as f64
        }
    }
}

/// Shares in-flight downloads between tasks fetching the same source.
///
/// `T` is whatever the fetch produces; it is cloned once per waiter.
pub struct FetchCoalescer<T> {
    in_flight: DashMap<String, broadcast::Sender<SharedResult<T>>>,
    total_requests: AtomicU64,
    coalesced_requests: AtomicU64,
    new_requests: AtomicU64,
}

enum Role<T> {
    Leader(broadcast::Sender<SharedResult<T>>),
    Follower(broadcast::Receiver<SharedResult<T>>),
}

/// Removes the leader's entry even if its future is dropped mid-fetch.
struct InFlightGuard<'a, T> {
    in_flight: &'a DashMap<String, broadcast::Sender<SharedResult<T>>>,
    source: &'a str,
}

impl<T> Drop for InFlightGuard<'_, T> {
    fn drop(&mut self) {
        self.in_flight.remove(self.source);
    }
}

impl<T: Clone> FetchCoalescer<T> {
    /// Creates an empty coalescer.
    pub fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
            total_requests: AtomicU64::new(0),
            coalesced_requests: AtomicU64::new(0),
            new_requests: AtomicU64::new(0),
        }
    }

    fn register(&self, source: &str) -> Role<T> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        match self.in_flight.entry(source.to_string()) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                self.coalesced_requests.fetch_add(1, Ordering::Relaxed);
                debug!(source, "Coalescing fetch with in-flight download");
                Role::Follower(entry.get().subscribe())
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                self.new_requests.fetch_add(1, Ordering::Relaxed);
                // One message per download; followers only ever need the latest.
                let (tx, _rx) = broadcast::channel(1);
                entry.insert(tx.clone());
                Role::Leader(tx)
            }
        }
    }

    /// Run `fetch` for `source`, or wait for an identical in-flight fetch.
    ///
    /// `fetch` is invoked at most once per call: by the leader, or by a
    /// follower whose leader could not deliver a usable result.
    pub async fn fetch<F, Fut>(
        &self,
        source: &str,
        cancel: &CancellationToken,
        fetch: F,
    ) -> Result<T, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        match self.register(source) {
            Role::Leader(tx) => {
                let guard = InFlightGuard {
                    in_flight: &self.in_flight,
                    source,
                };
                let result = fetch().await;
                // Unregister before broadcasting so late arrivals start fresh
                drop(guard);

                let waiters = tx.receiver_count();
                let _ = tx.send(result.clone());
                if waiters > 0 {
                    debug!(source, waiters, "Broadcast download to coalesced waiters");
                }
                result
            }
            Role::Follower(mut rx) => {
                let shared = tokio::select! {
                    _ = cancel.cancelled() => return Err(FetchError::Cancelled),
                    received = rx.recv() => received.ok(),
                };

                match shared {
                    Some(Err(FetchError::Cancelled)) | None => {
                        debug!(source, "Leader fetch abandoned, fetching independently");
                        fetch().await
                    }
                    Some(result) => result,
                }
            }
        }
    }

    /// Returns a snapshot of the current statistics.
    pub fn stats(&self) -> CoalescerStats {
        CoalescerStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            coalesced_requests: self.coalesced_requests.load(Ordering::Relaxed),
            new_requests: self.new_requests.load(Ordering::Relaxed),
        }
    }

    /// Returns the number of currently in-flight downloads.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }
}

impl<T: Clone> Default for FetchCoalescer<T> {
    fn default() -> Self {
        Self::new()
    }
}
