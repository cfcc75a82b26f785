//! Bounded worker pool.
//!
//! A semaphore-backed capacity limiter: a task holds a [`WorkerPermit`]
//! for as long as it is `Running`. Tasks beyond the capacity wait for a
//! permit in FIFO order.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Semaphore-backed worker slots.
#[derive(Debug)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
    in_flight: AtomicUsize,
}

impl WorkerPool {
    /// Creates a pool with `capacity` slots (at least one).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
            in_flight: AtomicUsize::new(0),
        }
    }

    /// Acquires a slot, waiting if none is free.
    ///
    /// Returns `None` only if the pool was closed.
    pub async fn acquire(&self) -> Option<WorkerPermit<'_>> {
        let permit = self.semaphore.clone().acquire_owned().await.ok()?;
        self.in_flight.fetch_add(1, Ordering::Relaxed);

        Some(WorkerPermit {
            _permit: permit,
            in_flight: &self.in_flight,
        })
    }

    /// Returns the total capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of slots currently held.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }
}

/// A held worker slot, released on drop.
pub struct WorkerPermit<'a> {
    _permit: OwnedSemaphorePermit,
    in_flight: &'a AtomicUsize,
}

impl Drop for WorkerPermit<'_> {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let pool = WorkerPool::new(2);

        let a = pool.acquire().await.unwrap();
        let b = pool.acquire().await.unwrap();
        assert_eq!(pool.in_flight(), 2);

        drop(a);
        assert_eq!(pool.in_flight(), 1);

        drop(b);
        assert_eq!(pool.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_acquire_waits_when_full() {
        let pool = WorkerPool::new(1);
        let held = pool.acquire().await.unwrap();

        assert!(timeout(Duration::from_millis(20), pool.acquire()).await.is_err());

        drop(held);
        assert!(timeout(Duration::from_secs(1), pool.acquire()).await.is_ok());
    }

    #[test]
    fn test_zero_capacity_clamped() {
        assert_eq!(WorkerPool::new(0).capacity(), 1);
    }
}
