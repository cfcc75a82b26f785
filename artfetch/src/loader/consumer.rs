//! Consumer identity and the consumer-to-task binding.
//!
//! A [`ConsumerHandle`] stands for whatever ends up showing an artifact.
//! The loader never keeps a consumer alive: tasks hold a [`WeakConsumer`],
//! and [`ConsumerBinding`] holds weak task references keyed by consumer id.
//!
//! # Delivery lock
//!
//! One reentrant [`DeliveryLock`] per loader. Submitting a request and
//! delivering an event both run under it, so the "is this task still
//! bound?" check and the callback it guards cannot interleave with a newer
//! request. A single loader-wide lock leaves no ordering between consumers
//! to get wrong: a callback may request for any consumer, its own included,
//! from the delivering thread.

use crate::loader::task::{TaskId, TaskShared};
use dashmap::DashMap;
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

static NEXT_CONSUMER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique consumer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

struct ConsumerInner {
    id: ConsumerId,
}

/// Opaque identity of the recipient of a request.
///
/// Clones refer to the same consumer. Dropping the last clone supersedes
/// whatever task is still pending for it.
#[derive(Clone)]
pub struct ConsumerHandle {
    inner: Arc<ConsumerInner>,
}

impl ConsumerHandle {
    /// Create a new, distinct consumer.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ConsumerInner {
                id: ConsumerId(NEXT_CONSUMER_ID.fetch_add(1, Ordering::Relaxed)),
            }),
        }
    }

    /// This consumer's identifier.
    pub fn id(&self) -> ConsumerId {
        self.inner.id
    }

    pub(crate) fn downgrade(&self) -> WeakConsumer {
        WeakConsumer {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl Default for ConsumerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ConsumerHandle {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for ConsumerHandle {}

impl fmt::Debug for ConsumerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ConsumerHandle").field(&self.inner.id).finish()
    }
}

/// Non-owning reference to a consumer, held by its tasks.
#[derive(Clone)]
pub(crate) struct WeakConsumer {
    id: ConsumerId,
    inner: Weak<ConsumerInner>,
}

impl WeakConsumer {
    pub(crate) fn id(&self) -> ConsumerId {
        self.id
    }

    pub(crate) fn upgrade(&self) -> Option<ConsumerHandle> {
        self.inner.upgrade().map(|inner| ConsumerHandle { inner })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

/// Serializes submissions and callbacks across all consumers of a loader.
#[derive(Default)]
pub(crate) struct DeliveryLock {
    mutex: ReentrantMutex<()>,
}

impl DeliveryLock {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> ReentrantMutexGuard<'_, ()> {
        self.mutex.lock()
    }
}

/// Maps each consumer to the one task allowed to deliver to it.
#[derive(Default)]
pub(crate) struct ConsumerBinding {
    bound: DashMap<ConsumerId, (TaskId, Weak<TaskShared>)>,
}

impl ConsumerBinding {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Record `task` as the owner of `consumer`, returning the task it
    /// replaced if that one is still alive.
    pub(crate) fn bind(
        &self,
        consumer: ConsumerId,
        task: &Arc<TaskShared>,
    ) -> Option<Arc<TaskShared>> {
        self.bound
            .insert(consumer, (task.id(), Arc::downgrade(task)))
            .and_then(|(_, previous)| previous.upgrade())
    }

    /// The task currently bound to `consumer`.
    pub(crate) fn current_task(&self, consumer: ConsumerId) -> Option<Arc<TaskShared>> {
        self.bound.get(&consumer)?.1.upgrade()
    }

    /// Whether `task` is the task bound to `consumer`.
    pub(crate) fn is_bound(&self, consumer: ConsumerId, task: TaskId) -> bool {
        self.bound
            .get(&consumer)
            .is_some_and(|entry| entry.0 == task)
    }

    /// Atomically remove the binding if it still points at `task`.
    ///
    /// Returns true if it did, meaning `task` may deliver.
    pub(crate) fn unbind_if(&self, consumer: ConsumerId, task: TaskId) -> bool {
        self.bound
            .remove_if(&consumer, |_, (bound, _)| *bound == task)
            .is_some()
    }

    /// Remove whatever is bound to `consumer`.
    pub(crate) fn unbind(&self, consumer: ConsumerId) -> Option<Arc<TaskShared>> {
        self.bound
            .remove(&consumer)
            .and_then(|(_, (_, task))| task.upgrade())
    }

    /// Remove every binding, returning the tasks that are still alive.
    pub(crate) fn drain(&self) -> Vec<Arc<TaskShared>> {
        let consumers: Vec<ConsumerId> = self.bound.iter().map(|entry| *entry.key()).collect();
        consumers
            .into_iter()
            .filter_map(|consumer| self.unbind(consumer))
            .collect()
    }

    /// Number of bound consumers.
    pub(crate) fn len(&self) -> usize {
        self.bound.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::{DisplayConfig, RequestKey};

    fn task(id: u64, consumer: &ConsumerHandle) -> Arc<TaskShared> {
        Arc::new(TaskShared::new(
            TaskId::new(id),
            RequestKey::with_variant(format!("src-{}", id), "original"),
            consumer.downgrade(),
            DisplayConfig::default(),
        ))
    }

    #[test]
    fn test_handles_are_distinct() {
        let a = ConsumerHandle::new();
        let b = ConsumerHandle::new();

        assert_ne!(a, b);
        assert_eq!(a, a.clone());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_weak_consumer_does_not_keep_alive() {
        let consumer = ConsumerHandle::new();
        let weak = consumer.downgrade();

        assert!(weak.is_alive());
        assert_eq!(weak.upgrade(), Some(consumer.clone()));

        drop(consumer);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_delivery_lock_is_reentrant() {
        let lock = DeliveryLock::new();
        let _outer = lock.lock();
        let _inner = lock.lock();
    }

    #[test]
    fn test_delivery_lock_excludes_other_threads() {
        let lock = Arc::new(DeliveryLock::new());
        let guard = lock.lock();

        let other = Arc::clone(&lock);
        let (tx, rx) = std::sync::mpsc::channel();
        let handle = std::thread::spawn(move || {
            let _guard = other.lock();
            tx.send(()).unwrap();
        });

        assert!(rx
            .recv_timeout(std::time::Duration::from_millis(50))
            .is_err());
        drop(guard);
        rx.recv().unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_bind_replaces_previous() {
        let consumer = ConsumerHandle::new();
        let binding = ConsumerBinding::new();
        let first = task(1, &consumer);
        let second = task(2, &consumer);

        assert!(binding.bind(consumer.id(), &first).is_none());
        let replaced = binding.bind(consumer.id(), &second).unwrap();

        assert_eq!(replaced.id(), first.id());
        assert_eq!(binding.current_task(consumer.id()).unwrap().id(), second.id());
        assert!(!binding.is_bound(consumer.id(), first.id()));
        assert!(binding.is_bound(consumer.id(), second.id()));
    }

    #[test]
    fn test_unbind_if_only_matches_current_task() {
        let consumer = ConsumerHandle::new();
        let binding = ConsumerBinding::new();
        let first = task(1, &consumer);
        let second = task(2, &consumer);

        binding.bind(consumer.id(), &first);
        binding.bind(consumer.id(), &second);

        assert!(!binding.unbind_if(consumer.id(), first.id()));
        assert!(binding.unbind_if(consumer.id(), second.id()));
        assert!(binding.current_task(consumer.id()).is_none());
    }

    #[test]
    fn test_binding_does_not_keep_task_alive() {
        let consumer = ConsumerHandle::new();
        let binding = ConsumerBinding::new();
        let t = task(1, &consumer);

        binding.bind(consumer.id(), &t);
        drop(t);

        assert!(binding.current_task(consumer.id()).is_none());
    }

    #[test]
    fn test_drain() {
        let a = ConsumerHandle::new();
        let b = ConsumerHandle::new();
        let binding = ConsumerBinding::new();
        let ta = task(1, &a);
        let tb = task(2, &b);

        binding.bind(a.id(), &ta);
        binding.bind(b.id(), &tb);

        let mut drained: Vec<TaskId> = binding.drain().iter().map(|t| t.id()).collect();
        drained.sort();

        assert_eq!(drained, vec![ta.id(), tb.id()]);
        assert_eq!(binding.len(), 0);
    }
}
