//! Task creation, dedup, supersession and the task run loop.
//!
//! # Task flow
//!
//! ```text
//! submit ──► Queued ──► worker slot ──► Running
//!                                        │
//!              pause gate ◄──────────────┤ (cancel checked at every step)
//!              on_started                │
//!              disk lookup ── hit ──────►├──► deliver Completed(DiskCache)
//!              remote fetch ─ ok ──store─►├──► deliver Completed(Remote)
//!                           └ err ───────►└──► deliver Failed
//! ```
//!
//! Delivery re-validates the binding under the loader's delivery lock, so
//! a superseded task finishes as `Cancelled` without firing a callback.

use crate::artifact::LoadedFrom;
use crate::cache::{CacheEntry, CacheFacade};
use crate::download::{FetchCoalescer, FetchError};
use crate::key::{DisplayConfig, RequestKey};
use crate::loader::callback::{LoadCallback, LoadFailure};
use crate::loader::consumer::{ConsumerBinding, ConsumerHandle, DeliveryLock};
use crate::loader::pause::PauseGate;
use crate::loader::pool::WorkerPool;
use crate::loader::task::{TaskId, TaskShared, TaskState};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

/// Result of handing a cache-missing request to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// A new task was created, bound and queued.
    Scheduled(TaskId),
    /// The consumer's pending task already serves this key.
    Deduplicated(TaskId),
}

/// Everything a running task needs, shared by all tasks of one loader.
pub(crate) struct LoaderContext {
    pub(crate) facade: Arc<CacheFacade>,
    pub(crate) binding: ConsumerBinding,
    pub(crate) delivery: DeliveryLock,
    pub(crate) gate: PauseGate,
    pub(crate) pool: WorkerPool,
    pub(crate) coalescer: Option<FetchCoalescer<CacheEntry>>,
    pub(crate) callback: Arc<dyn LoadCallback>,
}

pub(crate) struct TaskScheduler {
    ctx: Arc<LoaderContext>,
    runtime: Handle,
    tracker: TaskTracker,
    next_id: AtomicU64,
}

impl TaskScheduler {
    pub(crate) fn new(ctx: LoaderContext, runtime: Handle) -> Self {
        Self {
            ctx: Arc::new(ctx),
            runtime,
            tracker: TaskTracker::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn context(&self) -> &LoaderContext {
        &self.ctx
    }

    pub(crate) fn runtime(&self) -> &Handle {
        &self.runtime
    }

    /// Apply the submission policy for `(consumer, key)`.
    ///
    /// Must be called with the delivery lock held.
    pub(crate) fn submit(
        &self,
        consumer: &ConsumerHandle,
        key: RequestKey,
        config: DisplayConfig,
    ) -> Submission {
        if let Some(current) = self.ctx.binding.current_task(consumer.id()) {
            if current.serves(&key) {
                debug!(
                    task = %current.id(),
                    consumer = %consumer.id(),
                    key = %key,
                    "Request folded into pending task"
                );
                return Submission::Deduplicated(current.id());
            }
            debug!(
                task = %current.id(),
                consumer = %consumer.id(),
                key = %current.key(),
                "Superseding pending task"
            );
            current.cancel();
        }

        let id = TaskId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let task = Arc::new(TaskShared::new(id, key, consumer.downgrade(), config));
        self.ctx.binding.bind(consumer.id(), &task);
        task.transition(TaskState::Queued);

        debug!(task = %id, consumer = %consumer.id(), key = %task.key(), "Task queued");
        self.tracker
            .spawn_on(Arc::clone(&self.ctx).run(task), &self.runtime);

        Submission::Scheduled(id)
    }

    /// Unbind and cancel whatever task `consumer` is waiting on.
    pub(crate) fn supersede(&self, consumer: &ConsumerHandle) {
        if let Some(task) = self.ctx.binding.unbind(consumer.id()) {
            debug!(task = %task.id(), consumer = %consumer.id(), "Pending task superseded");
            task.cancel();
        }
    }

    /// Unbind and cancel every pending task. Returns how many were cancelled.
    pub(crate) fn cancel_all(&self) -> usize {
        let tasks = self.ctx.binding.drain();
        for task in &tasks {
            task.cancel();
        }
        tasks.len()
    }

    /// Number of spawned tasks that have not finished yet.
    pub(crate) fn active_tasks(&self) -> usize {
        self.tracker.len()
    }
}

impl LoaderContext {
    async fn run(self: Arc<Self>, task: Arc<TaskShared>) {
        let permit = tokio::select! {
            biased;
            _ = task.cancel_token().cancelled() => None,
            permit = self.pool.acquire() => permit,
        };
        let Some(_permit) = permit else {
            self.finish_cancelled(&task, "waiting for a worker");
            return;
        };
        task.transition(TaskState::Running);

        if !self.gate.wait_open(task.cancel_token()).await || self.should_abort(&task) {
            self.finish_cancelled(&task, "pause gate");
            return;
        }

        self.notify_started(&task);

        if self.facade.disk_enabled() {
            if self.should_abort(&task) {
                self.finish_cancelled(&task, "before disk lookup");
                return;
            }
            if let Some(entry) = self.lookup_disk(&task).await {
                self.facade.store_memory(task.key(), &entry);
                self.deliver_completed(&task, &entry, LoadedFrom::DiskCache);
                return;
            }
        }

        if self.should_abort(&task) {
            self.finish_cancelled(&task, "before remote fetch");
            return;
        }

        match self.fetch_remote(&task).await {
            Ok(entry) => {
                // Good bytes are cached even if nobody wants them any more
                self.store(&task, &entry).await;
                self.deliver_completed(&task, &entry, LoadedFrom::Remote);
            }
            Err(FetchError::Cancelled) => self.finish_cancelled(&task, "remote fetch"),
            Err(e) => self.deliver_failed(&task, LoadFailure::Fetch(e)),
        }
    }

    fn should_abort(&self, task: &TaskShared) -> bool {
        task.is_cancelled()
            || !task.consumer().is_alive()
            || !self.binding.is_bound(task.consumer().id(), task.id())
    }

    async fn lookup_disk(&self, task: &TaskShared) -> Option<CacheEntry> {
        let facade = Arc::clone(&self.facade);
        let key = task.key().clone();
        match tokio::task::spawn_blocking(move || facade.lookup_disk(&key)).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(task = %task.id(), error = %e, "Disk lookup worker failed");
                None
            }
        }
    }

    async fn fetch_remote(&self, task: &TaskShared) -> Result<CacheEntry, FetchError> {
        let download = || {
            let facade = Arc::clone(&self.facade);
            let source = task.key().source().to_string();
            let cancel = task.cancel_token().clone();
            async move {
                tokio::task::spawn_blocking(move || facade.fetch_remote(&source, &cancel))
                    .await
                    .map_err(|e| FetchError::Worker(e.to_string()))?
            }
        };

        match &self.coalescer {
            Some(coalescer) => {
                coalescer
                    .fetch(task.key().source(), task.cancel_token(), download)
                    .await
            }
            None => download().await,
        }
    }

    async fn store(&self, task: &TaskShared, entry: &CacheEntry) {
        let facade = Arc::clone(&self.facade);
        let key = task.key().clone();
        let entry = entry.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || facade.store(&key, &entry)).await {
            warn!(task = %task.id(), error = %e, "Cache store worker failed");
        }
    }

    fn callback_for(&self, task: &TaskShared) -> Arc<dyn LoadCallback> {
        task.config()
            .callback
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.callback))
    }

    fn notify_started(&self, task: &TaskShared) {
        let Some(consumer) = task.consumer().upgrade() else {
            return;
        };
        let _delivery = self.delivery.lock();
        if task.is_cancelled() || !self.binding.is_bound(consumer.id(), task.id()) {
            return;
        }
        self.callback_for(task)
            .on_started(task.key(), &consumer, task.config());
    }

    fn deliver_completed(&self, task: &TaskShared, entry: &CacheEntry, from: LoadedFrom) {
        self.deliver(task, TaskState::Completed(from), |callback, consumer| {
            callback.on_completed(task.key(), consumer, &entry.artifact, task.config(), from)
        });
    }

    fn deliver_failed(&self, task: &TaskShared, failure: LoadFailure) {
        debug!(task = %task.id(), key = %task.key(), error = %failure, "Task failed");
        self.deliver(task, TaskState::Failed, |callback, consumer| {
            callback.on_failed(
                task.key(),
                consumer,
                task.config().failed_artifact.as_ref(),
                &failure,
            )
        });
    }

    /// Fire a terminal callback if `task` still owns its consumer.
    ///
    /// The ownership check and the unbinding happen atomically, under the
    /// delivery lock, immediately before the callback.
    fn deliver<F>(&self, task: &TaskShared, outcome: TaskState, emit: F)
    where
        F: FnOnce(&dyn LoadCallback, &ConsumerHandle),
    {
        let Some(consumer) = task.consumer().upgrade() else {
            self.finish_cancelled(task, "consumer dropped");
            return;
        };
        let _delivery = self.delivery.lock();

        if task.is_cancelled() {
            self.finish_cancelled(task, "before delivery");
            return;
        }
        if !self.binding.unbind_if(consumer.id(), task.id()) {
            task.transition(TaskState::Cancelled);
            debug!(task = %task.id(), key = %task.key(), "Superseded result discarded");
            return;
        }

        task.transition(outcome);
        debug!(task = %task.id(), key = %task.key(), state = %outcome, "Task finished");
        emit(self.callback_for(task).as_ref(), &consumer);
    }

    fn finish_cancelled(&self, task: &TaskShared, stage: &'static str) {
        task.transition(TaskState::Cancelled);
        self.binding.unbind_if(task.consumer().id(), task.id());
        debug!(task = %task.id(), key = %task.key(), stage, "Task cancelled");
    }
}
