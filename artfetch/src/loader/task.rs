//! Task identity and lifecycle state.

use crate::artifact::LoadedFrom;
use crate::key::{DisplayConfig, RequestKey};
use crate::loader::consumer::WeakConsumer;
use parking_lot::Mutex;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// Identifier of one resolution task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Lifecycle of a task.
///
/// ```text
/// Created -> Queued -> Running -> Completed(tier) | Cancelled | Failed
/// ```
///
/// A task may also move straight from `Queued` to `Cancelled` if it is
/// superseded before it gets a worker slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Created,
    Queued,
    Running,
    Completed(LoadedFrom),
    Cancelled,
    Failed,
}

impl TaskState {
    /// Returns true for `Completed`, `Cancelled` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed(_) | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Queued => write!(f, "queued"),
            Self::Running => write!(f, "running"),
            Self::Completed(from) => write!(f, "completed({})", from),
            Self::Cancelled => write!(f, "cancelled"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// State shared between a running task, the binding and the scheduler.
pub(crate) struct TaskShared {
    id: TaskId,
    key: RequestKey,
    consumer: WeakConsumer,
    config: DisplayConfig,
    state: Mutex<TaskState>,
    cancel: CancellationToken,
}

impl TaskShared {
    pub(crate) fn new(
        id: TaskId,
        key: RequestKey,
        consumer: WeakConsumer,
        config: DisplayConfig,
    ) -> Self {
        Self {
            id,
            key,
            consumer,
            config,
            state: Mutex::new(TaskState::Created),
            cancel: CancellationToken::new(),
        }
    }

    pub(crate) fn id(&self) -> TaskId {
        self.id
    }

    pub(crate) fn key(&self) -> &RequestKey {
        &self.key
    }

    pub(crate) fn consumer(&self) -> &WeakConsumer {
        &self.consumer
    }

    pub(crate) fn config(&self) -> &DisplayConfig {
        &self.config
    }

    pub(crate) fn state(&self) -> TaskState {
        *self.state.lock()
    }

    /// Move to `next`. Terminal states are final; returns false if the
    /// task had already finished.
    pub(crate) fn transition(&self, next: TaskState) -> bool {
        let mut state = self.state.lock();
        if state.is_terminal() {
            return false;
        }
        trace!(task = %self.id, from = %*state, to = %next, "Task state change");
        *state = next;
        true
    }

    pub(crate) fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A pending task that still serves `key`.
    pub(crate) fn serves(&self, key: &RequestKey) -> bool {
        !self.is_cancelled() && !self.state().is_terminal() && &self.key == key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::consumer::ConsumerHandle;

    fn shared(consumer: &ConsumerHandle) -> TaskShared {
        TaskShared::new(
            TaskId::new(7),
            RequestKey::with_variant("src", "original"),
            consumer.downgrade(),
            DisplayConfig::default(),
        )
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TaskState::Created.is_terminal());
        assert!(!TaskState::Queued.is_terminal());
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Completed(LoadedFrom::Remote).is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
        assert!(TaskState::Failed.is_terminal());
    }

    #[test]
    fn test_transitions_stop_at_terminal() {
        let consumer = ConsumerHandle::new();
        let task = shared(&consumer);
        assert_eq!(task.state(), TaskState::Created);

        assert!(task.transition(TaskState::Queued));
        assert!(task.transition(TaskState::Running));
        assert!(task.transition(TaskState::Cancelled));
        assert!(!task.transition(TaskState::Completed(LoadedFrom::DiskCache)));
        assert_eq!(task.state(), TaskState::Cancelled);
    }

    #[test]
    fn test_serves() {
        let consumer = ConsumerHandle::new();
        let task = shared(&consumer);
        let key = RequestKey::with_variant("src", "original");

        assert!(task.serves(&key));
        assert!(!task.serves(&RequestKey::with_variant("other", "original")));

        task.cancel();
        assert!(!task.serves(&key));
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            TaskState::Completed(LoadedFrom::DiskCache).to_string(),
            "completed(disk)"
        );
        assert_eq!(TaskId::new(3).to_string(), "task-3");
    }
}
