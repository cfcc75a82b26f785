//! Process-wide pause gate shared by every task of a loader.
//!
//! The gate is a `watch` channel. Waiters mark the current value as seen
//! before checking it and only sleep on `changed()`, so a state change
//! between the check and the sleep is never lost.

use std::fmt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// State of the pause gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Tasks pass freely.
    Open,
    /// Tasks block at their next pause check.
    Paused,
    /// Paused, and every waiter was woken so cancelled tasks can leave.
    Stopped,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Paused => write!(f, "paused"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Broadcast pause/resume/stop signal.
pub struct PauseGate {
    state: watch::Sender<GateState>,
}

impl PauseGate {
    /// Create an open gate.
    pub fn new() -> Self {
        let (state, _) = watch::channel(GateState::Open);
        Self { state }
    }

    /// Block tasks at their next pause check. Cancels nothing.
    pub fn pause(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == GateState::Open {
                *state = GateState::Paused;
                true
            } else {
                false
            }
        });
        if changed {
            info!("Loader paused");
        }
    }

    /// Open the gate and wake every waiter.
    pub fn resume(&self) {
        let previous = self.state.send_replace(GateState::Open);
        if previous != GateState::Open {
            info!(previous = %previous, "Loader resumed");
        }
    }

    /// Keep the gate shut but wake every waiter.
    ///
    /// Waiters whose token is cancelled leave; the rest go back to sleep
    /// until [`resume`](Self::resume).
    pub fn stop(&self) {
        self.state.send_replace(GateState::Stopped);
        info!("Loader stopped");
    }

    /// Current state.
    pub fn state(&self) -> GateState {
        *self.state.borrow()
    }

    /// Returns true unless the gate is open.
    pub fn is_paused(&self) -> bool {
        self.state() != GateState::Open
    }

    /// Wait until the gate is open.
    ///
    /// Returns `false` if `cancel` fires first.
    pub async fn wait_open(&self, cancel: &CancellationToken) -> bool {
        let mut rx = self.state.subscribe();
        loop {
            if cancel.is_cancelled() {
                return false;
            }
            if *rx.borrow_and_update() == GateState::Open {
                return true;
            }

            debug!("Task waiting on pause gate");
            tokio::select! {
                _ = cancel.cancelled() => return false,
                changed = rx.changed() => {
                    // The sender lives as long as `self`
                    if changed.is_err() {
                        return false;
                    }
                }
            }
        }
    }
}

impl Default for PauseGate {
    fn default() -> Self {
        Self::new()
    }
}
