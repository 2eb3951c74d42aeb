//! Two-phase deletion with an undo window.
//!
//! A [`PendingDeletion`] starts `Armed`. It leaves that state exactly once:
//! to `Committed` when the window elapses or the prompt is dismissed (the
//! delete action runs at that moment), or to `Cancelled` when the user undoes
//! it. Undo never re-inserts anything, so a late undo after the commit is a
//! plain no-op.

use std::{fmt, sync::Arc, time::Duration};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::{sync::Notify, time::Instant};
use tracing::debug;

use crate::models::{GameId, GameRecord};

/// Errors raised when arming a deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum UndoError {
    /// A clear-all window is already open.
    #[error("clearing the backlog is already pending")]
    DeleteAllPending,
}

/// Lifecycle of a pending deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionState {
    /// Waiting for the window to elapse or for an undo.
    Armed,
    /// The delete was dispatched.
    Committed,
    /// The user undid the deletion.
    Cancelled,
}

/// What a pending deletion removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionTarget {
    /// A single game.
    One(GameRecord),
    /// Every game that was listed when the clear was armed.
    All(Vec<GameId>),
}

impl DeletionTarget {
    /// Whether the target hides the given game from the display.
    pub fn covers(&self, id: GameId) -> bool {
        match self {
            Self::One(record) => record.id == id,
            Self::All(ids) => ids.contains(&id),
        }
    }
}

type CommitAction = Box<dyn FnOnce() + Send>;

/// Handle to an armed deletion. Clones share the same state.
#[derive(Clone)]
pub struct PendingDeletion {
    inner: Arc<Inner>,
}

struct Inner {
    target: DeletionTarget,
    deadline: Instant,
    state: Mutex<DeletionState>,
    action: Mutex<Option<CommitAction>>,
    wake: Notify,
}

impl PendingDeletion {
    /// Arm a deletion that runs `action` once `window` elapses unless undone.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm(
        target: DeletionTarget,
        window: Duration,
        action: impl FnOnce() + Send + 'static,
    ) -> Self {
        let pending = Self {
            inner: Arc::new(Inner {
                target,
                deadline: Instant::now() + window,
                state: Mutex::new(DeletionState::Armed),
                action: Mutex::new(Some(Box::new(action))),
                wake: Notify::new(),
            }),
        };
        debug!(deletion = ?pending.inner.target, ?window, "Deletion armed");

        let timer = pending.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep_until(timer.inner.deadline) => {
                    timer.commit_now();
                }
                _ = timer.inner.wake.notified() => {}
            }
        });
        pending
    }

    /// Cancel the deletion. Returns `false` when it already committed or was undone.
    pub fn undo(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if *state != DeletionState::Armed {
                return false;
            }
            *state = DeletionState::Cancelled;
        }
        self.inner.action.lock().take();
        self.inner.wake.notify_one();
        debug!(deletion = ?self.inner.target, "Deletion undone");
        true
    }

    /// Commit immediately instead of waiting for the window.
    ///
    /// Returns `false` when the deletion was already resolved.
    pub fn commit_now(&self) -> bool {
        {
            let mut state = self.inner.state.lock();
            if *state != DeletionState::Armed {
                return false;
            }
            *state = DeletionState::Committed;
        }
        self.inner.wake.notify_one();
        let action = self.inner.action.lock().take();
        if let Some(action) = action {
            action();
        }
        debug!(deletion = ?self.inner.target, "Deletion committed");
        true
    }

    /// Current state.
    pub fn state(&self) -> DeletionState {
        *self.inner.state.lock()
    }

    /// Whether the deletion is still waiting.
    pub fn is_armed(&self) -> bool {
        self.state() == DeletionState::Armed
    }

    /// What will be deleted.
    pub fn target(&self) -> &DeletionTarget {
        &self.inner.target
    }

    /// Time left in the undo window.
    pub fn remaining(&self) -> Duration {
        self.inner.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether two handles refer to the same deletion.
    pub fn same_as(&self, other: &PendingDeletion) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for PendingDeletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingDeletion")
            .field("target", &self.inner.target)
            .field("state", &self.state())
            .field("remaining", &self.remaining())
            .finish()
    }
}
