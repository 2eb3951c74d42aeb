//! Transient user notifications (toasts and undo prompts).

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::debug;

use crate::undo::PendingDeletion;

/// Label shown on the action of an undo prompt.
pub const UNDO_LABEL: &str = "Undo";

/// A message shown to the user for a limited time.
#[derive(Debug, Clone)]
pub struct Notice {
    /// Text to display.
    pub message: String,
    /// Label of the optional action.
    pub action_label: Option<String>,
    /// How long the notice stays visible.
    pub duration: Duration,
    /// Deletion undone by the action, for undo prompts.
    pub pending: Option<PendingDeletion>,
}

impl Notice {
    /// A plain informational message.
    pub fn message(message: impl Into<String>, duration: Duration) -> Self {
        Self {
            message: message.into(),
            action_label: None,
            duration,
            pending: None,
        }
    }

    /// A prompt whose action undoes `pending`.
    pub fn undo_prompt(message: impl Into<String>, pending: PendingDeletion) -> Self {
        Self {
            message: message.into(),
            action_label: Some(UNDO_LABEL.to_string()),
            duration: pending.remaining(),
            pending: Some(pending),
        }
    }

    /// Run the notice action. Returns whether it took effect before expiry.
    pub fn trigger_action(&self) -> bool {
        self.pending
            .as_ref()
            .map(PendingDeletion::undo)
            .unwrap_or(false)
    }
}

/// Sink for notices; implemented by whatever presents them to the user.
pub trait Notifier: Send + Sync {
    /// Show a notice.
    fn notify(&self, notice: Notice);
}

/// Forwards notices to the presentation layer over a channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    sender: mpsc::UnboundedSender<Notice>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end for the UI.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self, notice: Notice) {
        if self.sender.send(notice).is_err() {
            debug!("Notice dropped, no receiver");
        }
    }
}
