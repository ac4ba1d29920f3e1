//! Non-blocking user-facing notifications.
//!
//! Background outcomes (a failed remote cart mutation, a cleared coupon) are
//! surfaced to the user without blocking the operation that caused them.
//! [`Notifier`] is a cheap cloneable sender; the UI layer drains the paired
//! receiver and renders each [`Notification`] as a toast.

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    /// Neutral information.
    Info,
    /// An operation completed.
    Success,
    /// Something degraded but recoverable happened.
    Warning,
    /// An operation failed.
    Error,
}

/// A single user-facing notification.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Severity, used by the UI to pick the toast style.
    pub level: NotificationLevel,
    /// Human-readable message.
    pub message: String,
    /// When the notification was raised.
    pub raised_at: DateTime<Utc>,
}

/// Sending half of the notification channel.
///
/// Sends never block and never fail the caller; if the receiver is gone the
/// notification is dropped.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Create a notifier and the receiver the UI drains.
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Push a notification at the given level.
    pub fn push(&self, level: NotificationLevel, message: impl Into<String>) {
        let notification = Notification {
            level,
            message: message.into(),
            raised_at: Utc::now(),
        };
        // A dropped receiver just means nobody is rendering toasts anymore.
        let _ = self.tx.send(notification);
    }

    /// Push an informational notification.
    pub fn info(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Info, message);
    }

    /// Push a success notification.
    pub fn success(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Success, message);
    }

    /// Push a warning notification.
    pub fn warning(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Warning, message);
    }

    /// Push an error notification.
    pub fn error(&self, message: impl Into<String>) {
        self.push(NotificationLevel::Error, message);
    }
}
