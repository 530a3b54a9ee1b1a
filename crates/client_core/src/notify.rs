//! Notifications surfaced to the user when a request fails or a form action
//! completes.

use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Success,
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Validation,
    Auth,
    Server,
    Unknown,
}

impl ErrorCategory {
    pub fn of(err: &ClientError) -> Self {
        if err.is_auth() {
            return Self::Auth;
        }
        match err {
            ClientError::Network(_) => Self::Network,
            ClientError::Validation { .. } => Self::Validation,
            ClientError::Server { .. } => Self::Server,
            ClientError::Decode(_) | ClientError::InvalidUrl(_) => Self::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub category: Option<ErrorCategory>,
    pub context: String,
    pub message: String,
}

impl Notification {
    pub fn from_error(context: impl Into<String>, err: &ClientError) -> Self {
        Self {
            level: NotificationLevel::Error,
            category: Some(ErrorCategory::of(err)),
            context: context.into(),
            message: err.to_string(),
        }
    }

    pub fn success(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            category: None,
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn info(context: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            category: None,
            context: context.into(),
            message: message.into(),
        }
    }

    pub fn requires_reauth(&self) -> bool {
        self.category == Some(ErrorCategory::Auth)
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Fans notifications out to every subscribed view.
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(64)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: Notification) {
        // No subscribers just means no view is listening right now.
        let _ = self.tx.send(notification);
    }
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        let Notification {
            level,
            category,
            context,
            message,
        } = notification;
        match level {
            NotificationLevel::Error => error!(context = %context, ?category, "{message}"),
            NotificationLevel::Warning => warn!(context = %context, "{message}"),
            NotificationLevel::Success | NotificationLevel::Info => {
                info!(context = %context, "{message}")
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/notify_tests.rs"]
mod tests;
