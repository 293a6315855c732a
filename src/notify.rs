//! Toast notifications for the UI layer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

/// Default broadcast channel capacity.
const DEFAULT_TOAST_CAPACITY: usize = 64;

/// Severity of a toast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToastLevel {
    Info,
    Warning,
    Error,
}

/// A user-visible notification.
#[derive(Debug, Clone, Serialize)]
pub struct Toast {
    pub id: Uuid,
    pub level: ToastLevel,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Fan-out of toasts to whatever renders them.
#[derive(Clone)]
pub struct Notifier {
    tx: broadcast::Sender<Toast>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_TOAST_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Toast> {
        self.tx.subscribe()
    }

    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) {
        self.push(ToastLevel::Error, title.into(), message.into());
    }

    pub fn warning(&self, title: impl Into<String>, message: impl Into<String>) {
        self.push(ToastLevel::Warning, title.into(), message.into());
    }

    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) {
        self.push(ToastLevel::Info, title.into(), message.into());
    }

    fn push(&self, level: ToastLevel, title: String, message: String) {
        debug!(?level, title = %title, "Toast raised");
        let toast = Toast {
            id: Uuid::new_v4(),
            level,
            title,
            message,
            created_at: Utc::now(),
        };
        // No renderer attached is fine
        let _ = self.tx.send(toast);
    }
}
