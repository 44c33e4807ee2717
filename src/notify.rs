use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Error,
    Info,
    Success,
}

/// A transient, user-facing outcome report (a toast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: Level,
    pub title: String,
    pub description: String,
}

impl Notification {
    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            level: Level::Success,
            title: title.into(),
            description: description.into(),
        }
    }

    pub fn info(description: impl Into<String>) -> Self {
        Self {
            level: Level::Info,
            title: "Info".to_string(),
            description: description.into(),
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Self {
            level: Level::Error,
            title: "Error".to_string(),
            description: description.into(),
        }
    }
}

/// Where outcome notifications go. Implementations must not block.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Emits notifications as log events.
#[derive(Debug, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, n: Notification) {
        match n.level {
            Level::Error => tracing::warn!(title = %n.title, "{}", n.description),
            Level::Info | Level::Success => tracing::info!(title = %n.title, "{}", n.description),
        }
    }
}

/// Forwards notifications to a channel for a presentation layer to drain.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notification>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, notification: Notification) {
        // Receiver gone means nobody is watching anymore
        let _ = self.tx.send(notification);
    }
}
