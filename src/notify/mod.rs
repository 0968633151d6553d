use serde::Serialize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Info,
    Warning,
}

/// A transient user-facing message. Expiry is a deadline checked whenever the
/// queue is read; there is no background sweeper.
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub id: u64,
    pub kind: NotificationKind,
    pub message: String,
    #[serde(skip)]
    expires_at: Instant,
}

#[derive(Debug)]
struct NotifierInner {
    next_id: u64,
    queue: Vec<Notification>,
}

/// Process-wide notification queue. Messages keep insertion order, are never
/// deduplicated, and each expires independently after its duration.
#[derive(Debug)]
pub struct Notifier {
    inner: Mutex<NotifierInner>,
}

impl Notifier {
    pub fn new() -> Self {
        Self { inner: Mutex::new(NotifierInner { next_id: 0, queue: Vec::new() }) }
    }

    /// Push with the configured default duration.
    pub fn push(&self, kind: NotificationKind, message: impl Into<String>) -> u64 {
        let duration = Duration::from_millis(config::config().notifications.default_duration_ms);
        self.push_with_duration(kind, message, duration)
    }

    pub fn push_with_duration(
        &self,
        kind: NotificationKind,
        message: impl Into<String>,
        duration: Duration,
    ) -> u64 {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let id = inner.next_id;
        inner.next_id += 1;

        let message = message.into();
        tracing::debug!(kind = ?kind, id, "notification: {}", message);

        inner.queue.push(Notification { id, kind, message, expires_at: Instant::now() + duration });
        id
    }

    pub fn remove(&self, id: u64) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.queue.retain(|n| n.id != id);
    }

    /// All messages that have not yet expired, in insertion order. Expired
    /// entries are dropped as a side effect.
    pub fn active(&self) -> Vec<Notification> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        inner.queue.retain(|n| n.expires_at > now);
        inner.queue.clone()
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_keep_insertion_order_and_unique_ids() {
        let notifier = Notifier::new();
        let a = notifier.push(NotificationKind::Info, "first");
        let b = notifier.push(NotificationKind::Error, "second");
        assert_ne!(a, b);

        let active = notifier.active();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].message, "first");
        assert_eq!(active[1].message, "second");
    }

    #[test]
    fn expired_messages_are_dropped_on_read() {
        let notifier = Notifier::new();
        notifier.push_with_duration(NotificationKind::Info, "gone", Duration::ZERO);
        notifier.push_with_duration(NotificationKind::Info, "kept", Duration::from_secs(60));

        let active = notifier.active();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].message, "kept");
    }

    #[test]
    fn remove_deletes_by_id_immediately() {
        let notifier = Notifier::new();
        let id = notifier.push(NotificationKind::Success, "saved");
        notifier.remove(id);
        assert!(notifier.active().is_empty());
    }

    #[test]
    fn duplicate_messages_are_all_retained() {
        let notifier = Notifier::new();
        notifier.push(NotificationKind::Error, "same");
        notifier.push(NotificationKind::Error, "same");
        assert_eq!(notifier.active().len(), 2);
    }
}
