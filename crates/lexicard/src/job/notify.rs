//! Fire-and-forget notifications sent when a text's translation resolves.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::model::{ActivityId, TextId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The text was translated and its words can be selected.
    TranslationConfirmation,
    /// The text reached the attempt cap and must be resubmitted.
    TranslationError,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub kind: NotificationKind,
    pub user_id: UserId,
    pub activity_id: ActivityId,
    pub text_id: TextId,
    pub subject: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
}

impl Notification {
    pub fn translation_confirmation(
        user_id: UserId,
        activity_id: ActivityId,
        text_id: TextId,
        word_count: usize,
    ) -> Self {
        Self {
            kind: NotificationKind::TranslationConfirmation,
            user_id,
            activity_id,
            text_id,
            subject: "Text translated".to_string(),
            body: format!(
                "Text #{} has been translated into {} words and is ready for word selection.",
                text_id, word_count
            ),
            timestamp: Utc::now(),
        }
    }

    pub fn translation_error(
        user_id: UserId,
        activity_id: ActivityId,
        text_id: TextId,
        attempts: u32,
    ) -> Self {
        Self {
            kind: NotificationKind::TranslationError,
            user_id,
            activity_id,
            text_id,
            subject: "Text translation failed".to_string(),
            body: format!(
                "Text #{} could not be translated after {} attempts. Delete it and submit it again.",
                text_id, attempts
            ),
            timestamp: Utc::now(),
        }
    }
}

/// Delivers notifications. Delivery failures are not reported back.
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        tracing::info!(
            user = notification.user_id,
            text = notification.text_id,
            kind = ?notification.kind,
            "{}: {}",
            notification.subject,
            notification.body
        );
    }
}

/// Publishes notifications to any number of subscribers.
#[derive(Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Notifier for BroadcastNotifier {
    fn notify(&self, notification: Notification) {
        // No subscriber is fine
        let _ = self.sender.send(notification);
    }
}
