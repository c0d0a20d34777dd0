//! Notifications
//!
//! Services never notify from inside a write transaction. They return the
//! [`PushMessage`]s a committed transition produced, and the handler hands
//! them to the [`Notifier`] afterwards. Delivery is best-effort: failures and
//! timeouts are logged and never surface to the caller.
//!
//! # Sinks
//!
//! | Sink | Use |
//! |------|-----|
//! | [`PushNotifier`] | Inbox row + Expo push |
//! | [`RecordingSink`] | Tests, embedding |

mod push;
pub mod templates;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

pub use push::PushNotifier;

/// Outbound notification for one user
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PushMessage {
    pub user_id: i64,
    pub title: String,
    pub body: String,
    pub data: Value,
}

impl PushMessage {
    pub fn new(
        user_id: i64,
        title: impl Into<String>,
        body: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            body: body.into(),
            data,
        }
    }
}

/// Channel that delivers notifications to a user
///
/// Returns whether the message was delivered. Implementations must not
/// panic on delivery failure.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, user_id: i64, title: &str, body: &str, data: Value) -> bool;
}

/// Best-effort dispatcher in front of a sink
#[derive(Clone)]
pub struct Notifier {
    sink: Arc<dyn NotificationSink>,
    timeout: Duration,
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl Notifier {
    pub fn new(sink: Arc<dyn NotificationSink>, timeout: Duration) -> Self {
        Self { sink, timeout }
    }

    /// Deliver messages one by one, swallowing failures
    pub async fn deliver(&self, messages: Vec<PushMessage>) {
        for msg in messages {
            let sent = tokio::time::timeout(
                self.timeout,
                self.sink
                    .notify(msg.user_id, &msg.title, &msg.body, msg.data.clone()),
            )
            .await;

            match sent {
                Ok(true) => {
                    tracing::debug!(user_id = msg.user_id, title = %msg.title, "Notification sent");
                }
                Ok(false) => {
                    tracing::debug!(user_id = msg.user_id, title = %msg.title, "Notification not delivered");
                }
                Err(_) => {
                    tracing::warn!(
                        user_id = msg.user_id,
                        title = %msg.title,
                        timeout_ms = self.timeout.as_millis() as u64,
                        "Notification timed out"
                    );
                }
            }
        }
    }
}

/// Keeps every notification in memory
#[derive(Debug, Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<PushMessage>>,
    fail: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records but reports every delivery as failed
    pub fn failing() -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn messages(&self) -> Vec<PushMessage> {
        self.messages.lock().clone()
    }

    pub fn for_user(&self, user_id: i64) -> Vec<PushMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn count_titled(&self, title: &str) -> usize {
        self.messages.lock().iter().filter(|m| m.title == title).count()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn notify(&self, user_id: i64, title: &str, body: &str, data: Value) -> bool {
        self.messages
            .lock()
            .push(PushMessage::new(user_id, title, body, data));
        !self.fail
    }
}
