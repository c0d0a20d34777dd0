//! Inbox + Expo push sink

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use shared::models::Notification;
use shared::util::{now_millis, snowflake_id};

use super::NotificationSink;
use crate::storage::Storage;

const EXPO_TOKEN_PREFIX: &str = "ExponentPushToken[";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExpoMessage<'a> {
    to: &'a str,
    title: &'a str,
    body: &'a str,
    data: &'a Value,
    sound: &'static str,
    priority: &'static str,
    channel_id: &'static str,
}

/// Stores an inbox row, then pushes through Expo when the user registered a
/// device token
#[derive(Debug, Clone)]
pub struct PushNotifier {
    storage: Storage,
    http: reqwest::Client,
    push_url: String,
    enabled: bool,
}

impl PushNotifier {
    pub fn new(storage: Storage, push_url: impl Into<String>, enabled: bool) -> Self {
        Self {
            storage,
            http: reqwest::Client::new(),
            push_url: push_url.into(),
            enabled,
        }
    }

    pub fn is_valid_token(token: &str) -> bool {
        token.starts_with(EXPO_TOKEN_PREFIX)
    }

    async fn push(&self, token: &str, title: &str, body: &str, data: &Value) -> bool {
        let message = ExpoMessage {
            to: token,
            title,
            body,
            data,
            sound: "default",
            priority: "high",
            channel_id: "default",
        };

        let response = match self.http.post(&self.push_url).json(&message).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "Failed to send push notification");
                return false;
            }
        };
        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Expo push rejected");
            return false;
        }

        let payload: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Unreadable Expo push response");
                return false;
            }
        };
        // Single messages answer `data: {..}`, batches `data: [{..}]`
        let ticket = payload
            .pointer("/data/0")
            .or_else(|| payload.get("data"))
            .cloned()
            .unwrap_or(Value::Null);

        match ticket.get("status").and_then(Value::as_str) {
            Some("ok") => true,
            Some("error") => {
                tracing::warn!(
                    error = ticket.get("message").and_then(|v| v.as_str()).unwrap_or("Unknown error"),
                    "Expo push notification error"
                );
                false
            }
            _ => false,
        }
    }
}

#[async_trait]
impl NotificationSink for PushNotifier {
    async fn notify(&self, user_id: i64, title: &str, body: &str, data: Value) -> bool {
        let row = Notification {
            id: snowflake_id(),
            user_id,
            title: title.to_string(),
            body: body.to_string(),
            data: data.clone(),
            read_at: None,
            created_at: now_millis(),
        };
        if let Err(e) = self.storage.insert_notification(&row) {
            tracing::error!(user_id, error = %e, "Failed to store notification");
        }

        if !self.enabled {
            return false;
        }

        let token = match self.storage.get_user(user_id) {
            Ok(Some(user)) => user.push_token,
            Ok(None) => None,
            Err(e) => {
                tracing::error!(user_id, error = %e, "Failed to load user for push");
                None
            }
        };
        let Some(token) = token else {
            return false;
        };
        if !Self::is_valid_token(&token) {
            tracing::warn!(user_id, "Invalid Expo push token format");
            return false;
        }

        self.push(&token, title, body, &data).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_prefix() {
        assert!(PushNotifier::is_valid_token("ExponentPushToken[abc]"));
        assert!(!PushNotifier::is_valid_token("fcm:abc"));
    }

    #[test]
    fn expo_message_shape() {
        let data = json!({ "order_id": 1 });
        let msg = ExpoMessage {
            to: "ExponentPushToken[x]",
            title: "t",
            body: "b",
            data: &data,
            sound: "default",
            priority: "high",
            channel_id: "default",
        };
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["channelId"], "default");
        assert_eq!(v["priority"], "high");
        assert_eq!(v["data"]["order_id"], 1);
    }

    #[tokio::test]
    async fn inbox_row_is_stored_without_push() {
        let storage = Storage::open_in_memory().unwrap();
        let sink = PushNotifier::new(storage.clone(), "http://127.0.0.1:1/push", false);
        assert!(!sink.notify(7, "Titre", "Corps", json!({})).await);
        let inbox = storage.list_notifications(7, 10).unwrap();
        assert_eq!(inbox.len(), 1);
        assert_eq!(inbox[0].title, "Titre");
    }
}
