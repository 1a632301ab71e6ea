//! Typed convenience methods over the notification sink.
//!
//! Handlers hold an `Arc<dyn NotificationSink>` from the call context; this
//! extension trait layers the protocol-shaped emit operations on top of the
//! raw `send`.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use relay_mcp_json_rpc::{JsonRpcNotification, NotificationSink, SinkError};

use crate::logging::LoggingLevel;
use crate::notifications::{logging_message_notification, progress_notification};

/// Protocol-level emit operations available on every sink.
#[async_trait]
pub trait NotificationSinkExt: NotificationSink {
    /// Emit `notifications/progress`. `progress` is clamped to [0, 1].
    async fn send_progress(&self, progress: f64, message: &str) -> Result<(), SinkError> {
        let progress = progress.clamp(0.0, 1.0);
        self.send(progress_notification(progress, message)).await
    }

    /// Emit `notifications/message` at the given severity.
    async fn send_log(&self, level: LoggingLevel, message: &str) -> Result<(), SinkError> {
        self.send(logging_message_notification(level, message)).await
    }

    /// Emit a custom notification with object params.
    async fn send_custom(
        &self,
        method: &str,
        params: HashMap<String, Value>,
    ) -> Result<(), SinkError> {
        self.send(JsonRpcNotification::new_with_params(method, params))
            .await
    }
}

impl<T: NotificationSink + ?Sized> NotificationSinkExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Arc<Mutex<Vec<JsonRpcNotification>>>,
    }

    #[async_trait]
    impl NotificationSink for RecordingSink {
        async fn send(&self, notification: JsonRpcNotification) -> Result<(), SinkError> {
            self.sent.lock().await.push(notification);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_progress_is_clamped() {
        let sink = RecordingSink::default();
        sink.send_progress(1.5, "overshoot").await.unwrap();

        let sent = sink.sent.lock().await;
        assert_eq!(sent[0].get_param("progress"), Some(&serde_json::json!(1.0)));
    }

    #[tokio::test]
    async fn test_custom_notification_passthrough() {
        let sink = RecordingSink::default();
        let mut params = HashMap::new();
        params.insert("answer".to_string(), serde_json::json!(42));
        sink.send_custom("notifications/custom", params).await.unwrap();

        let sent = sink.sent.lock().await;
        assert_eq!(sent[0].method, "notifications/custom");
        assert_eq!(sent[0].get_param("answer"), Some(&serde_json::json!(42)));
    }
}
