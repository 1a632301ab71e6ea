//! Notification sink variants bound into the per-call context.
//!
//! The SSE-backed sink writes into the in-flight POST response stream while
//! the handler runs; the GET-SSE-backed sink writes into the session's
//! long-lived channel; the no-op sink (from the JSON-RPC crate) discards for
//! plain JSON responses.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use relay_mcp_json_rpc::{JsonRpcNotification, NotificationSink, SinkError};

use crate::responder::SseWriter;
use crate::stream_manager::{StreamError, StreamManager};

/// Sink writing events into the in-flight POST SSE response.
pub struct SseSink {
    writer: SseWriter,
}

impl SseSink {
    pub fn new(writer: SseWriter) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl NotificationSink for SseSink {
    async fn send(&self, notification: JsonRpcNotification) -> Result<(), SinkError> {
        self.writer.write_notification(&notification).await
    }
}

/// Sink writing events into the session's long-lived GET-SSE channel.
pub struct GetSseSink {
    stream_manager: Arc<StreamManager>,
    session_id: String,
}

impl GetSseSink {
    pub fn new(stream_manager: Arc<StreamManager>, session_id: impl Into<String>) -> Self {
        Self {
            stream_manager,
            session_id: session_id.into(),
        }
    }
}

#[async_trait]
impl NotificationSink for GetSseSink {
    async fn send(&self, notification: JsonRpcNotification) -> Result<(), SinkError> {
        match self
            .stream_manager
            .send_to_session(&self.session_id, &notification)
            .await
        {
            Ok(()) => Ok(()),
            Err(StreamError::NoConnection(session_id)) => {
                // Delivery is best-effort; a session without an open GET
                // channel simply misses out-of-band notifications.
                debug!(session_id = %session_id, method = %notification.method,
                       "No GET-SSE connection, dropping notification");
                Ok(())
            }
            Err(StreamError::ConnectionClosed(_)) => Err(SinkError::Closed),
            Err(err) => Err(SinkError::Write(err.to_string())),
        }
    }
}
