//! Long-lived GET-SSE channel management.
//!
//! At most one connection exists per session; opening a new GET against a
//! session with a live connection cancels the prior one before the new one
//! begins writing events. The connection map owns the connections; DELETE
//! and session termination cancel synchronously.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use hyper::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use relay_mcp_json_rpc::JsonRpcNotification;
use relay_mcp_protocol::stream_resumed_notification;

use crate::event_id::EventIdGenerator;
use crate::responder::MCP_SESSION_ID_HEADER;
use crate::sse::{ensure_jsonrpc_version, keepalive_frame, SseEvent};
use crate::ResponseBody;

/// Error type for GET-SSE channel operations
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("No connection for session: {0}")]
    NoConnection(String),

    #[error("Connection closed for session: {0}")]
    ConnectionClosed(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One live server-to-client channel.
struct GetSseConnection {
    /// Distinguishes this connection from a successor after supersession
    connection_id: String,
    sender: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
    event_ids: Arc<EventIdGenerator>,
}

type ConnectionMap = Arc<Mutex<HashMap<String, GetSseConnection>>>;

/// Session-id keyed registry of GET-SSE connections.
pub struct StreamManager {
    connections: ConnectionMap,
    keepalive_interval: Duration,
    channel_capacity: usize,
}

impl StreamManager {
    pub fn new(keepalive_interval: Duration) -> Self {
        Self {
            connections: Arc::new(Mutex::new(HashMap::new())),
            keepalive_interval,
            channel_capacity: 64,
        }
    }

    /// Open (or replace) the GET-SSE connection for a session and build the
    /// streaming HTTP response.
    ///
    /// If `last_event_id` is present, a `stream/resumed` notification
    /// carrying `{resumedFrom: <id>}` goes out as the first event.
    pub async fn open(
        &self,
        session_id: String,
        last_event_id: Option<String>,
    ) -> Response<ResponseBody> {
        let (tx, mut rx) = mpsc::channel::<Bytes>(self.channel_capacity);
        let cancel = CancellationToken::new();
        let event_ids = Arc::new(EventIdGenerator::new());
        let connection_id = Uuid::now_v7().to_string();

        let connection = GetSseConnection {
            connection_id: connection_id.clone(),
            sender: tx,
            cancel: cancel.clone(),
            event_ids: Arc::clone(&event_ids),
        };

        // Insertion returns the displaced predecessor, which must be
        // cancelled before the new connection starts writing.
        let previous = {
            let mut connections = self.connections.lock().await;
            connections.insert(session_id.clone(), connection)
        };
        if let Some(previous) = previous {
            debug!(session_id = %session_id, "Superseding prior GET-SSE connection");
            previous.cancel.cancel();
        }

        // Remove the map entry once this connection is cancelled, unless a
        // successor already replaced it.
        {
            let connections = Arc::clone(&self.connections);
            let session_id = session_id.clone();
            let connection_id = connection_id.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                cancel.cancelled().await;
                remove_connection(&connections, &session_id, &connection_id).await;
            });
        }

        let keepalive_interval = self.keepalive_interval;
        let resume_event = last_event_id.map(|id| {
            let notification = stream_resumed_notification(id);
            let mut value = serde_json::to_value(&notification).unwrap_or_default();
            ensure_jsonrpc_version(&mut value);
            SseEvent::new(event_ids.next_id(), value).format()
        });

        let stream_cancel = cancel.clone();
        let body_stream = async_stream::stream! {
            // Cancel on client disconnect: dropping the stream drops this guard.
            let _guard = stream_cancel.clone().drop_guard();

            if let Some(frame) = resume_event {
                yield Ok::<_, std::convert::Infallible>(hyper::body::Frame::data(frame));
            }

            let mut keepalive = tokio::time::interval(keepalive_interval);
            keepalive.tick().await; // first tick fires immediately; skip it

            loop {
                tokio::select! {
                    frame = rx.recv() => {
                        match frame {
                            Some(bytes) => yield Ok(hyper::body::Frame::data(bytes)),
                            None => break,
                        }
                    }
                    _ = keepalive.tick() => {
                        yield Ok(hyper::body::Frame::data(keepalive_frame()));
                    }
                    _ = stream_cancel.cancelled() => {
                        debug!("GET-SSE stream cancelled");
                        break;
                    }
                }
            }
        };

        let body = http_body_util::BodyExt::boxed_unsync(http_body_util::StreamBody::new(
            Box::pin(body_stream),
        ));

        Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .header(CONNECTION, "keep-alive")
            .header(MCP_SESSION_ID_HEADER, &session_id)
            .body(body)
            .expect("static response parts are valid")
    }

    /// Send a notification into a session's live GET-SSE channel.
    ///
    /// Delivery is best-effort: a full buffer drops the event for that
    /// subscriber and the failure is logged, never retried.
    pub async fn send_to_session(
        &self,
        session_id: &str,
        notification: &JsonRpcNotification,
    ) -> Result<(), StreamError> {
        let (sender, event_id) = {
            let connections = self.connections.lock().await;
            let connection = connections
                .get(session_id)
                .ok_or_else(|| StreamError::NoConnection(session_id.to_string()))?;
            (connection.sender.clone(), connection.event_ids.next_id())
        };

        let mut value = serde_json::to_value(notification)?;
        ensure_jsonrpc_version(&mut value);
        let frame = SseEvent::new(event_id, value).format();

        match sender.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(session_id = %session_id, method = %notification.method,
                      "GET-SSE buffer full, dropping notification");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(StreamError::ConnectionClosed(session_id.to_string()))
            }
        }
    }

    /// Whether a session currently has a live connection.
    pub async fn has_connection(&self, session_id: &str) -> bool {
        let connections = self.connections.lock().await;
        connections
            .get(session_id)
            .map(|c| !c.sender.is_closed())
            .unwrap_or(false)
    }

    /// Cancel and remove a session's connection. Used by DELETE and session
    /// expiry; cancellation happens before this returns.
    pub async fn close(&self, session_id: &str) -> bool {
        let removed = {
            let mut connections = self.connections.lock().await;
            connections.remove(session_id)
        };
        match removed {
            Some(connection) => {
                connection.cancel.cancel();
                debug!(session_id = %session_id, "Closed GET-SSE connection");
                true
            }
            None => false,
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }
}

async fn remove_connection(connections: &ConnectionMap, session_id: &str, connection_id: &str) {
    let mut connections = connections.lock().await;
    let matches = connections
        .get(session_id)
        .map(|c| c.connection_id == connection_id)
        .unwrap_or(false);
    if matches {
        connections.remove(session_id);
        debug!(session_id = %session_id, "Removed GET-SSE connection");
    }
}
