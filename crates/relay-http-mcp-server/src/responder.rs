//! Response-mode selection and the two concrete responders.
//!
//! A POST is answered either with a single `application/json` body or with a
//! `text/event-stream` carrying notifications followed by exactly one
//! terminal event with the final response. The factory decides from the
//! `Accept` header, the server's SSE settings, and the decoded body shape;
//! the stateless flag is propagated so the session-id header is emitted
//! conditionally.

use std::sync::Arc;

use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{BodyExt, StreamBody};
use hyper::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use relay_mcp_json_rpc::{JsonRpcMessage, JsonRpcNotification, SinkError};

use crate::event_id::EventIdGenerator;
use crate::sse::{ensure_jsonrpc_version, SseEvent};
use crate::{empty_body, full_body, ResponseBody};

pub(crate) const MCP_SESSION_ID_HEADER: &str = "Mcp-Session-Id";

/// How a POST is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseMode {
    #[default]
    Json,
    Sse,
}

/// Parsed `Accept` header: comma-split entries with parameters trimmed.
#[derive(Debug, Clone, Default)]
pub struct AcceptHeader {
    entries: Vec<String>,
}

impl AcceptHeader {
    pub fn parse(header: Option<&str>) -> Self {
        let entries = header
            .unwrap_or_default()
            .split(',')
            .map(|entry| {
                entry
                    .split(';')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_ascii_lowercase()
            })
            .filter(|entry| !entry.is_empty())
            .collect();
        Self { entries }
    }

    pub fn includes(&self, media_type: &str) -> bool {
        self.entries.iter().any(|entry| entry == media_type)
    }

    pub fn accepts_json(&self) -> bool {
        self.includes("application/json") || self.includes("*/*")
    }

    pub fn accepts_event_stream(&self) -> bool {
        self.includes("text/event-stream")
    }
}

/// Pick the responder for a POST body.
///
/// SSE is chosen only for requests whose `Accept` includes
/// `text/event-stream` when the server either defaults to SSE or the client
/// sent `Prefer: respond-async`; notifications and undecodable bodies always
/// take the JSON path.
pub fn select_response_mode(
    accept: &AcceptHeader,
    prefer_async: bool,
    sse_enabled: bool,
    default_mode: ResponseMode,
    is_request: bool,
) -> ResponseMode {
    if !sse_enabled || !is_request {
        return ResponseMode::Json;
    }
    if !accept.accepts_event_stream() {
        return ResponseMode::Json;
    }
    if default_mode == ResponseMode::Sse || prefer_async {
        ResponseMode::Sse
    } else {
        ResponseMode::Json
    }
}

/// Writes exactly one `application/json` body; never suspends.
#[derive(Debug, Clone)]
pub struct JsonResponder {
    session_id: Option<String>,
    stateless: bool,
}

impl JsonResponder {
    pub fn new(session_id: Option<String>, stateless: bool) -> Self {
        Self {
            session_id,
            stateless,
        }
    }

    fn apply_session_header(
        &self,
        builder: hyper::http::response::Builder,
    ) -> hyper::http::response::Builder {
        match (&self.session_id, self.stateless) {
            (Some(session_id), false) => builder.header(MCP_SESSION_ID_HEADER, session_id),
            _ => builder,
        }
    }

    /// Final response for a request: success or error, always one JSON body.
    pub fn respond(&self, message: &JsonRpcMessage) -> Response<ResponseBody> {
        let body = serde_json::to_string(message)
            .unwrap_or_else(|_| r#"{"jsonrpc":"2.0","id":null,"error":{"code":-32603,"message":"Internal error"}}"#.to_string());

        self.apply_session_header(
            Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "application/json"),
        )
        .body(full_body(body))
        .expect("static response parts are valid")
    }

    /// `202 Accepted` with an empty body for a notification-only POST.
    pub fn accepted(&self) -> Response<ResponseBody> {
        self.apply_session_header(Response::builder().status(StatusCode::ACCEPTED))
            .body(empty_body())
            .expect("static response parts are valid")
    }
}

/// Write half of an in-flight SSE response.
///
/// Cloned into the notification sink; the channel serializes concurrent
/// writes so interleaved sink calls stay well-formed on the wire.
#[derive(Clone)]
pub struct SseWriter {
    tx: mpsc::Sender<Bytes>,
    event_ids: Arc<EventIdGenerator>,
}

impl SseWriter {
    /// Write one event carrying a complete JSON-RPC message, filling a
    /// missing `jsonrpc` field on the inbound object.
    pub async fn write_json(&self, mut value: Value) -> Result<(), SinkError> {
        ensure_jsonrpc_version(&mut value);
        let event = SseEvent::new(self.event_ids.next_id(), value);
        self.tx
            .send(event.format())
            .await
            .map_err(|_| SinkError::Closed)
    }

    pub async fn write_notification(
        &self,
        notification: &JsonRpcNotification,
    ) -> Result<(), SinkError> {
        let value = serde_json::to_value(notification)
            .map_err(|e| SinkError::Write(e.to_string()))?;
        self.write_json(value).await
    }

    /// Write the terminal event with the final response.
    pub async fn write_message(&self, message: &JsonRpcMessage) -> Result<(), SinkError> {
        let value =
            serde_json::to_value(message).map_err(|e| SinkError::Write(e.to_string()))?;
        self.write_json(value).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Streamed reply over POST: zero or more notification events followed by
/// exactly one terminal event, then the stream closes.
pub struct SseResponder {
    writer: SseWriter,
    rx: mpsc::Receiver<Bytes>,
    session_id: Option<String>,
    stateless: bool,
    cancel: Option<tokio_util::sync::CancellationToken>,
}

impl SseResponder {
    const CHANNEL_CAPACITY: usize = 64;

    pub fn new(session_id: Option<String>, stateless: bool) -> Self {
        let (tx, rx) = mpsc::channel(Self::CHANNEL_CAPACITY);
        Self {
            writer: SseWriter {
                tx,
                event_ids: Arc::new(EventIdGenerator::new()),
            },
            rx,
            session_id,
            stateless,
            cancel: None,
        }
    }

    /// Cancel this token when the response body is dropped, so a client
    /// disconnect mid-stream cancels the handler's context.
    pub fn cancel_on_disconnect(mut self, cancel: tokio_util::sync::CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Clone of the write half, handed to the notification sink and the
    /// dispatch task. The response stream ends once every writer is dropped.
    pub fn writer(&self) -> SseWriter {
        self.writer.clone()
    }

    /// Consume the read half into the streaming HTTP response.
    pub fn into_response(self) -> Response<ResponseBody> {
        let SseResponder {
            writer,
            rx,
            session_id,
            stateless,
            cancel,
        } = self;
        // The endpoint keeps its own writer clone; dropping this one lets the
        // stream end when the dispatch task finishes.
        drop(writer);

        // The guard lives inside the stream closure: dropping the body
        // (client disconnect) cancels the in-flight handler.
        let guard = cancel.map(|token| token.drop_guard());
        let frames = ReceiverStream::new(rx).map(move |bytes| {
            let _hold = &guard;
            Ok::<_, std::convert::Infallible>(hyper::body::Frame::data(bytes))
        });
        let body = StreamBody::new(frames).boxed_unsync();

        let mut builder = Response::builder()
            .status(StatusCode::OK)
            .header(CONTENT_TYPE, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .header(CONNECTION, "keep-alive");

        if let Some(ref session_id) = session_id {
            if !stateless {
                builder = builder.header(MCP_SESSION_ID_HEADER, session_id);
            }
        }

        debug!(session_id = ?session_id, "Opening POST SSE response stream");
        builder
            .body(body)
            .expect("static response parts are valid")
    }
}
