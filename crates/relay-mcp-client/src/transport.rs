//! Raw HTTP mechanics against the single MCP endpoint.
//!
//! Owns the session header lifecycle: any response carrying
//! `Mcp-Session-Id` is remembered and the header goes out on every
//! subsequent request until the client flips to stateless mode or the
//! session is forgotten.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{McpClientError, Result};
use crate::sse::{SseEvent, SseEventParser};

const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";
const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

/// Outcome of a POST to the endpoint.
pub enum PostOutcome {
    /// Single JSON body
    Json(Value),
    /// SSE stream carrying notifications and the final response
    Stream(SseStream),
    /// `202 Accepted` for a notification-only POST
    Accepted,
}

/// Outcome of a DELETE to the endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Terminated,
    /// `405`: the server does not support explicit termination
    Unsupported,
}

/// An open SSE response being read incrementally.
pub struct SseStream {
    inner: futures::stream::BoxStream<'static, reqwest::Result<bytes::Bytes>>,
    parser: SseEventParser,
    pending: std::collections::VecDeque<SseEvent>,
    last_event_id: Arc<parking_lot::Mutex<Option<String>>>,
}

impl SseStream {
    fn new(response: Response, last_event_id: Arc<parking_lot::Mutex<Option<String>>>) -> Self {
        Self {
            inner: response.bytes_stream().boxed(),
            parser: SseEventParser::new(),
            pending: std::collections::VecDeque::new(),
            last_event_id,
        }
    }

    /// Next complete event, or `None` when the stream closed.
    pub async fn next_event(&mut self) -> Option<Result<SseEvent>> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                if let Some(ref id) = event.id {
                    *self.last_event_id.lock() = Some(id.clone());
                }
                return Some(Ok(event));
            }

            match self.inner.next().await {
                Some(Ok(chunk)) => {
                    self.pending.extend(self.parser.push(&chunk));
                }
                Some(Err(err)) => {
                    return Some(Err(McpClientError::Http(err)));
                }
                None => return None,
            }
        }
    }
}

/// HTTP transport for the Streamable HTTP endpoint.
pub struct HttpTransport {
    http: Client,
    endpoint: Url,
    session_id: Arc<parking_lot::Mutex<Option<String>>>,
    stateless: AtomicBool,
    last_event_id: Arc<parking_lot::Mutex<Option<String>>>,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| McpClientError::InvalidEndpoint(e.to_string()))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(McpClientError::InvalidEndpoint(format!(
                "unsupported scheme: {}",
                endpoint.scheme()
            )));
        }

        let http = Client::builder()
            .connect_timeout(config.connect_timeout)
            .user_agent(concat!("relay-mcp-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint,
            session_id: Arc::new(parking_lot::Mutex::new(None)),
            stateless: AtomicBool::new(false),
            last_event_id: Arc::new(parking_lot::Mutex::new(None)),
        })
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_id.lock().clone()
    }

    pub fn forget_session(&self) {
        *self.session_id.lock() = None;
    }

    pub fn is_stateless(&self) -> bool {
        self.stateless.load(Ordering::SeqCst)
    }

    /// Flip to stateless mode: never send the session header again.
    pub fn mark_stateless(&self) {
        self.stateless.store(true, Ordering::SeqCst);
        *self.session_id.lock() = None;
    }

    pub fn last_event_id(&self) -> Option<String> {
        self.last_event_id.lock().clone()
    }

    fn capture_session_header(&self, response: &Response) {
        if self.is_stateless() {
            return;
        }
        if let Some(value) = response.headers().get(MCP_SESSION_ID_HEADER) {
            if let Ok(session_id) = value.to_str() {
                debug!(session_id = %session_id, "Captured session id from response");
                *self.session_id.lock() = Some(session_id.to_string());
            }
        }
    }

    fn session_header(&self) -> Option<String> {
        if self.is_stateless() {
            None
        } else {
            self.session_id()
        }
    }

    /// POST a JSON-RPC message; the response is a JSON body, an SSE stream,
    /// or a 202 for notifications.
    pub async fn post(&self, body: &Value) -> Result<PostOutcome> {
        let mut request = self
            .http
            .post(self.endpoint.clone())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json, text/event-stream");

        if let Some(session_id) = self.session_header() {
            request = request.header(MCP_SESSION_ID_HEADER, session_id);
        }

        let response = request.json(body).send().await?;
        let status = response.status();
        self.capture_session_header(&response);

        if status == StatusCode::ACCEPTED {
            return Ok(PostOutcome::Accepted);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpClientError::UnexpectedStatus { status, body });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.starts_with("text/event-stream") {
            Ok(PostOutcome::Stream(SseStream::new(
                response,
                Arc::clone(&self.last_event_id),
            )))
        } else if content_type.starts_with("application/json") {
            let value = response.json::<Value>().await?;
            Ok(PostOutcome::Json(value))
        } else {
            Err(McpClientError::protocol(format!(
                "unsupported content type: {}",
                content_type
            )))
        }
    }

    /// Open the long-lived GET-SSE channel, echoing the most recently
    /// observed event id for resumption.
    pub async fn open_get_stream(&self) -> Result<SseStream> {
        let session_id = self.session_header().ok_or(McpClientError::NoSession)?;

        let mut request = self
            .http
            .get(self.endpoint.clone())
            .header("Accept", "text/event-stream")
            .header(MCP_SESSION_ID_HEADER, session_id);

        if let Some(last_event_id) = self.last_event_id() {
            debug!(last_event_id = %last_event_id, "Resuming GET-SSE stream");
            request = request.header(LAST_EVENT_ID_HEADER, last_event_id);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpClientError::UnexpectedStatus { status, body });
        }

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !content_type.starts_with("text/event-stream") {
            warn!(content_type = %content_type, "GET returned a non-SSE content type");
        }

        Ok(SseStream::new(response, Arc::clone(&self.last_event_id)))
    }

    /// DELETE the session. `405` is tolerated as "server does not support
    /// explicit termination"; on success the session id is forgotten.
    pub async fn delete(&self) -> Result<DeleteOutcome> {
        let session_id = self.session_header().ok_or(McpClientError::NoSession)?;

        let response = self
            .http
            .delete(self.endpoint.clone())
            .header(MCP_SESSION_ID_HEADER, session_id)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::METHOD_NOT_ALLOWED {
            return Ok(DeleteOutcome::Unsupported);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpClientError::UnexpectedStatus { status, body });
        }

        self.forget_session();
        Ok(DeleteOutcome::Terminated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> ClientConfig {
        ClientConfig::new(endpoint)
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        assert!(HttpTransport::new(&config("not a url")).is_err());
        assert!(HttpTransport::new(&config("ws://host/mcp")).is_err());
        assert!(HttpTransport::new(&config("http://host/mcp")).is_ok());
    }

    #[test]
    fn test_stateless_suppresses_session_header() {
        let transport = HttpTransport::new(&config("http://host/mcp")).unwrap();
        *transport.session_id.lock() = Some("sess-1".to_string());
        assert_eq!(transport.session_header().as_deref(), Some("sess-1"));

        transport.mark_stateless();
        assert!(transport.session_header().is_none());
        assert!(transport.session_id().is_none());
    }
}
