//! # Streamable HTTP MCP Server Transport
//!
//! One URL path hosts all three verbs:
//! - **POST** carries JSON-RPC requests and notifications; the response is a
//!   single JSON body or an SSE stream of progress notifications followed by
//!   the final response.
//! - **GET** opens the long-lived server-to-client SSE channel for
//!   out-of-band notifications, resumable via `Last-Event-ID`.
//! - **DELETE** terminates the session.
//!
//! The server is session-oriented with an optional stateless mode: a
//! stateless server skips session creation and never emits the
//! `Mcp-Session-Id` header, which clients detect on `initialize`.

pub mod endpoint;
pub mod event_id;
pub mod responder;
pub mod server;
pub mod sink;
pub mod sse;
pub mod stream_manager;

#[cfg(test)]
mod tests;

// Re-export main types
pub use endpoint::McpEndpoint;
pub use event_id::EventIdGenerator;
pub use responder::{select_response_mode, AcceptHeader, JsonResponder, ResponseMode, SseResponder};
pub use server::{HttpMcpServer, HttpMcpServerBuilder, ServerConfig};
pub use sink::{GetSseSink, SseSink};
pub use stream_manager::{StreamError, StreamManager};

// Re-export foundational types
pub use relay_mcp_json_rpc::{JsonRpcDispatcher, JsonRpcHandler, NoopSink, RequestContext};
pub use relay_mcp_protocol::McpError;

/// Result type for HTTP MCP operations
pub type Result<T> = std::result::Result<T, HttpMcpError>;

/// HTTP MCP specific errors
#[derive(Debug, thiserror::Error)]
pub enum HttpMcpError {
    #[error("HTTP error: {0}")]
    Http(#[from] hyper::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(#[from] stream_manager::StreamError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};
use std::convert::Infallible;

/// Unified response body: plain JSON bodies and SSE streams behind one type.
pub type ResponseBody = UnsyncBoxBody<Bytes, Infallible>;

/// Box a complete in-memory body.
pub(crate) fn full_body(bytes: impl Into<Bytes>) -> ResponseBody {
    Full::new(bytes.into()).boxed_unsync()
}

/// Box an empty body.
pub(crate) fn empty_body() -> ResponseBody {
    Full::new(Bytes::new()).boxed_unsync()
}
