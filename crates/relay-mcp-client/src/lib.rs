//! # MCP Client for Streamable HTTP
//!
//! Mirrors the server's transport rules on one endpoint URL:
//! - POST returns either a single JSON response or an SSE stream; on the
//!   stream, notifications feed registered handlers and the first response
//!   matching the in-flight request id completes the call.
//! - An optional long-lived GET opens the server-to-client notification
//!   channel, resumable with `Last-Event-ID`.
//! - Session header lifecycle is automatic, including stateless
//!   auto-detection: a server whose `initialize` response omits
//!   `Mcp-Session-Id` is treated as stateless, the header is never sent, and
//!   GET-SSE stays closed.

pub mod client;
pub mod config;
pub mod error;
pub mod sse;
pub mod transport;

pub use client::{McpClient, NotificationHandler};
pub use config::ClientConfig;
pub use error::{McpClientError, Result};
pub use sse::{SseEvent, SseEventParser};
pub use transport::{DeleteOutcome, HttpTransport, PostOutcome};
