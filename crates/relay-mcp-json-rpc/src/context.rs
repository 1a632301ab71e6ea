//! Per-call context threaded through the dispatcher to handlers.
//!
//! Instead of ambient state, every call owns a small context struct carrying
//! the session handle, the notification sink, the cancellation signal, and an
//! optional server handle. Context values are read-only from the handler's
//! perspective; sink variants (streaming vs no-op) are interchangeable behind
//! the trait object.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::notification::JsonRpcNotification;

/// Errors surfaced by a notification sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("notification stream closed")]
    Closed,

    #[error("notification write failed: {0}")]
    Write(String),
}

/// A per-call handle through which in-progress handlers emit notifications.
///
/// Implementations either write into an in-flight response stream, into a
/// session's long-lived server-to-client channel, or silently no-op when the
/// reply is a plain JSON body.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a fully-constructed notification.
    async fn send(&self, notification: JsonRpcNotification) -> Result<(), SinkError>;

    /// Whether sends are discarded. A handler running under a no-op sink
    /// must still succeed overall.
    fn is_noop(&self) -> bool {
        false
    }
}

/// Sink that discards every notification, used for plain JSON responses.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn send(&self, _notification: JsonRpcNotification) -> Result<(), SinkError> {
        Ok(())
    }

    fn is_noop(&self) -> bool {
        true
    }
}

/// Errors from session state access through [`SessionState`].
#[derive(Debug, Error)]
pub enum SessionStateError {
    #[error("session not found")]
    NotFound,

    #[error("session storage error: {0}")]
    Storage(String),
}

/// Read/write access to the per-session key/value bag, resolved by id so
/// handlers hold no strong reference to store internals.
#[async_trait]
pub trait SessionState: Send + Sync {
    /// The opaque session identifier.
    fn session_id(&self) -> &str;

    /// Get a state value by key; absence returns `None`.
    async fn get_value(&self, key: &str) -> Option<Value>;

    /// Set a state value by key.
    async fn set_value(&self, key: &str, value: Value) -> Result<(), SessionStateError>;
}

/// Context carried by every dispatched call.
#[derive(Clone)]
pub struct RequestContext {
    /// Session bound to this call, if any.
    pub session: Option<Arc<dyn SessionState>>,
    /// Sink for progress/log/custom notifications emitted mid-request.
    pub sink: Arc<dyn NotificationSink>,
    /// Cancelled when the underlying transport goes away or the call is
    /// superseded. Handlers are expected to honor this promptly.
    pub cancel: CancellationToken,
    /// Optional request deadline supplied by the caller.
    pub deadline: Option<Instant>,
    /// Server handle for handlers that must broadcast, type-erased so this
    /// crate stays transport-free.
    pub server: Option<Arc<dyn Any + Send + Sync>>,
}

impl RequestContext {
    /// Context with no session, a no-op sink, and a fresh cancellation token.
    pub fn detached() -> Self {
        Self {
            session: None,
            sink: Arc::new(NoopSink),
            cancel: CancellationToken::new(),
            deadline: None,
            server: None,
        }
    }

    pub fn with_session(mut self, session: Arc<dyn SessionState>) -> Self {
        self.session = Some(session);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_server(mut self, server: Arc<dyn Any + Send + Sync>) -> Self {
        self.server = Some(server);
        self
    }

    /// Id of the bound session, if any.
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_deref().map(|s| s.session_id())
    }

    /// Downcast the server handle to a concrete type.
    pub fn server_as<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.server.clone().and_then(|s| s.downcast::<T>().ok())
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext")
            .field("session_id", &self.session_id())
            .field("noop_sink", &self.sink.is_noop())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}
