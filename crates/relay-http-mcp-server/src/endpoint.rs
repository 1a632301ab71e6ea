//! The single-URL HTTP dispatcher.
//!
//! POST carries client messages, GET opens the long-lived notification
//! channel, DELETE terminates the session. Header validation, session
//! resolution, responder selection, and context assembly all happen here
//! before the protocol dispatcher is invoked.

use std::any::Any;
use std::sync::Arc;

use http_body_util::BodyExt;
use hyper::body::Body;
use hyper::header::{ALLOW, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use tracing::{debug, error, warn};

use relay_mcp_json_rpc::{
    parse_client_message, ClientMessage, JsonRpcError, NoopSink, NotificationSink, RequestContext,
};
use relay_mcp_protocol::{methods, McpError};
use relay_mcp_session::{InMemorySessionStore, SessionHandle};

use crate::responder::{
    select_response_mode, AcceptHeader, JsonResponder, ResponseMode, SseResponder,
    MCP_SESSION_ID_HEADER,
};
use crate::server::ServerConfig;
use crate::sink::SseSink;
use crate::stream_manager::StreamManager;
use crate::{full_body, HttpMcpError, JsonRpcDispatcher, ResponseBody};

const LAST_EVENT_ID_HEADER: &str = "Last-Event-ID";

/// Session resolved for a POST body.
struct ResolvedSession {
    session_id: String,
    /// Stateless-mode sessions live for exactly one call
    ephemeral: bool,
}

/// Handles all three verbs on the MCP endpoint path.
#[derive(Clone)]
pub struct McpEndpoint {
    config: Arc<ServerConfig>,
    dispatcher: Arc<JsonRpcDispatcher<McpError>>,
    sessions: Arc<InMemorySessionStore>,
    stream_manager: Arc<StreamManager>,
    server_handle: Option<Arc<dyn Any + Send + Sync>>,
}

impl McpEndpoint {
    pub fn new(
        config: Arc<ServerConfig>,
        dispatcher: Arc<JsonRpcDispatcher<McpError>>,
        sessions: Arc<InMemorySessionStore>,
        stream_manager: Arc<StreamManager>,
    ) -> Self {
        Self {
            config,
            dispatcher,
            sessions,
            stream_manager,
            server_handle: None,
        }
    }

    /// Attach the handle that handlers reach through the call context for
    /// server-wide broadcasts.
    pub fn with_server_handle(mut self, handle: Arc<dyn Any + Send + Sync>) -> Self {
        self.server_handle = Some(handle);
        self
    }

    pub fn sessions(&self) -> &Arc<InMemorySessionStore> {
        &self.sessions
    }

    pub fn stream_manager(&self) -> &Arc<StreamManager> {
        &self.stream_manager
    }

    /// Route a request on the MCP endpoint path.
    pub async fn handle<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: std::fmt::Display,
    {
        match req.method() {
            &Method::POST => self.handle_post(req).await,
            &Method::GET => self.handle_get(req).await,
            &Method::DELETE => self.handle_delete(req).await,
            _ => method_not_allowed(),
        }
    }

    // ------------------------------------------------------------------
    // POST
    // ------------------------------------------------------------------

    async fn handle_post<B>(&self, req: Request<B>) -> Response<ResponseBody>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: std::fmt::Display,
    {
        if let Err(err) = validate_post_headers(&req) {
            warn!("Rejected POST: {}", err);
            return status_response(StatusCode::BAD_REQUEST, &err.to_string());
        }

        let accept = AcceptHeader::parse(header_str(&req, "accept"));
        let prefer_async = header_str(&req, "prefer")
            .map(|v| v.to_ascii_lowercase().contains("respond-async"))
            .unwrap_or(false);
        let session_header = header_str(&req, MCP_SESSION_ID_HEADER).map(|s| s.to_string());

        let body = match self.read_body(req).await {
            Ok(body) => body,
            Err(response) => return *response,
        };

        let message = match parse_client_message(&body) {
            Ok(message) => message,
            Err(rpc_error) => {
                // An identifiable id means the error response recovers the
                // call; un-identifiable input is a framing-level 400.
                let status = if rpc_error.id.is_some() {
                    StatusCode::OK
                } else {
                    StatusCode::BAD_REQUEST
                };
                warn!(code = rpc_error.error.code, "Rejected unparseable POST body");
                return rpc_error_response(status, &rpc_error);
            }
        };

        let resolved = match self.resolve_session(&message, session_header.as_deref()).await {
            Ok(resolved) => resolved,
            Err(response) => return *response,
        };

        match message {
            ClientMessage::Notification(notification) => {
                let responder = self.json_responder(&resolved);
                let ctx = match &resolved {
                    Some(resolved) => self.build_context(resolved, Arc::new(NoopSink)),
                    // notifications/initialized is tolerated without a session
                    None => RequestContext::detached(),
                };
                debug!(method = %notification.method, "Dispatching notification");
                if let Err(err) = self.dispatcher.handle_notification(notification, &ctx).await {
                    error!("Notification handling error: {}", err);
                }
                self.finish_ephemeral(&resolved).await;
                responder.accepted()
            }
            ClientMessage::Request(request) => {
                let resolved = resolved.expect("requests always resolve a session");
                let mode = select_response_mode(
                    &accept,
                    prefer_async,
                    self.config.sse_enabled,
                    self.config.default_mode,
                    true,
                );
                debug!(method = %request.method, ?mode, session_id = %resolved.session_id,
                       "Dispatching request");
                match mode {
                    ResponseMode::Json => self.respond_json(request, resolved).await,
                    ResponseMode::Sse => self.respond_sse(request, resolved).await,
                }
            }
        }
    }

    async fn respond_json(
        &self,
        request: relay_mcp_json_rpc::JsonRpcRequest,
        resolved: ResolvedSession,
    ) -> Response<ResponseBody> {
        let responder = JsonResponder::new(
            Some(resolved.session_id.clone()),
            self.config.stateless,
        );
        let ctx = self.build_context(&resolved, Arc::new(NoopSink));
        let message = self.dispatcher.handle_request(request, &ctx).await;
        self.finish_ephemeral(&Some(resolved)).await;
        responder.respond(&message)
    }

    async fn respond_sse(
        &self,
        request: relay_mcp_json_rpc::JsonRpcRequest,
        resolved: ResolvedSession,
    ) -> Response<ResponseBody> {
        let responder = SseResponder::new(
            Some(resolved.session_id.clone()),
            self.config.stateless,
        );
        let writer = responder.writer();
        let ctx = self.build_context(&resolved, Arc::new(SseSink::new(writer.clone())));
        let responder = responder.cancel_on_disconnect(ctx.cancel.clone());

        let dispatcher = Arc::clone(&self.dispatcher);
        let sessions = Arc::clone(&self.sessions);
        let cancel = ctx.cancel.clone();
        tokio::spawn(async move {
            let message = dispatcher.handle_request(request, &ctx).await;
            if let Err(err) = writer.write_message(&message).await {
                // A failed terminal write means the client went away; cancel
                // whatever the handler left running.
                warn!("Terminal SSE write failed: {}", err);
                cancel.cancel();
            }
            if resolved.ephemeral {
                sessions.terminate(&resolved.session_id).await;
            }
        });

        responder.into_response()
    }

    // ------------------------------------------------------------------
    // GET (long-lived server -> client channel)
    // ------------------------------------------------------------------

    async fn handle_get<B>(&self, req: Request<B>) -> Response<ResponseBody> {
        if !self.config.get_sse_enabled || self.config.stateless {
            return status_response(
                StatusCode::NOT_IMPLEMENTED,
                "GET-SSE is disabled on this server",
            );
        }

        let session_id = match header_str(&req, MCP_SESSION_ID_HEADER) {
            Some(id) => id.to_string(),
            None => {
                return status_response(
                    StatusCode::BAD_REQUEST,
                    "Mcp-Session-Id header required for streaming connection",
                )
            }
        };

        if self.sessions.get(&session_id).await.is_none() {
            return status_response(StatusCode::NOT_FOUND, "Unknown session");
        }

        let last_event_id = header_str(&req, LAST_EVENT_ID_HEADER).map(|s| s.to_string());
        debug!(session_id = %session_id, last_event_id = ?last_event_id,
               "Opening GET-SSE connection");

        self.stream_manager.open(session_id, last_event_id).await
    }

    // ------------------------------------------------------------------
    // DELETE (explicit session termination)
    // ------------------------------------------------------------------

    async fn handle_delete<B>(&self, req: Request<B>) -> Response<ResponseBody> {
        if self.config.stateless {
            return status_response(
                StatusCode::NOT_IMPLEMENTED,
                "Sessions are disabled on this server",
            );
        }

        let session_id = match header_str(&req, MCP_SESSION_ID_HEADER) {
            Some(id) => id.to_string(),
            None => {
                return status_response(
                    StatusCode::BAD_REQUEST,
                    "Mcp-Session-Id header required for session termination",
                )
            }
        };

        // Cancel the GET-SSE channel synchronously before reporting success.
        self.stream_manager.close(&session_id).await;

        if self.sessions.terminate(&session_id).await {
            debug!(session_id = %session_id, "Session terminated via DELETE");
            Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "application/json")
                .body(full_body(
                    json!({"status": "session_terminated", "sessionId": session_id}).to_string(),
                ))
                .expect("static response parts are valid")
        } else {
            status_response(StatusCode::NOT_FOUND, "Unknown session")
        }
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn read_body<B>(&self, req: Request<B>) -> Result<String, Box<Response<ResponseBody>>>
    where
        B: Body + Send + 'static,
        B::Data: Send,
        B::Error: std::fmt::Display,
    {
        let collected = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(err) => {
                error!("Failed to read POST body: {}", err);
                return Err(Box::new(status_response(
                    StatusCode::BAD_REQUEST,
                    "Failed to read request body",
                )));
            }
        };

        if collected.len() > self.config.max_body_size {
            warn!(bytes = collected.len(), "POST body too large");
            return Err(Box::new(status_response(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large",
            )));
        }

        String::from_utf8(collected.to_vec()).map_err(|_| {
            Box::new(status_response(
                StatusCode::BAD_REQUEST,
                "Request body must be valid UTF-8",
            ))
        })
    }

    /// Resolve the session for a POST body per the session rules:
    /// `initialize` creates (stateful) or every message gets an ephemeral
    /// session (stateless); other messages need a known `Mcp-Session-Id`.
    ///
    /// Returns `Ok(None)` only for the tolerated session-less
    /// `notifications/initialized`.
    async fn resolve_session(
        &self,
        message: &ClientMessage,
        session_header: Option<&str>,
    ) -> Result<Option<ResolvedSession>, Box<Response<ResponseBody>>> {
        if self.config.stateless {
            let session = self.sessions.create().await;
            return Ok(Some(ResolvedSession {
                session_id: session.id,
                ephemeral: true,
            }));
        }

        if message.is_request() && message.method() == methods::INITIALIZE {
            let session = self.sessions.create().await;
            debug!(session_id = %session.id, "Created session for initialize");
            return Ok(Some(ResolvedSession {
                session_id: session.id,
                ephemeral: false,
            }));
        }

        match session_header {
            Some(session_id) => {
                if self.sessions.get(session_id).await.is_none() {
                    warn!(session_id = %session_id, "Unknown session id on POST");
                    return Err(Box::new(status_response(
                        StatusCode::NOT_FOUND,
                        "Unknown session",
                    )));
                }
                Ok(Some(ResolvedSession {
                    session_id: session_id.to_string(),
                    ephemeral: false,
                }))
            }
            None if message.method() == methods::NOTIFICATIONS_INITIALIZED
                && !message.is_request() =>
            {
                // Diagnostic tolerance: accepted even with no session attached
                Ok(None)
            }
            None => Err(Box::new(status_response(
                StatusCode::BAD_REQUEST,
                "Mcp-Session-Id header required",
            ))),
        }
    }

    fn build_context(
        &self,
        resolved: &ResolvedSession,
        sink: Arc<dyn NotificationSink>,
    ) -> RequestContext {
        let handle = SessionHandle::new(resolved.session_id.clone(), Arc::clone(&self.sessions));
        let mut ctx = RequestContext::detached()
            .with_session(Arc::new(handle))
            .with_sink(sink);
        if let Some(ref server) = self.server_handle {
            ctx = ctx.with_server(Arc::clone(server));
        }
        ctx
    }

    fn json_responder(&self, resolved: &Option<ResolvedSession>) -> JsonResponder {
        JsonResponder::new(
            resolved.as_ref().map(|r| r.session_id.clone()),
            self.config.stateless,
        )
    }

    async fn finish_ephemeral(&self, resolved: &Option<ResolvedSession>) {
        if let Some(resolved) = resolved {
            if resolved.ephemeral {
                self.sessions.terminate(&resolved.session_id).await;
            }
        }
    }
}

fn header_str<'a, B>(req: &'a Request<B>, name: &str) -> Option<&'a str> {
    req.headers().get(name).and_then(|v| v.to_str().ok())
}

/// POST bodies must arrive as `application/json`.
fn validate_post_headers<B>(req: &Request<B>) -> crate::Result<()> {
    let content_type = header_str(req, "content-type").unwrap_or_default();
    if !content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .eq_ignore_ascii_case("application/json")
    {
        return Err(HttpMcpError::InvalidRequest(format!(
            "Content-Type must be application/json, got '{}'",
            content_type
        )));
    }
    Ok(())
}

/// Plain JSON error body for framing-level failures.
fn status_response(status: StatusCode, message: &str) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full_body(json!({"error": message}).to_string()))
        .expect("static response parts are valid")
}

/// JSON-RPC error body with an explicit HTTP status.
fn rpc_error_response(status: StatusCode, error: &JsonRpcError) -> Response<ResponseBody> {
    let body = serde_json::to_string(error).unwrap_or_else(|_| "{}".to_string());
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(full_body(body))
        .expect("static response parts are valid")
}

fn method_not_allowed() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(ALLOW, "GET, POST, DELETE")
        .header(CONTENT_TYPE, "application/json")
        .body(full_body(json!({"error": "Method not allowed"}).to_string()))
        .expect("static response parts are valid")
}
