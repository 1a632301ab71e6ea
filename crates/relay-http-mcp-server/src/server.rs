//! HTTP MCP server: configuration, builder, and the accept loop.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use relay_mcp_protocol::McpError;
use relay_mcp_session::{InMemorySessionStore, SessionConfig};

use crate::endpoint::McpEndpoint;
use crate::responder::ResponseMode;
use crate::stream_manager::StreamManager;
use crate::{full_body, JsonRpcDispatcher, ResponseBody, Result};

/// Configuration for the HTTP MCP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_address: SocketAddr,
    /// Path hosting all three verbs
    pub endpoint_path: String,
    /// Maximum request body size
    pub max_body_size: usize,
    /// Enable SSE responses to POST requests
    pub sse_enabled: bool,
    /// Enable the long-lived GET notification channel
    pub get_sse_enabled: bool,
    /// Responder picked when the client accepts both shapes
    pub default_mode: ResponseMode,
    /// Skip session creation and never emit the session header
    pub stateless: bool,
    /// Idle time before sessions are expired
    pub session_idle_ttl: Duration,
    /// Keep-alive cadence on GET-SSE connections
    pub keepalive_interval: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8000".parse().expect("valid literal address"),
            endpoint_path: "/mcp".to_string(),
            max_body_size: 1024 * 1024, // 1MB
            sse_enabled: true,
            get_sse_enabled: true,
            default_mode: ResponseMode::Json,
            stateless: false,
            session_idle_ttl: Duration::from_secs(30 * 60),
            keepalive_interval: Duration::from_secs(30),
        }
    }
}

/// Builder for the HTTP MCP server
pub struct HttpMcpServerBuilder {
    config: ServerConfig,
    dispatcher: JsonRpcDispatcher<McpError>,
    server_handle: Option<Arc<dyn Any + Send + Sync>>,
    sessions: Option<Arc<InMemorySessionStore>>,
    stream_manager: Option<Arc<StreamManager>>,
}

impl HttpMcpServerBuilder {
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            dispatcher: JsonRpcDispatcher::new(),
            server_handle: None,
            sessions: None,
            stream_manager: None,
        }
    }

    /// Share an externally-created session store instead of building one.
    pub fn session_store(mut self, sessions: Arc<InMemorySessionStore>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Share an externally-created stream manager instead of building one.
    pub fn stream_manager(mut self, stream_manager: Arc<StreamManager>) -> Self {
        self.stream_manager = Some(stream_manager);
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    pub fn endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.config.endpoint_path = path.into();
        self
    }

    pub fn sse(mut self, enable: bool) -> Self {
        self.config.sse_enabled = enable;
        self
    }

    pub fn get_sse(mut self, enable: bool) -> Self {
        self.config.get_sse_enabled = enable;
        self
    }

    pub fn default_mode(mut self, mode: ResponseMode) -> Self {
        self.config.default_mode = mode;
        self
    }

    pub fn stateless(mut self, stateless: bool) -> Self {
        self.config.stateless = stateless;
        self
    }

    pub fn session_idle_ttl(mut self, ttl: Duration) -> Self {
        self.config.session_idle_ttl = ttl;
        self
    }

    /// Register a JSON-RPC handler for specific methods
    pub fn register_handler<H>(mut self, methods: Vec<String>, handler: H) -> Self
    where
        H: crate::JsonRpcHandler<Error = McpError> + 'static,
    {
        self.dispatcher.register_methods(methods, handler);
        self
    }

    /// Attach the handle handlers reach through the call context
    pub fn server_handle(mut self, handle: Arc<dyn Any + Send + Sync>) -> Self {
        self.server_handle = Some(handle);
        self
    }

    /// Access the dispatcher for direct registration
    pub fn dispatcher_mut(&mut self) -> &mut JsonRpcDispatcher<McpError> {
        &mut self.dispatcher
    }

    pub fn build(self) -> HttpMcpServer {
        let config = Arc::new(self.config);
        let sessions = self.sessions.unwrap_or_else(|| {
            Arc::new(InMemorySessionStore::with_config(SessionConfig {
                idle_ttl: config.session_idle_ttl,
            }))
        });
        let stream_manager = self
            .stream_manager
            .unwrap_or_else(|| Arc::new(StreamManager::new(config.keepalive_interval)));
        let dispatcher = Arc::new(self.dispatcher);

        let mut endpoint = McpEndpoint::new(
            Arc::clone(&config),
            Arc::clone(&dispatcher),
            Arc::clone(&sessions),
            Arc::clone(&stream_manager),
        );
        if let Some(handle) = self.server_handle {
            endpoint = endpoint.with_server_handle(handle);
        }

        HttpMcpServer {
            config,
            endpoint,
            sessions,
            stream_manager,
            shutdown: CancellationToken::new(),
        }
    }
}

impl Default for HttpMcpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP MCP server hosting the endpoint on a TCP listener.
#[derive(Clone)]
pub struct HttpMcpServer {
    config: Arc<ServerConfig>,
    endpoint: McpEndpoint,
    sessions: Arc<InMemorySessionStore>,
    stream_manager: Arc<StreamManager>,
    shutdown: CancellationToken,
}

impl HttpMcpServer {
    pub fn builder() -> HttpMcpServerBuilder {
        HttpMcpServerBuilder::new()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<InMemorySessionStore> {
        &self.sessions
    }

    pub fn stream_manager(&self) -> &Arc<StreamManager> {
        &self.stream_manager
    }

    pub fn endpoint(&self) -> &McpEndpoint {
        &self.endpoint
    }

    /// Token cancelled by [`HttpMcpServer::shutdown`].
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Bind the listener and return the actual local address. Useful with
    /// port 0 in tests.
    pub async fn bind(&self) -> Result<(TcpListener, SocketAddr)> {
        let listener = TcpListener::bind(&self.config.bind_address).await?;
        let addr = listener.local_addr()?;
        Ok((listener, addr))
    }

    /// Run the server until shutdown.
    pub async fn run(&self) -> Result<()> {
        let (listener, addr) = self.bind().await?;
        self.run_on(listener, addr).await
    }

    /// Run the server on an already-bound listener.
    pub async fn run_on(&self, listener: TcpListener, addr: SocketAddr) -> Result<()> {
        if !self.config.stateless {
            self.start_session_sweeper();
        }

        info!("HTTP MCP server listening on {}", addr);
        info!("MCP endpoint available at: {}", self.config.endpoint_path);

        loop {
            let (stream, peer_addr) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = self.shutdown.cancelled() => {
                    info!("HTTP MCP server shutting down");
                    return Ok(());
                }
            };
            debug!("New connection from {}", peer_addr);

            let endpoint = self.endpoint.clone();
            let path = self.config.endpoint_path.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    route_request(req, endpoint.clone(), path.clone())
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    // Common client disconnects are not actual problems
                    let err_str = err.to_string();
                    if err_str.contains("connection closed before message completed")
                        || err_str.contains("connection reset")
                    {
                        debug!("Client disconnected: {}", err);
                    } else {
                        error!("Error serving connection: {}", err);
                    }
                }
            });
        }
    }

    /// Periodic sweep on top of lazy lookup expiry; also closes the GET-SSE
    /// channels of expired sessions.
    fn start_session_sweeper(&self) {
        let sessions = Arc::clone(&self.sessions);
        let stream_manager = Arc::clone(&self.stream_manager);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = shutdown.cancelled() => return,
                }
                let expired = sessions.expire_idle().await;
                if !expired.is_empty() {
                    info!("Expired {} idle sessions", expired.len());
                    for session_id in expired {
                        stream_manager.close(&session_id).await;
                    }
                }
            }
        });
    }
}

async fn route_request<B>(
    req: Request<B>,
    endpoint: McpEndpoint,
    endpoint_path: String,
) -> std::result::Result<Response<ResponseBody>, std::convert::Infallible>
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: std::fmt::Display,
{
    let path = req.uri().path().to_string();
    debug!("Handling {} {}", req.method(), path);

    let response = if path == endpoint_path {
        endpoint.handle(req).await
    } else {
        Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(full_body("Not Found"))
            .expect("static response parts are valid")
    };

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.endpoint_path, "/mcp");
        assert_eq!(config.max_body_size, 1024 * 1024);
        assert!(config.sse_enabled);
        assert!(!config.stateless);
    }

    #[test]
    fn test_builder() {
        let server = HttpMcpServer::builder()
            .endpoint_path("/api/mcp")
            .sse(false)
            .stateless(true)
            .build();

        assert_eq!(server.config().endpoint_path, "/api/mcp");
        assert!(!server.config().sse_enabled);
        assert!(server.config().stateless);
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let server = HttpMcpServer::builder()
            .bind_address("127.0.0.1:0".parse().unwrap())
            .build();
        let (_listener, addr) = server.bind().await.unwrap();
        assert_ne!(addr.port(), 0);
    }
}
