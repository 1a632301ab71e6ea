//! The assembled MCP server.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use relay_http_mcp_server::HttpMcpServer;
use relay_mcp_json_rpc::JsonRpcNotification;
use relay_mcp_protocol::{logging_message_notification, LoggingLevel};

use crate::builder::McpServerBuilder;
use crate::core::ServerCore;
use crate::Result;

/// An MCP server: protocol layer plus the Streamable HTTP transport.
#[derive(Clone)]
pub struct McpServer {
    core: Arc<ServerCore>,
    http: HttpMcpServer,
}

impl McpServer {
    pub fn builder() -> McpServerBuilder {
        McpServerBuilder::new()
    }

    pub(crate) fn new(core: Arc<ServerCore>, http: HttpMcpServer) -> Self {
        Self { core, http }
    }

    pub fn core(&self) -> &Arc<ServerCore> {
        &self.core
    }

    pub fn http(&self) -> &HttpMcpServer {
        &self.http
    }

    /// Bind the configured address; returns the listener and actual address.
    pub async fn bind(&self) -> Result<(TcpListener, SocketAddr)> {
        Ok(self.http.bind().await?)
    }

    /// Serve until shutdown.
    pub async fn run(&self) -> Result<()> {
        Ok(self.http.run().await?)
    }

    /// Serve on an already-bound listener.
    pub async fn run_on(&self, listener: TcpListener, addr: SocketAddr) -> Result<()> {
        Ok(self.http.run_on(listener, addr).await?)
    }

    pub fn shutdown(&self) {
        self.http.shutdown();
    }

    /// Emit `notifications/resources/updated` to every subscriber of a uri;
    /// returns how many subscribers took delivery.
    pub async fn notify_resource_updated(&self, uri: &str) -> usize {
        self.core.notify_resource_updated(uri).await
    }

    /// Broadcast a log message to every live session's GET-SSE channel.
    pub async fn broadcast_log(&self, level: LoggingLevel, message: &str) {
        self.core
            .broadcast(logging_message_notification(level, message))
            .await;
    }

    /// Broadcast an arbitrary notification to every live session.
    pub async fn broadcast(&self, notification: JsonRpcNotification) {
        self.core.broadcast(notification).await;
    }
}
