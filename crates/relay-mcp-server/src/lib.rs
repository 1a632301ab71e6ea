//! # MCP Server Framework
//!
//! A builder-pattern API for MCP servers over the Streamable HTTP transport.
//! Register tools, resources, and prompts; the framework wires the
//! initialize state machine, lifecycle guards, capability advertisement, and
//! subscription fan-out into the HTTP layer.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relay_mcp_server::{McpServer, McpTool};
//! use relay_mcp_protocol::{CallToolParams, CallToolResult, McpResult};
//! use relay_mcp_json_rpc::RequestContext;
//! use async_trait::async_trait;
//! use serde_json::json;
//!
//! struct EchoTool;
//!
//! #[async_trait]
//! impl McpTool for EchoTool {
//!     fn name(&self) -> &str { "echo" }
//!     fn description(&self) -> Option<&str> { Some("Echo back the input text") }
//!     fn input_schema(&self) -> serde_json::Value {
//!         json!({"type": "object", "properties": {"text": {"type": "string"}}})
//!     }
//!
//!     async fn call(&self, _ctx: &RequestContext, params: CallToolParams)
//!         -> McpResult<CallToolResult>
//!     {
//!         let text = params.arguments.as_ref()
//!             .and_then(|a| a.get("text"))
//!             .and_then(|v| v.as_str())
//!             .unwrap_or("No text provided");
//!         Ok(CallToolResult::from_text(format!("Echo: {}", text)))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = McpServer::builder()
//!         .name("echo-server")
//!         .version("1.0.0")
//!         .tool(EchoTool)
//!         .build()
//!         .await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod builder;
pub mod core;
pub mod handlers;
pub mod prompt;
pub mod resource;
pub mod server;
pub mod subscriptions;
pub mod tool;

#[cfg(test)]
mod tests;

// Re-export main types
pub use builder::McpServerBuilder;
pub use core::ServerCore;
pub use prompt::{McpPrompt, PromptRegistry};
pub use resource::{McpResource, ResourceRegistry};
pub use server::McpServer;
pub use subscriptions::SubscriptionManager;
pub use tool::{McpTool, ToolRegistry};

// Re-export foundational types
pub use relay_http_mcp_server::{HttpMcpServer, ResponseMode, ServerConfig};
pub use relay_mcp_json_rpc::{JsonRpcDispatcher, JsonRpcHandler, RequestContext};
pub use relay_mcp_protocol::prelude::*;

/// Result type for framework operations
pub type Result<T> = std::result::Result<T, McpFrameworkError>;

/// Framework-level errors
#[derive(Debug, thiserror::Error)]
pub enum McpFrameworkError {
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] relay_mcp_protocol::McpError),

    #[error("HTTP transport error: {0}")]
    Http(#[from] relay_http_mcp_server::HttpMcpError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Trait for pluggable `completion/complete` providers.
#[async_trait::async_trait]
pub trait McpCompletion: Send + Sync {
    async fn complete(
        &self,
        ctx: &RequestContext,
        params: CompleteParams,
    ) -> McpResult<CompleteResult>;
}
