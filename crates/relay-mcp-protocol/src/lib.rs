//! # Model Context Protocol (MCP) Wire Types
//!
//! Types for the MCP protocol surface carried over the Streamable HTTP
//! transport: the initialize handshake, tool/resource/prompt operations,
//! completion, logging, and the notification payloads handlers emit
//! mid-request.
//!
//! Built on top of the `relay-mcp-json-rpc` foundation; the domain error
//! type here converts into JSON-RPC protocol errors at the dispatch seam.

pub mod completion;
pub mod content;
pub mod initialize;
pub mod logging;
pub mod methods;
pub mod notifications;
pub mod prelude;
pub mod prompts;
pub mod resources;
pub mod sink_ext;
pub mod tools;
pub mod version;

// Re-export main types
pub use completion::{
    CompleteParams, CompleteResult, CompletionArgument, CompletionReference, CompletionValues,
};
pub use content::{ResourceContents, ToolContent};
pub use initialize::{
    ClientCapabilities, CompletionsCapability, Implementation, InitializeParams, InitializeResult,
    LoggingCapability, PromptsCapability, ResourcesCapability, ServerCapabilities, ToolsCapability,
};
pub use logging::{LoggingLevel, SetLevelParams};
pub use notifications::{
    logging_message_notification, progress_notification, resource_updated_notification,
    stream_resumed_notification, LoggingMessageParams, ProgressParams, ResourceUpdatedParams,
    StreamResumedParams,
};
pub use prompts::{
    GetPromptParams, GetPromptResult, ListPromptsResult, Prompt, PromptArgument, PromptMessage,
    Role,
};
pub use resources::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceParams, ReadResourceResult,
    Resource, ResourceTemplate, SubscribeParams, UnsubscribeParams,
};
pub use sink_ext::NotificationSinkExt;
pub use tools::{CallToolParams, CallToolResult, ListToolsResult, Tool};
pub use version::{ProtocolVersion, SUPPORTED_VERSIONS};

/// Common result type for MCP operations
pub type McpResult<T> = Result<T, McpError>;

/// MCP-specific errors
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Prompt not found: {0}")]
    PromptNotFound(String),

    #[error("Already registered: {0}")]
    AlreadyRegistered(String),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Tool execution failed: {0}")]
    ToolExecutionError(String),

    #[error("Resource execution failed: {0}")]
    ResourceExecutionError(String),

    #[error("Prompt execution failed: {0}")]
    PromptExecutionError(String),

    #[error("Capability disabled: {0}")]
    CapabilityDisabled(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Session not initialized: method '{0}' requires a completed initialize handshake")]
    NotInitialized(String),

    #[error("Session terminated")]
    SessionTerminated,

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl McpError {
    /// Create a missing parameter error
    pub fn missing_param(param: &str) -> Self {
        Self::MissingParameter(param.to_string())
    }

    /// Create an invalid parameters error
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::InvalidParameters(message.into())
    }

    /// Create a tool execution error
    pub fn tool_execution(message: impl Into<String>) -> Self {
        Self::ToolExecutionError(message.into())
    }

    /// Create a resource execution error
    pub fn resource_execution(message: impl Into<String>) -> Self {
        Self::ResourceExecutionError(message.into())
    }

    /// Create a prompt execution error
    pub fn prompt_execution(message: impl Into<String>) -> Self {
        Self::PromptExecutionError(message.into())
    }

    /// Create a session error
    pub fn session(message: impl Into<String>) -> Self {
        Self::SessionError(message.into())
    }

    /// Create a transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::TransportError(message.into())
    }
}

// Domain -> protocol conversion at the dispatch seam
impl relay_mcp_json_rpc::ToJsonRpcError for McpError {
    fn to_error_object(&self) -> relay_mcp_json_rpc::JsonRpcErrorObject {
        use relay_mcp_json_rpc::JsonRpcErrorObject;

        match self {
            // Parameter-related errors map to InvalidParams (-32602)
            McpError::InvalidParameters(msg) => JsonRpcErrorObject::invalid_params(msg),
            McpError::MissingParameter(param) => JsonRpcErrorObject::invalid_params(&format!(
                "Missing required parameter: {}",
                param
            )),

            McpError::MethodNotFound(method) => JsonRpcErrorObject::method_not_found(method),

            // Not-found errors map into the reserved server range
            McpError::ToolNotFound(name) => JsonRpcErrorObject::server_error(
                -32001,
                &format!("Tool not found: {}", name),
                None,
            ),
            McpError::ResourceNotFound(uri) => JsonRpcErrorObject::server_error(
                -32002,
                &format!("Resource not found: {}", uri),
                None,
            ),
            McpError::PromptNotFound(name) => JsonRpcErrorObject::server_error(
                -32003,
                &format!("Prompt not found: {}", name),
                None,
            ),
            McpError::AlreadyRegistered(name) => JsonRpcErrorObject::server_error(
                -32004,
                &format!("Already registered: {}", name),
                None,
            ),

            // Execution errors
            McpError::ToolExecutionError(msg) => JsonRpcErrorObject::server_error(
                -32010,
                &format!("Tool execution failed: {}", msg),
                None,
            ),
            McpError::ResourceExecutionError(msg) => JsonRpcErrorObject::server_error(
                -32012,
                &format!("Resource execution failed: {}", msg),
                None,
            ),
            McpError::PromptExecutionError(msg) => JsonRpcErrorObject::server_error(
                -32013,
                &format!("Prompt execution failed: {}", msg),
                None,
            ),

            // Lifecycle and capability errors
            McpError::CapabilityDisabled(cap) => JsonRpcErrorObject::server_error(
                -32020,
                &format!("Capability disabled: {}", cap),
                None,
            ),
            McpError::SessionError(msg) => JsonRpcErrorObject::server_error(
                -32031,
                &format!("Session error: {}", msg),
                None,
            ),
            McpError::NotInitialized(method) => JsonRpcErrorObject::server_error(
                -32032,
                &format!("Session not initialized for method '{}'", method),
                None,
            ),
            McpError::SessionTerminated => {
                JsonRpcErrorObject::server_error(-32033, "Session terminated", None)
            }

            McpError::TransportError(msg) => JsonRpcErrorObject::server_error(
                -32040,
                &format!("Transport error: {}", msg),
                None,
            ),

            // Everything else is an internal error
            McpError::SerializationError(err) => {
                JsonRpcErrorObject::internal_error(Some(format!("Serialization error: {}", err)))
            }
            McpError::Internal(msg) => JsonRpcErrorObject::internal_error(Some(msg.clone())),
        }
    }
}
