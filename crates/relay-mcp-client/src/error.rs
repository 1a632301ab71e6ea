use thiserror::Error;

use relay_mcp_json_rpc::JsonRpcErrorObject;

/// Result type for client operations
pub type Result<T> = std::result::Result<T, McpClientError>;

/// Client-side errors
#[derive(Debug, Error)]
pub enum McpClientError {
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status}: {body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Server returned JSON-RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcErrorObject),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("No session established; call initialize first")]
    NoSession,
}

impl McpClientError {
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}
