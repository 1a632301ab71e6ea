//! # JSON-RPC 2.0 Message Model and Dispatch
//!
//! A pure, transport-agnostic JSON-RPC 2.0 implementation with clean
//! domain/protocol separation. This crate provides the message types,
//! structural classification, and dispatch logic for JSON-RPC without any
//! transport-specific code.
//!
//! ## Features
//! - **JSON-RPC 2.0 Compliance**: Full specification support with proper error handling
//! - **Structural Classification**: `classify` decides message shape from the keys present
//! - **Type-Safe Error Handling**: Handlers return domain errors, the dispatcher owns protocol conversion
//! - **Transport Agnostic**: Works with HTTP, SSE streams, or in-memory channels
//!
//! ## Architecture
//!
//! ```rust,ignore
//! // Handlers return domain errors only
//! #[async_trait]
//! impl JsonRpcHandler for MyHandler {
//!     type Error = MyDomainError;  // Not JsonRpcError!
//!
//!     async fn handle(&self, ...) -> Result<Value, MyDomainError> {
//!         Err(MyDomainError::InvalidInput("bad data".to_string()))
//!     }
//! }
//!
//! // Dispatcher converts domain -> protocol automatically
//! let dispatcher: JsonRpcDispatcher<MyDomainError> = JsonRpcDispatcher::new();
//! ```

pub mod codec;
pub mod context;
pub mod dispatch;
pub mod error;
pub mod notification;
pub mod prelude;
pub mod request;
pub mod response;
pub mod types;

// Re-export main types
pub use codec::{classify, decode_message, parse_client_message, ClientMessage, JsonRpcFrame, MessageKind};
pub use context::{
    NotificationSink, NoopSink, RequestContext, SessionState, SessionStateError, SinkError,
};
pub use dispatch::{JsonRpcDispatcher, JsonRpcHandler, ToJsonRpcError};
pub use error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use notification::{JsonRpcNotification, NotificationParams};
pub use request::{JsonRpcRequest, RequestParams};
pub use response::{JsonRpcMessage, JsonRpcResponse, ResponseResult};
pub use types::{JsonRpcVersion, RequestId};

/// JSON-RPC 2.0 version constant
pub const JSONRPC_VERSION: &str = "2.0";

/// Standard JSON-RPC 2.0 error codes
pub mod error_codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const INVALID_REQUEST: i64 = -32600;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;

    // Server error range: -32099 to -32000
    pub const SERVER_ERROR_START: i64 = -32099;
    pub const SERVER_ERROR_END: i64 = -32000;
}
