//! Convenience re-exports for downstream crates.

pub use crate::codec::{
    classify, decode_message, parse_client_message, ClientMessage, JsonRpcFrame, MessageKind,
};
pub use crate::context::{
    NotificationSink, NoopSink, RequestContext, SessionState, SessionStateError, SinkError,
};
pub use crate::dispatch::{JsonRpcDispatcher, JsonRpcHandler, ToJsonRpcError};
pub use crate::error::{JsonRpcError, JsonRpcErrorCode, JsonRpcErrorObject};
pub use crate::notification::{JsonRpcNotification, NotificationParams};
pub use crate::request::{JsonRpcRequest, RequestParams};
pub use crate::response::{JsonRpcMessage, JsonRpcResponse, ResponseResult};
pub use crate::types::{JsonRpcVersion, RequestId};
pub use crate::{error_codes, JSONRPC_VERSION};
