//! Typed notification payloads and their JSON-RPC constructors.
//!
//! All notifications emitted by the server go out as proper JSON-RPC
//! notifications: `{"jsonrpc":"2.0","method":"notifications/...","params":{...}}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use relay_mcp_json_rpc::JsonRpcNotification;

use crate::logging::LoggingLevel;
use crate::methods;

/// Params of `notifications/progress`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
    /// Progress in [0, 1]
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_token: Option<String>,
}

/// Params of `notifications/message`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingMessageParams {
    pub level: LoggingLevel,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logger: Option<String>,
}

/// Params of `notifications/resources/updated`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUpdatedParams {
    pub uri: String,
}

/// Params of the server-originated `stream/resumed` notification emitted as
/// the first event after a GET-SSE reconnect with `Last-Event-ID`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamResumedParams {
    pub resumed_from: String,
}

fn to_param_map<T: Serialize>(params: &T) -> HashMap<String, Value> {
    match serde_json::to_value(params) {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        _ => HashMap::new(),
    }
}

/// Build a `notifications/progress` notification.
pub fn progress_notification(progress: f64, message: impl Into<String>) -> JsonRpcNotification {
    let params = ProgressParams {
        progress,
        message: Some(message.into()),
        progress_token: None,
    };
    JsonRpcNotification::new_with_params(methods::NOTIFICATIONS_PROGRESS, to_param_map(&params))
}

/// Build a `notifications/message` notification.
pub fn logging_message_notification(
    level: LoggingLevel,
    message: impl Into<String>,
) -> JsonRpcNotification {
    let params = LoggingMessageParams {
        level,
        data: Value::String(message.into()),
        logger: None,
    };
    JsonRpcNotification::new_with_params(methods::NOTIFICATIONS_MESSAGE, to_param_map(&params))
}

/// Build a `notifications/resources/updated` notification.
pub fn resource_updated_notification(uri: impl Into<String>) -> JsonRpcNotification {
    let params = ResourceUpdatedParams { uri: uri.into() };
    JsonRpcNotification::new_with_params(
        methods::NOTIFICATIONS_RESOURCES_UPDATED,
        to_param_map(&params),
    )
}

/// Build the `stream/resumed` notification carrying the echoed event id.
pub fn stream_resumed_notification(resumed_from: impl Into<String>) -> JsonRpcNotification {
    let params = StreamResumedParams {
        resumed_from: resumed_from.into(),
    };
    JsonRpcNotification::new_with_params(methods::STREAM_RESUMED, to_param_map(&params))
}
