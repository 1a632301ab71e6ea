//! Structural classification and decoding of JSON-RPC messages.
//!
//! Classification is a pure function over the keys present: the presence of
//! `id` distinguishes request/response from notification, and the presence of
//! `error` vs `result` distinguishes error from success. Input that satisfies
//! none of the shapes is a parse error and elicits a protocol-level error
//! when a reply channel exists.

use serde_json::Value;

use crate::error::JsonRpcError;
use crate::notification::JsonRpcNotification;
use crate::request::JsonRpcRequest;
use crate::response::JsonRpcResponse;
use crate::types::RequestId;

/// The shape of a JSON-RPC message, decided by structural inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Request,
    Response,
    Error,
    Notification,
    Unknown,
}

/// Any decoded JSON-RPC message.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonRpcFrame {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
    Response(JsonRpcResponse),
    Error(JsonRpcError),
}

impl JsonRpcFrame {
    pub fn kind(&self) -> MessageKind {
        match self {
            JsonRpcFrame::Request(_) => MessageKind::Request,
            JsonRpcFrame::Notification(_) => MessageKind::Notification,
            JsonRpcFrame::Response(_) => MessageKind::Response,
            JsonRpcFrame::Error(_) => MessageKind::Error,
        }
    }
}

/// A message a server accepts on its inbound channel: request or notification.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

impl ClientMessage {
    pub fn method(&self) -> &str {
        match self {
            ClientMessage::Request(req) => &req.method,
            ClientMessage::Notification(notif) => &notif.method,
        }
    }

    pub fn is_request(&self) -> bool {
        matches!(self, ClientMessage::Request(_))
    }
}

/// Classify raw bytes by structural inspection without full decoding.
pub fn classify(bytes: &[u8]) -> MessageKind {
    let value: Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(_) => return MessageKind::Unknown,
    };
    classify_value(&value)
}

fn classify_value(value: &Value) -> MessageKind {
    let obj = match value.as_object() {
        Some(obj) => obj,
        None => return MessageKind::Unknown,
    };

    if obj.get("jsonrpc").and_then(|v| v.as_str()) != Some(crate::JSONRPC_VERSION) {
        return MessageKind::Unknown;
    }

    let has_id = obj.get("id").map(|v| !v.is_null()).unwrap_or(false);

    if obj.contains_key("method") {
        if has_id {
            MessageKind::Request
        } else {
            MessageKind::Notification
        }
    } else if obj.contains_key("error") {
        MessageKind::Error
    } else if has_id && obj.contains_key("result") {
        MessageKind::Response
    } else {
        MessageKind::Unknown
    }
}

/// Decode any JSON-RPC message into its typed variant.
///
/// Failure produces a protocol-level error: `-32700` for malformed JSON and
/// `-32600` for valid JSON of the wrong shape, preserving the inbound id
/// where one is identifiable.
pub fn decode_message(bytes: &[u8]) -> Result<JsonRpcFrame, JsonRpcError> {
    let value: Value = serde_json::from_slice(bytes).map_err(|_| JsonRpcError::parse_error())?;
    decode_value(value)
}

fn decode_value(value: Value) -> Result<JsonRpcFrame, JsonRpcError> {
    let kind = classify_value(&value);
    let id = extract_id(&value);

    let decoded = match kind {
        MessageKind::Request => {
            serde_json::from_value::<JsonRpcRequest>(value).map(JsonRpcFrame::Request)
        }
        MessageKind::Notification => {
            serde_json::from_value::<JsonRpcNotification>(value).map(JsonRpcFrame::Notification)
        }
        MessageKind::Response => {
            serde_json::from_value::<JsonRpcResponse>(value).map(JsonRpcFrame::Response)
        }
        MessageKind::Error => {
            serde_json::from_value::<JsonRpcError>(value).map(JsonRpcFrame::Error)
        }
        MessageKind::Unknown => {
            return Err(JsonRpcError::invalid_request(id));
        }
    };

    decoded.map_err(|_| JsonRpcError::invalid_request(id))
}

/// Parse a server-inbound body into a request or notification.
///
/// Responses and error responses are not valid client messages on a POST
/// body and are rejected as invalid requests.
pub fn parse_client_message(body: &str) -> Result<ClientMessage, JsonRpcError> {
    match decode_message(body.as_bytes())? {
        JsonRpcFrame::Request(req) => Ok(ClientMessage::Request(req)),
        JsonRpcFrame::Notification(notif) => Ok(ClientMessage::Notification(notif)),
        JsonRpcFrame::Response(resp) => Err(JsonRpcError::invalid_request(Some(resp.id))),
        JsonRpcFrame::Error(err) => Err(JsonRpcError::invalid_request(err.id)),
    }
}

fn extract_id(value: &Value) -> Option<RequestId> {
    match value.get("id") {
        Some(Value::Number(n)) => n.as_i64().map(RequestId::Number),
        Some(Value::String(s)) => Some(RequestId::String(s.clone())),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn bytes(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn test_classify_request() {
        let raw = bytes(json!({"jsonrpc":"2.0","id":1,"method":"ping"}));
        assert_eq!(classify(&raw), MessageKind::Request);
        assert!(matches!(
            decode_message(&raw).unwrap(),
            JsonRpcFrame::Request(_)
        ));
    }

    #[test]
    fn test_classify_notification() {
        let raw = bytes(json!({"jsonrpc":"2.0","method":"notifications/initialized"}));
        assert_eq!(classify(&raw), MessageKind::Notification);
        assert!(matches!(
            decode_message(&raw).unwrap(),
            JsonRpcFrame::Notification(_)
        ));
    }

    #[test]
    fn test_classify_response_and_error() {
        let ok = bytes(json!({"jsonrpc":"2.0","id":1,"result":{}}));
        assert_eq!(classify(&ok), MessageKind::Response);

        let err = bytes(json!({"jsonrpc":"2.0","id":null,"error":{"code":-32700,"message":"Parse error"}}));
        assert_eq!(classify(&err), MessageKind::Error);
        assert!(matches!(
            decode_message(&err).unwrap(),
            JsonRpcFrame::Error(_)
        ));
    }

    #[test]
    fn test_classification_agrees_with_decode() {
        // For every valid shape, classify and decode_message agree on exactly one variant
        let samples = vec![
            bytes(json!({"jsonrpc":"2.0","id":"a","method":"tools/list","params":{}})),
            bytes(json!({"jsonrpc":"2.0","method":"notifications/progress","params":{"progress":1.0}})),
            bytes(json!({"jsonrpc":"2.0","id":3,"result":{"ok":true}})),
            bytes(json!({"jsonrpc":"2.0","id":3,"error":{"code":-32601,"message":"x"}})),
        ];
        for raw in samples {
            let kind = classify(&raw);
            let frame = decode_message(&raw).unwrap();
            assert_eq!(frame.kind(), kind);
        }
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = decode_message(b"{not json").unwrap_err();
        assert_eq!(err.error.code, crate::error_codes::PARSE_ERROR);
        assert!(err.id.is_none());
    }

    #[test]
    fn test_wrong_shape_preserves_id() {
        // Valid JSON, but no method/result/error
        let raw = bytes(json!({"jsonrpc":"2.0","id":7}));
        let err = decode_message(&raw).unwrap_err();
        assert_eq!(err.error.code, crate::error_codes::INVALID_REQUEST);
        assert_eq!(err.id, Some(RequestId::Number(7)));
    }

    #[test]
    fn test_missing_version_is_unknown() {
        let raw = bytes(json!({"id":1,"method":"ping"}));
        assert_eq!(classify(&raw), MessageKind::Unknown);
    }

    #[test]
    fn test_client_message_rejects_response() {
        let body = json!({"jsonrpc":"2.0","id":9,"result":{}}).to_string();
        let err = parse_client_message(&body).unwrap_err();
        assert_eq!(err.id, Some(RequestId::Number(9)));
    }
}
