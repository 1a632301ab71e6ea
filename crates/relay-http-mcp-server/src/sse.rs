//! SSE wire framing.
//!
//! Each event is framed as `id: <event-id>\ndata: <json>\n\n` where the data
//! line is a complete JSON-RPC message. Keep-alives go out as comment lines
//! that compliant clients discard.

use bytes::Bytes;
use serde_json::Value;

/// A single server-sent event ready for the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct SseEvent {
    pub id: String,
    pub data: Value,
}

impl SseEvent {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Format as an SSE frame.
    pub fn format(&self) -> Bytes {
        let data = self.data.to_string();
        Bytes::from(format!("id: {}\ndata: {}\n\n", self.id, data))
    }
}

/// A comment frame used as a keep-alive ping.
pub fn keepalive_frame() -> Bytes {
    Bytes::from_static(b": keepalive\n\n")
}

/// Ensure an outbound JSON-RPC object carries the `jsonrpc` field, filling it
/// when absent on the inbound object.
pub fn ensure_jsonrpc_version(value: &mut Value) {
    if let Some(obj) = value.as_object_mut() {
        obj.entry("jsonrpc")
            .or_insert_with(|| Value::String(relay_mcp_json_rpc::JSONRPC_VERSION.to_string()));
    }
}
