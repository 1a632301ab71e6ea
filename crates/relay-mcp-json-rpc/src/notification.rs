//! JSON-RPC notifications with `_meta` handling.
//!
//! Notification params carry an optional `_meta` map distinct from the rest
//! of the parameter fields. On parse the two are split so handlers see both a
//! meta view and a free-form additional-fields view; on serialize they
//! re-merge with `_meta` emitted at most once.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::types::JsonRpcVersion;

/// Parameters of a JSON-RPC notification.
///
/// `meta` holds the `_meta` map; `other` holds every remaining field.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NotificationParams {
    #[serde(rename = "_meta", skip_serializing_if = "Option::is_none")]
    pub meta: Option<HashMap<String, Value>>,
    #[serde(flatten)]
    pub other: HashMap<String, Value>,
}

impl NotificationParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build params from a raw field map, splitting out `_meta` if present.
    pub fn from_map(mut fields: HashMap<String, Value>) -> Self {
        let meta = fields.remove("_meta").and_then(|v| match v {
            Value::Object(map) => Some(map.into_iter().collect()),
            _ => None,
        });
        Self {
            meta,
            other: fields,
        }
    }

    pub fn with_meta(mut self, meta: HashMap<String, Value>) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Get a non-meta parameter by name
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.other.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.other.insert(key.into(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.meta.is_none() && self.other.is_empty()
    }
}

/// A JSON-RPC notification (request without an id)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    #[serde(rename = "jsonrpc")]
    pub version: JsonRpcVersion,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<NotificationParams>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>, params: Option<NotificationParams>) -> Self {
        Self {
            version: JsonRpcVersion::V2_0,
            method: method.into(),
            params,
        }
    }

    /// Create a new notification with no parameters
    pub fn new_no_params(method: impl Into<String>) -> Self {
        Self::new(method, None)
    }

    /// Create a new notification with object parameters, splitting `_meta`
    pub fn new_with_params(method: impl Into<String>, params: HashMap<String, Value>) -> Self {
        Self::new(method, Some(NotificationParams::from_map(params)))
    }

    /// Get a non-meta parameter by name
    pub fn get_param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref()?.get(name)
    }

    /// Get a `_meta` entry by name
    pub fn get_meta(&self, name: &str) -> Option<&Value> {
        self.params.as_ref()?.meta.as_ref()?.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_str, json, to_string};

    #[test]
    fn test_notification_round_trip() {
        let notification = JsonRpcNotification::new_no_params("notifications/initialized");

        let json_str = to_string(&notification).unwrap();
        let parsed: JsonRpcNotification = from_str(&json_str).unwrap();

        assert_eq!(parsed, notification);
        assert!(!json_str.contains("\"id\""));
        assert!(json_str.contains("\"jsonrpc\":\"2.0\""));
    }

    #[test]
    fn test_meta_split_on_parse() {
        let raw = r#"{"jsonrpc":"2.0","method":"notifications/progress","params":{"progress":0.5,"_meta":{"trace":"abc"}}}"#;
        let parsed: JsonRpcNotification = from_str(raw).unwrap();

        let params = parsed.params.as_ref().unwrap();
        assert_eq!(params.get("progress"), Some(&json!(0.5)));
        assert!(params.get("_meta").is_none());
        assert_eq!(parsed.get_meta("trace"), Some(&json!("abc")));
    }

    #[test]
    fn test_meta_not_duplicated_on_serialize() {
        let mut fields = HashMap::new();
        fields.insert("uri".to_string(), json!("file:///x"));
        fields.insert("_meta".to_string(), json!({"k": 1}));

        let notification =
            JsonRpcNotification::new_with_params("notifications/resources/updated", fields);
        let json_str = to_string(&notification).unwrap();

        assert_eq!(json_str.matches("_meta").count(), 1);

        let reparsed: JsonRpcNotification = from_str(&json_str).unwrap();
        assert_eq!(reparsed, notification);
        assert!(reparsed.params.as_ref().unwrap().get("_meta").is_none());
    }
}
