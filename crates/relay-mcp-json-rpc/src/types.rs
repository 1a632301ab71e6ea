use serde::{Deserialize, Serialize};
use std::fmt;

/// A JSON-RPC request identifier: a non-null string or integer.
///
/// Request and response carry an equal id for matching; notifications never
/// carry one.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(i64),
    String(String),
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestId::Number(n) => write!(f, "{}", n),
            RequestId::String(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n)
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

/// The `jsonrpc` field: exactly `"2.0"` on send, required on receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct JsonRpcVersion;

impl JsonRpcVersion {
    pub const V2_0: JsonRpcVersion = JsonRpcVersion;

    pub fn as_str(&self) -> &'static str {
        crate::JSONRPC_VERSION
    }
}

impl Serialize for JsonRpcVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(crate::JSONRPC_VERSION)
    }
}

impl<'de> Deserialize<'de> for JsonRpcVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        if s == crate::JSONRPC_VERSION {
            Ok(JsonRpcVersion)
        } else {
            Err(serde::de::Error::custom(format!(
                "unsupported JSON-RPC version: {}",
                s
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{from_str, json, to_string};

    #[test]
    fn test_request_id_untagged() {
        let num: RequestId = from_str("42").unwrap();
        assert_eq!(num, RequestId::Number(42));

        let text: RequestId = from_str("\"req-1\"").unwrap();
        assert_eq!(text, RequestId::String("req-1".to_string()));
    }

    #[test]
    fn test_version_round_trip() {
        let v = JsonRpcVersion::V2_0;
        assert_eq!(to_string(&v).unwrap(), "\"2.0\"");

        let parsed: JsonRpcVersion = from_str("\"2.0\"").unwrap();
        assert_eq!(parsed, JsonRpcVersion::V2_0);
    }

    #[test]
    fn test_version_rejects_other_values() {
        assert!(from_str::<JsonRpcVersion>("\"1.0\"").is_err());
        assert!(from_str::<JsonRpcVersion>(&to_string(&json!(2.0)).unwrap()).is_err());
    }
}
