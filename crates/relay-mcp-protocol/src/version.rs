//! Protocol version negotiation.
//!
//! The supported set is explicit and ordered, highest-priority first. A
//! client asking for an unknown version falls back to the server default;
//! the downgrade is logged at the negotiation site.

use serde::{Deserialize, Serialize};
use std::fmt;

/// MCP protocol versions understood by this implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProtocolVersion {
    /// Streamable HTTP transport revision
    #[default]
    V2025_03_26,
    /// Original HTTP+SSE revision
    V2024_11_05,
}

/// Supported versions in negotiation order, highest-priority first.
pub const SUPPORTED_VERSIONS: &[ProtocolVersion] =
    &[ProtocolVersion::V2025_03_26, ProtocolVersion::V2024_11_05];

impl ProtocolVersion {
    /// Parse from the wire string
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "2025-03-26" => Some(Self::V2025_03_26),
            "2024-11-05" => Some(Self::V2024_11_05),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::V2025_03_26 => "2025-03-26",
            Self::V2024_11_05 => "2024-11-05",
        }
    }

    /// Pick the first supported version matching the client's request, or
    /// `None` when the requested version is unknown (callers fall back to
    /// the default and log the downgrade).
    pub fn negotiate(requested: &str) -> Option<Self> {
        let wanted = Self::parse(requested)?;
        SUPPORTED_VERSIONS.iter().copied().find(|v| *v == wanted)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ProtocolVersion {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProtocolVersion {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown protocol version: {}", s)))
    }
}
