use std::time::Duration;

use relay_mcp_protocol::{Implementation, ProtocolVersion};

/// Client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The MCP endpoint URL (e.g. `http://127.0.0.1:8000/mcp`)
    pub endpoint: String,
    /// Connect timeout for the underlying HTTP client. Streaming reads run
    /// without a body deadline; wrap individual calls in `tokio::time::timeout`
    /// when a hard bound is needed.
    pub connect_timeout: Duration,
    /// Whether to open the long-lived GET notification channel after a
    /// successful stateful initialize
    pub get_sse_enabled: bool,
    /// Reconnect delay for the GET-SSE loop
    pub reconnect_delay: Duration,
    /// Implementation info sent in the initialize handshake
    pub client_info: Implementation,
    /// Protocol version requested in the initialize handshake
    pub protocol_version: ProtocolVersion,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            connect_timeout: Duration::from_secs(10),
            get_sse_enabled: true,
            reconnect_delay: Duration::from_secs(2),
            client_info: Implementation::new("relay-mcp-client", env!("CARGO_PKG_VERSION")),
            protocol_version: ProtocolVersion::default(),
        }
    }

    pub fn client_info(mut self, info: Implementation) -> Self {
        self.client_info = info;
        self
    }

    pub fn get_sse(mut self, enable: bool) -> Self {
        self.get_sse_enabled = enable;
        self
    }

    pub fn protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }
}
