//! Builder assembling the protocol layer onto the HTTP transport.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use relay_http_mcp_server::{HttpMcpServer, ResponseMode, ServerConfig, StreamManager};
use relay_mcp_protocol::{Implementation, ResourceTemplate};
use relay_mcp_session::{InMemorySessionStore, SessionConfig};

use crate::core::ServerCore;
use crate::handlers::register_protocol_handlers;
use crate::prompt::{McpPrompt, PromptRegistry};
use crate::resource::{McpResource, ResourceRegistry};
use crate::server::McpServer;
use crate::subscriptions::SubscriptionManager;
use crate::tool::{McpTool, ToolRegistry};
use crate::{McpCompletion, Result};

/// Builder for [`McpServer`].
pub struct McpServerBuilder {
    name: String,
    version: String,
    instructions: Option<String>,
    config: ServerConfig,
    tools: Vec<Arc<dyn McpTool>>,
    resources: Vec<Arc<dyn McpResource>>,
    templates: Vec<ResourceTemplate>,
    prompts: Vec<Arc<dyn McpPrompt>>,
    completion: Option<Arc<dyn McpCompletion>>,
    logging_enabled: bool,
    experimental: Option<HashMap<String, Value>>,
}

impl McpServerBuilder {
    pub fn new() -> Self {
        Self {
            name: "relay-mcp-server".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            instructions: None,
            config: ServerConfig::default(),
            tools: Vec::new(),
            resources: Vec::new(),
            templates: Vec::new(),
            prompts: Vec::new(),
            completion: None,
            logging_enabled: true,
            experimental: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn bind_address(mut self, addr: SocketAddr) -> Self {
        self.config.bind_address = addr;
        self
    }

    pub fn endpoint_path(mut self, path: impl Into<String>) -> Self {
        self.config.endpoint_path = path.into();
        self
    }

    pub fn sse(mut self, enable: bool) -> Self {
        self.config.sse_enabled = enable;
        self
    }

    pub fn get_sse(mut self, enable: bool) -> Self {
        self.config.get_sse_enabled = enable;
        self
    }

    pub fn default_mode(mut self, mode: ResponseMode) -> Self {
        self.config.default_mode = mode;
        self
    }

    pub fn stateless(mut self, stateless: bool) -> Self {
        self.config.stateless = stateless;
        self
    }

    pub fn session_idle_ttl(mut self, ttl: Duration) -> Self {
        self.config.session_idle_ttl = ttl;
        self
    }

    pub fn logging(mut self, enable: bool) -> Self {
        self.logging_enabled = enable;
        self
    }

    pub fn experimental(mut self, experimental: HashMap<String, Value>) -> Self {
        self.experimental = Some(experimental);
        self
    }

    pub fn tool<T: McpTool + 'static>(mut self, tool: T) -> Self {
        self.tools.push(Arc::new(tool));
        self
    }

    pub fn resource<R: McpResource + 'static>(mut self, resource: R) -> Self {
        self.resources.push(Arc::new(resource));
        self
    }

    pub fn resource_template(mut self, template: ResourceTemplate) -> Self {
        self.templates.push(template);
        self
    }

    pub fn prompt<P: McpPrompt + 'static>(mut self, prompt: P) -> Self {
        self.prompts.push(Arc::new(prompt));
        self
    }

    pub fn completion_provider<C: McpCompletion + 'static>(mut self, provider: C) -> Self {
        self.completion = Some(Arc::new(provider));
        self
    }

    /// Assemble the server. Duplicate tool/resource/prompt registrations are
    /// rejected here; replacement is an explicit update on the registries.
    pub async fn build(self) -> Result<McpServer> {
        let sessions = Arc::new(InMemorySessionStore::with_config(SessionConfig {
            idle_ttl: self.config.session_idle_ttl,
        }));
        let stream_manager = Arc::new(StreamManager::new(self.config.keepalive_interval));

        let core = Arc::new(ServerCore {
            info: Implementation::new(self.name, self.version),
            instructions: self.instructions,
            tools: ToolRegistry::new(),
            resources: ResourceRegistry::new(),
            prompts: PromptRegistry::new(),
            subscriptions: SubscriptionManager::new(),
            completion: self.completion,
            sessions: Arc::clone(&sessions),
            stream_manager: Arc::clone(&stream_manager),
            logging_enabled: self.logging_enabled,
            experimental: self.experimental,
            stateless: self.config.stateless,
        });

        for tool in self.tools {
            core.tools.register(tool).await?;
        }
        for resource in self.resources {
            core.resources.register(resource).await?;
        }
        for template in self.templates {
            core.resources.register_template(template).await?;
        }
        for prompt in self.prompts {
            core.prompts.register(prompt).await?;
        }

        let mut http_builder = HttpMcpServer::builder()
            .config(self.config)
            .session_store(sessions)
            .stream_manager(Arc::clone(&stream_manager))
            .server_handle(Arc::clone(&core) as Arc<dyn std::any::Any + Send + Sync>);
        register_protocol_handlers(http_builder.dispatcher_mut(), Arc::clone(&core));
        let http = http_builder.build();

        Ok(McpServer::new(core, http))
    }
}

impl Default for McpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
