//! Per-method protocol handlers.
//!
//! Each handler is registered with the JSON-RPC dispatcher for its method
//! family and reaches shared state through `Arc<ServerCore>`. Lifecycle
//! guards run here: guarded methods demand a completed initialize handshake.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use relay_mcp_json_rpc::{
    JsonRpcHandler, NotificationParams, RequestContext, RequestParams,
};
use relay_mcp_protocol::{
    methods, CallToolParams, CompleteParams, GetPromptParams, InitializeParams, InitializeResult,
    ListPromptsResult, ListResourceTemplatesResult, ListResourcesResult, ListToolsResult,
    McpError, McpResult, ProtocolVersion, ReadResourceParams, ReadResourceResult, SetLevelParams,
    SubscribeParams, UnsubscribeParams,
};
use relay_mcp_session::LifecycleState;

use crate::core::ServerCore;

/// Session-state key holding the negotiated protocol version.
pub const PROTOCOL_VERSION_KEY: &str = "protocolVersion";
/// Session-state key holding the client's implementation info.
pub const CLIENT_INFO_KEY: &str = "clientInfo";
/// Session-state key holding the per-session minimum log level.
pub const LOG_LEVEL_KEY: &str = "logLevel";

fn parse_params<T: serde::de::DeserializeOwned>(
    method: &str,
    params: Option<RequestParams>,
) -> McpResult<T> {
    let value = params
        .map(|p| p.to_value())
        .ok_or_else(|| McpError::invalid_params(format!("{} requires params", method)))?;
    serde_json::from_value(value)
        .map_err(|e| McpError::invalid_params(format!("invalid {} params: {}", method, e)))
}

fn to_result<T: serde::Serialize>(value: &T) -> McpResult<Value> {
    serde_json::to_value(value).map_err(McpError::from)
}

/// Handles the `initialize` handshake.
pub struct InitializeHandler {
    core: Arc<ServerCore>,
}

impl InitializeHandler {
    pub fn new(core: Arc<ServerCore>) -> Self {
        Self { core }
    }
}

#[async_trait]
impl JsonRpcHandler for InitializeHandler {
    type Error = McpError;

    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        ctx: &RequestContext,
    ) -> Result<Value, Self::Error> {
        let params: InitializeParams = parse_params(method, params)?;

        let version = match ProtocolVersion::negotiate(&params.protocol_version) {
            Some(version) => version,
            None => {
                let fallback = ProtocolVersion::default();
                warn!(requested = %params.protocol_version, fallback = %fallback,
                      "Unknown protocol version requested, falling back to default");
                fallback
            }
        };

        if let Some(session) = &ctx.session {
            let session_id = session.session_id().to_string();
            if !self.core.stateless {
                match self.core.sessions.lifecycle(&session_id).await {
                    Some(LifecycleState::Uninitialized) | None => {}
                    Some(state) => {
                        warn!(session_id = %session_id, ?state, "initialize on a non-fresh session");
                        return Err(McpError::session(
                            "initialize is only valid on a fresh session",
                        ));
                    }
                }
            }

            session
                .set_value(PROTOCOL_VERSION_KEY, json!(version.as_str()))
                .await
                .map_err(|e| McpError::session(e.to_string()))?;
            session
                .set_value(CLIENT_INFO_KEY, to_result(&params.client_info)?)
                .await
                .map_err(|e| McpError::session(e.to_string()))?;
            self.core
                .sessions
                .set_lifecycle(&session_id, LifecycleState::Initializing)
                .await
                .map_err(|e| McpError::session(e.to_string()))?;

            info!(session_id = %session_id, client = %params.client_info.name,
                  version = %version, "Session initializing");
        }

        let mut result = InitializeResult::new(
            version,
            self.core.info.clone(),
            self.core.capabilities().await,
        );
        if let Some(ref instructions) = self.core.instructions {
            result = result.with_instructions(instructions.clone());
        }
        to_result(&result)
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::INITIALIZE.to_string()]
    }
}

/// Handles `notifications/initialized`, completing the handshake.
pub struct InitializedNotificationHandler {
    core: Arc<ServerCore>,
}

impl InitializedNotificationHandler {
    pub fn new(core: Arc<ServerCore>) -> Self {
        Self { core }
    }
}

#[async_trait]
impl JsonRpcHandler for InitializedNotificationHandler {
    type Error = McpError;

    async fn handle(
        &self,
        method: &str,
        _params: Option<RequestParams>,
        _ctx: &RequestContext,
    ) -> Result<Value, Self::Error> {
        // notifications/initialized arrives as a notification, never a request
        Err(McpError::MethodNotFound(method.to_string()))
    }

    async fn handle_notification(
        &self,
        _method: &str,
        _params: Option<NotificationParams>,
        ctx: &RequestContext,
    ) -> Result<(), Self::Error> {
        let Some(session_id) = ctx.session_id().map(|s| s.to_string()) else {
            // Tolerated for diagnostics: the transport accepts this
            // notification even when no session was attached.
            warn!("notifications/initialized received without a session");
            return Ok(());
        };

        match self.core.sessions.lifecycle(&session_id).await {
            Some(LifecycleState::Initializing) => {
                self.core
                    .sessions
                    .set_lifecycle(&session_id, LifecycleState::Initialized)
                    .await
                    .map_err(|e| McpError::session(e.to_string()))?;
                info!(session_id = %session_id, "Session initialized");
            }
            Some(LifecycleState::Initialized) => {
                debug!(session_id = %session_id, "Duplicate notifications/initialized ignored");
            }
            state => {
                warn!(session_id = %session_id, ?state,
                      "notifications/initialized outside the handshake");
            }
        }
        Ok(())
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::NOTIFICATIONS_INITIALIZED.to_string()]
    }
}

/// Handles `ping`.
pub struct PingHandler;

#[async_trait]
impl JsonRpcHandler for PingHandler {
    type Error = McpError;

    async fn handle(
        &self,
        _method: &str,
        _params: Option<RequestParams>,
        _ctx: &RequestContext,
    ) -> Result<Value, Self::Error> {
        Ok(json!({}))
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::PING.to_string()]
    }
}

/// Handles `tools/list` and `tools/call`.
pub struct ToolsHandler {
    core: Arc<ServerCore>,
}

impl ToolsHandler {
    pub fn new(core: Arc<ServerCore>) -> Self {
        Self { core }
    }
}

#[async_trait]
impl JsonRpcHandler for ToolsHandler {
    type Error = McpError;

    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        ctx: &RequestContext,
    ) -> Result<Value, Self::Error> {
        self.core.require_initialized(ctx, method).await?;

        match method {
            methods::TOOLS_LIST => {
                to_result(&ListToolsResult::new(self.core.tools.descriptors().await))
            }
            methods::TOOLS_CALL => {
                let params: CallToolParams = parse_params(method, params)?;
                let tool = self
                    .core
                    .tools
                    .get(&params.name)
                    .await
                    .ok_or_else(|| McpError::ToolNotFound(params.name.clone()))?;

                debug!(tool = %params.name, "Invoking tool");
                match tool.call(ctx, params).await {
                    // A result with isError set is the tool-shaped failure;
                    // it passes through unchanged.
                    Ok(result) => to_result(&result),
                    // A plain error surfaces as a JSON-RPC internal error.
                    Err(err) => {
                        error!("Tool execution failed: {}", err);
                        Err(McpError::Internal(err.to_string()))
                    }
                }
            }
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::TOOLS_LIST.to_string(), methods::TOOLS_CALL.to_string()]
    }
}

/// Handles the `resources/*` family.
pub struct ResourcesHandler {
    core: Arc<ServerCore>,
}

impl ResourcesHandler {
    pub fn new(core: Arc<ServerCore>) -> Self {
        Self { core }
    }

    fn session_token(ctx: &RequestContext) -> McpResult<String> {
        ctx.session_id()
            .map(|s| s.to_string())
            .ok_or_else(|| McpError::session("resource subscriptions require a session"))
    }
}

#[async_trait]
impl JsonRpcHandler for ResourcesHandler {
    type Error = McpError;

    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        ctx: &RequestContext,
    ) -> Result<Value, Self::Error> {
        self.core.require_initialized(ctx, method).await?;

        match method {
            methods::RESOURCES_LIST => to_result(&ListResourcesResult::new(
                self.core.resources.descriptors().await,
            )),
            methods::RESOURCES_TEMPLATES_LIST => to_result(&ListResourceTemplatesResult::new(
                self.core.resources.templates().await,
            )),
            methods::RESOURCES_READ => {
                let params: ReadResourceParams = parse_params(method, params)?;
                let resource = self
                    .core
                    .resources
                    .get(&params.uri)
                    .await
                    .ok_or_else(|| McpError::ResourceNotFound(params.uri.clone()))?;
                let contents = resource.read(ctx, params).await?;
                to_result(&ReadResourceResult::single(contents))
            }
            methods::RESOURCES_SUBSCRIBE => {
                let params: SubscribeParams = parse_params(method, params)?;
                if self.core.resources.get(&params.uri).await.is_none() {
                    return Err(McpError::ResourceNotFound(params.uri));
                }
                let token = Self::session_token(ctx)?;
                let rx = self.core.subscriptions.subscribe(&params.uri, &token).await;
                Arc::clone(&self.core).spawn_subscription_forwarder(params.uri, token, rx);
                Ok(json!({}))
            }
            methods::RESOURCES_UNSUBSCRIBE => {
                let params: UnsubscribeParams = parse_params(method, params)?;
                let token = Self::session_token(ctx)?;
                // O(1) removal by (uri, token); absent subscriptions still
                // acknowledge with success.
                self.core
                    .subscriptions
                    .unsubscribe(&params.uri, &token)
                    .await;
                Ok(json!({}))
            }
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![
            methods::RESOURCES_LIST.to_string(),
            methods::RESOURCES_READ.to_string(),
            methods::RESOURCES_TEMPLATES_LIST.to_string(),
            methods::RESOURCES_SUBSCRIBE.to_string(),
            methods::RESOURCES_UNSUBSCRIBE.to_string(),
        ]
    }
}

/// Handles `prompts/list` and `prompts/get`.
pub struct PromptsHandler {
    core: Arc<ServerCore>,
}

impl PromptsHandler {
    pub fn new(core: Arc<ServerCore>) -> Self {
        Self { core }
    }
}

#[async_trait]
impl JsonRpcHandler for PromptsHandler {
    type Error = McpError;

    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        ctx: &RequestContext,
    ) -> Result<Value, Self::Error> {
        self.core.require_initialized(ctx, method).await?;

        match method {
            methods::PROMPTS_LIST => to_result(&ListPromptsResult::new(
                self.core.prompts.descriptors().await,
            )),
            methods::PROMPTS_GET => {
                let params: GetPromptParams = parse_params(method, params)?;
                let prompt = self
                    .core
                    .prompts
                    .get(&params.name)
                    .await
                    .ok_or_else(|| McpError::PromptNotFound(params.name.clone()))?;
                let result = prompt.generate(ctx, params).await?;
                to_result(&result)
            }
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![
            methods::PROMPTS_LIST.to_string(),
            methods::PROMPTS_GET.to_string(),
        ]
    }
}

/// Handles `completion/complete`.
pub struct CompletionHandler {
    core: Arc<ServerCore>,
}

impl CompletionHandler {
    pub fn new(core: Arc<ServerCore>) -> Self {
        Self { core }
    }
}

#[async_trait]
impl JsonRpcHandler for CompletionHandler {
    type Error = McpError;

    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        ctx: &RequestContext,
    ) -> Result<Value, Self::Error> {
        self.core.require_initialized(ctx, method).await?;

        let provider = self
            .core
            .completion
            .as_ref()
            .ok_or_else(|| McpError::CapabilityDisabled("completions".to_string()))?;
        let params: CompleteParams = parse_params(method, params)?;
        let result = provider.complete(ctx, params).await?;
        to_result(&result)
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::COMPLETION_COMPLETE.to_string()]
    }
}

/// Handles `logging/setLevel`.
pub struct LoggingHandler {
    core: Arc<ServerCore>,
}

impl LoggingHandler {
    pub fn new(core: Arc<ServerCore>) -> Self {
        Self { core }
    }
}

#[async_trait]
impl JsonRpcHandler for LoggingHandler {
    type Error = McpError;

    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        ctx: &RequestContext,
    ) -> Result<Value, Self::Error> {
        if !self.core.logging_enabled {
            return Err(McpError::CapabilityDisabled("logging".to_string()));
        }

        let params: SetLevelParams = parse_params(method, params)?;
        if let Some(session) = &ctx.session {
            session
                .set_value(LOG_LEVEL_KEY, json!(params.level))
                .await
                .map_err(|e| McpError::session(e.to_string()))?;
            info!(session_id = %session.session_id(), level = %params.level,
                  "Session log level updated");
        }
        Ok(json!({}))
    }

    fn supported_methods(&self) -> Vec<String> {
        vec![methods::LOGGING_SET_LEVEL.to_string()]
    }
}

/// Register every protocol handler with a dispatcher.
pub fn register_protocol_handlers(
    dispatcher: &mut relay_mcp_json_rpc::JsonRpcDispatcher<McpError>,
    core: Arc<ServerCore>,
) {
    dispatcher.register_handler_arc(Arc::new(InitializeHandler::new(Arc::clone(&core))));
    dispatcher.register_handler_arc(Arc::new(InitializedNotificationHandler::new(Arc::clone(
        &core,
    ))));
    dispatcher.register_handler_arc(Arc::new(PingHandler));
    dispatcher.register_handler_arc(Arc::new(ToolsHandler::new(Arc::clone(&core))));
    dispatcher.register_handler_arc(Arc::new(ResourcesHandler::new(Arc::clone(&core))));
    dispatcher.register_handler_arc(Arc::new(PromptsHandler::new(Arc::clone(&core))));
    dispatcher.register_handler_arc(Arc::new(CompletionHandler::new(Arc::clone(&core))));
    dispatcher.register_handler_arc(Arc::new(LoggingHandler::new(core)));
}
