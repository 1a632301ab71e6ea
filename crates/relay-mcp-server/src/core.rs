//! Shared server state reachable from request handlers.
//!
//! Handlers receive an `Arc<ServerCore>` through the call context's server
//! slot, giving them capability computation, lifecycle checks, subscription
//! fan-out, and session-wide broadcast without ambient globals.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use relay_http_mcp_server::{GetSseSink, StreamManager};
use relay_mcp_json_rpc::{JsonRpcNotification, NotificationSink, RequestContext};
use relay_mcp_protocol::{
    CompletionsCapability, Implementation, LoggingCapability, McpError, McpResult,
    PromptsCapability, ResourcesCapability, ServerCapabilities, ToolsCapability,
};
use relay_mcp_session::{InMemorySessionStore, LifecycleState};

use crate::prompt::PromptRegistry;
use crate::resource::ResourceRegistry;
use crate::subscriptions::SubscriptionManager;
use crate::tool::ToolRegistry;
use crate::McpCompletion;

/// Everything the protocol handlers share.
pub struct ServerCore {
    pub info: Implementation,
    pub instructions: Option<String>,
    pub tools: ToolRegistry,
    pub resources: ResourceRegistry,
    pub prompts: PromptRegistry,
    pub subscriptions: SubscriptionManager,
    pub completion: Option<Arc<dyn McpCompletion>>,
    pub sessions: Arc<InMemorySessionStore>,
    pub stream_manager: Arc<StreamManager>,
    pub logging_enabled: bool,
    pub experimental: Option<HashMap<String, Value>>,
    pub stateless: bool,
}

impl ServerCore {
    /// Compute the advertised capabilities: tools are always advertised;
    /// resources and prompts only when at least one is registered; logging
    /// and completions when enabled; the experimental map is preserved.
    pub async fn capabilities(&self) -> ServerCapabilities {
        ServerCapabilities {
            tools: Some(ToolsCapability {
                list_changed: Some(true),
            }),
            resources: if self.resources.is_empty().await {
                None
            } else {
                Some(ResourcesCapability {
                    subscribe: Some(true),
                    list_changed: Some(true),
                })
            },
            prompts: if self.prompts.is_empty().await {
                None
            } else {
                Some(PromptsCapability {
                    list_changed: Some(true),
                })
            },
            logging: self.logging_enabled.then(LoggingCapability::default),
            completions: self
                .completion
                .is_some()
                .then(CompletionsCapability::default),
            experimental: self.experimental.clone(),
        }
    }

    /// Guard for methods permitted only in the `Initialized` state.
    ///
    /// Stateless servers have no handshake to track, so every ephemeral
    /// session passes.
    pub async fn require_initialized(&self, ctx: &RequestContext, method: &str) -> McpResult<()> {
        if self.stateless {
            return Ok(());
        }
        let session_id = ctx
            .session_id()
            .ok_or_else(|| McpError::session("no session bound to this call"))?;
        match self.sessions.lifecycle(session_id).await {
            Some(LifecycleState::Initialized) => Ok(()),
            Some(LifecycleState::Terminated) => Err(McpError::SessionTerminated),
            Some(_) => Err(McpError::NotInitialized(method.to_string())),
            None => Err(McpError::session("session no longer exists")),
        }
    }

    /// Emit `notifications/resources/updated` to every subscriber of a uri.
    pub async fn notify_resource_updated(&self, uri: &str) -> usize {
        self.subscriptions.notify_update(uri).await
    }

    /// Send a notification to one session's GET-SSE channel (best-effort).
    pub async fn send_to_session(&self, session_id: &str, notification: JsonRpcNotification) {
        let sink = GetSseSink::new(Arc::clone(&self.stream_manager), session_id);
        if let Err(err) = sink.send(notification).await {
            warn!(session_id = %session_id, "Failed to deliver session notification: {}", err);
        }
    }

    /// Broadcast a notification to every live session's GET-SSE channel.
    pub async fn broadcast(&self, notification: JsonRpcNotification) {
        for session_id in self.sessions.active_ids().await {
            self.send_to_session(&session_id, notification.clone()).await;
        }
    }

    /// Start the forwarder that drains one subscriber channel into the
    /// session's GET-SSE connection. Ends when the channel closes
    /// (unsubscribe) or the session disappears.
    pub fn spawn_subscription_forwarder(
        self: Arc<Self>,
        uri: String,
        session_id: String,
        mut rx: tokio::sync::mpsc::Receiver<JsonRpcNotification>,
    ) {
        let core = self;
        tokio::spawn(async move {
            while let Some(notification) = rx.recv().await {
                if !core.sessions.contains(&session_id).await {
                    debug!(session_id = %session_id, uri = %uri,
                           "Session gone, ending subscription forwarder");
                    core.subscriptions.unsubscribe(&uri, &session_id).await;
                    break;
                }
                core.send_to_session(&session_id, notification).await;
            }
        });
    }
}
