//! The typed MCP client.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use relay_mcp_json_rpc::{JsonRpcNotification, RequestId};
use relay_mcp_protocol::{
    methods, CallToolParams, CallToolResult, CompleteParams, CompleteResult, GetPromptParams,
    GetPromptResult, InitializeParams, InitializeResult, ListPromptsResult,
    ListResourceTemplatesResult, ListResourcesResult, ListToolsResult, LoggingLevel,
    ReadResourceParams, ReadResourceResult, SetLevelParams,
};

use crate::config::ClientConfig;
use crate::error::{McpClientError, Result};
use crate::transport::{DeleteOutcome, HttpTransport, PostOutcome, SseStream};

/// Handler for server-originated notifications, registered by method name.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, notification: JsonRpcNotification);
}

type HandlerRegistry = Arc<RwLock<HashMap<String, Arc<dyn NotificationHandler>>>>;

/// MCP client over the Streamable HTTP transport.
pub struct McpClient {
    config: ClientConfig,
    transport: Arc<HttpTransport>,
    handlers: HandlerRegistry,
    request_counter: AtomicI64,
    initialized: AtomicBool,
    get_sse_cancel: parking_lot::Mutex<Option<CancellationToken>>,
}

impl McpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self {
            config,
            transport,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            request_counter: AtomicI64::new(1),
            initialized: AtomicBool::new(false),
            get_sse_cancel: parking_lot::Mutex::new(None),
        })
    }

    /// The session id, if a stateful server handed one out.
    pub fn session_id(&self) -> Option<String> {
        self.transport.session_id()
    }

    /// Whether the server was detected as stateless on initialize.
    pub fn is_stateless(&self) -> bool {
        self.transport.is_stateless()
    }

    /// The most recently observed SSE event id.
    pub fn last_event_id(&self) -> Option<String> {
        self.transport.last_event_id()
    }

    /// Register a handler for a notification method. Registration may race
    /// with delivery; the latest registration wins.
    pub fn register_notification_handler<H>(&self, method: impl Into<String>, handler: H)
    where
        H: NotificationHandler + 'static,
    {
        self.handlers.write().insert(method.into(), Arc::new(handler));
    }

    pub fn unregister_notification_handler(&self, method: &str) {
        self.handlers.write().remove(method);
    }

    // ------------------------------------------------------------------
    // Request plumbing
    // ------------------------------------------------------------------

    fn next_id(&self) -> RequestId {
        RequestId::Number(self.request_counter.fetch_add(1, Ordering::SeqCst))
    }

    /// Send a request and wait for the matching response on whichever shape
    /// the server picked. Responses with a different id are stale output
    /// from another in-flight request and never complete this wait.
    async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let id = self.next_id();
        let mut body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
        });
        if let Some(params) = params {
            body["params"] = params;
        }

        debug!(method = %method, id = %id, "Sending request");
        match self.transport.post(&body).await? {
            PostOutcome::Json(value) => self.take_matching_response(&id, value),
            PostOutcome::Stream(stream) => self.drain_stream_until_response(&id, stream).await,
            PostOutcome::Accepted => Err(McpClientError::protocol(
                "server answered a request with 202 Accepted",
            )),
        }
    }

    fn take_matching_response(&self, id: &RequestId, value: Value) -> Result<Value> {
        let expected = serde_json::to_value(id)?;
        if value.get("id") != Some(&expected) {
            return Err(McpClientError::protocol(format!(
                "response id {:?} does not match request id {}",
                value.get("id"),
                id
            )));
        }
        if let Some(error) = value.get("error") {
            let error_object = serde_json::from_value(error.clone())?;
            return Err(McpClientError::Rpc(error_object));
        }
        value
            .get("result")
            .cloned()
            .ok_or_else(|| McpClientError::protocol("response carries neither result nor error"))
    }

    /// Read SSE events: notifications go to the registered handlers; the
    /// first response whose id matches completes the call; anything else is
    /// logged and ignored.
    async fn drain_stream_until_response(
        &self,
        id: &RequestId,
        mut stream: SseStream,
    ) -> Result<Value> {
        let expected = serde_json::to_value(id)?;

        while let Some(event) = stream.next_event().await {
            let event = event?;
            let value: Value = match serde_json::from_str(&event.data) {
                Ok(value) => value,
                Err(err) => {
                    warn!("Discarding unparseable SSE event: {}", err);
                    continue;
                }
            };

            if value.get("method").is_some() {
                dispatch_notification(&self.handlers, value).await;
                continue;
            }

            match value.get("id") {
                Some(actual) if *actual == expected => {
                    if let Some(error) = value.get("error") {
                        let error_object = serde_json::from_value(error.clone())?;
                        return Err(McpClientError::Rpc(error_object));
                    }
                    return value.get("result").cloned().ok_or_else(|| {
                        McpClientError::protocol("terminal event carries neither result nor error")
                    });
                }
                other => {
                    debug!(id = ?other, "Ignoring response with non-matching id");
                }
            }
        }

        Err(McpClientError::transport(
            "stream ended without the final response",
        ))
    }

    /// Send a notification; the server answers `202 Accepted`.
    async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let mut body = json!({"jsonrpc": "2.0", "method": method});
        if let Some(params) = params {
            body["params"] = params;
        }

        match self.transport.post(&body).await? {
            PostOutcome::Accepted => Ok(()),
            PostOutcome::Json(_) | PostOutcome::Stream(_) => Err(McpClientError::protocol(
                "server answered a notification with a body",
            )),
        }
    }

    // ------------------------------------------------------------------
    // Protocol surface
    // ------------------------------------------------------------------

    /// Run the initialize handshake.
    ///
    /// Detects stateless servers by the absent `Mcp-Session-Id` header,
    /// sends `notifications/initialized`, and opens the GET-SSE channel when
    /// enabled and the server is stateful.
    pub async fn initialize(&self) -> Result<InitializeResult> {
        let params = InitializeParams {
            protocol_version: self.config.protocol_version.as_str().to_string(),
            client_info: self.config.client_info.clone(),
            capabilities: Default::default(),
        };
        let result = self
            .request(methods::INITIALIZE, Some(serde_json::to_value(&params)?))
            .await?;
        let result: InitializeResult = serde_json::from_value(result)?;

        if self.transport.session_id().is_none() {
            info!("Server omitted the session header; switching to stateless mode");
            self.transport.mark_stateless();
        }

        self.notify(methods::NOTIFICATIONS_INITIALIZED, None).await?;
        self.initialized.store(true, Ordering::SeqCst);
        info!(version = %result.protocol_version, server = %result.server_info.name,
              "Initialized against server");

        if self.config.get_sse_enabled && !self.is_stateless() {
            self.open_notification_stream();
        }

        Ok(result)
    }

    pub async fn ping(&self) -> Result<()> {
        self.request(methods::PING, None).await.map(|_| ())
    }

    pub async fn list_tools(&self) -> Result<ListToolsResult> {
        let result = self.request(methods::TOOLS_LIST, None).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn call_tool(&self, name: &str, arguments: Option<Value>) -> Result<CallToolResult> {
        let mut params = CallToolParams::new(name);
        if let Some(arguments) = arguments {
            params = params.with_arguments(arguments);
        }
        let result = self
            .request(methods::TOOLS_CALL, Some(serde_json::to_value(&params)?))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn list_resources(&self) -> Result<ListResourcesResult> {
        let result = self.request(methods::RESOURCES_LIST, None).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn read_resource(&self, uri: &str) -> Result<ReadResourceResult> {
        let params = ReadResourceParams::new(uri);
        let result = self
            .request(methods::RESOURCES_READ, Some(serde_json::to_value(&params)?))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn list_resource_templates(&self) -> Result<ListResourceTemplatesResult> {
        let result = self.request(methods::RESOURCES_TEMPLATES_LIST, None).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn subscribe_resource(&self, uri: &str) -> Result<()> {
        self.request(
            methods::RESOURCES_SUBSCRIBE,
            Some(json!({"uri": uri})),
        )
        .await
        .map(|_| ())
    }

    pub async fn unsubscribe_resource(&self, uri: &str) -> Result<()> {
        self.request(
            methods::RESOURCES_UNSUBSCRIBE,
            Some(json!({"uri": uri})),
        )
        .await
        .map(|_| ())
    }

    pub async fn list_prompts(&self) -> Result<ListPromptsResult> {
        let result = self.request(methods::PROMPTS_LIST, None).await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn get_prompt(
        &self,
        name: &str,
        arguments: Option<HashMap<String, Value>>,
    ) -> Result<GetPromptResult> {
        let mut params = GetPromptParams::new(name);
        params.arguments = arguments;
        let result = self
            .request(methods::PROMPTS_GET, Some(serde_json::to_value(&params)?))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn complete(&self, params: CompleteParams) -> Result<CompleteResult> {
        let result = self
            .request(
                methods::COMPLETION_COMPLETE,
                Some(serde_json::to_value(&params)?),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn set_log_level(&self, level: LoggingLevel) -> Result<()> {
        let params = SetLevelParams { level };
        self.request(
            methods::LOGGING_SET_LEVEL,
            Some(serde_json::to_value(&params)?),
        )
        .await
        .map(|_| ())
    }

    // ------------------------------------------------------------------
    // GET-SSE
    // ------------------------------------------------------------------

    /// Open (or replace) the long-lived notification channel. The loop
    /// reconnects with `Last-Event-ID` after a disconnect and only accepts
    /// notifications; response frames are logged and dropped.
    pub fn open_notification_stream(&self) {
        if self.is_stateless() {
            warn!("GET-SSE requested on a stateless server; ignoring");
            return;
        }

        let cancel = CancellationToken::new();
        if let Some(previous) = self.get_sse_cancel.lock().replace(cancel.clone()) {
            previous.cancel();
        }

        let transport = Arc::clone(&self.transport);
        let handlers = Arc::clone(&self.handlers);
        let reconnect_delay = self.config.reconnect_delay;

        tokio::spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    return;
                }

                let mut stream = match transport.open_get_stream().await {
                    Ok(stream) => {
                        debug!("GET-SSE channel open");
                        stream
                    }
                    Err(err) => {
                        warn!("GET-SSE connect failed: {}", err);
                        tokio::select! {
                            _ = tokio::time::sleep(reconnect_delay) => continue,
                            _ = cancel.cancelled() => return,
                        }
                    }
                };

                loop {
                    let event = tokio::select! {
                        event = stream.next_event() => event,
                        _ = cancel.cancelled() => return,
                    };
                    match event {
                        Some(Ok(event)) => {
                            let value: Value = match serde_json::from_str(&event.data) {
                                Ok(value) => value,
                                Err(err) => {
                                    warn!("Discarding unparseable GET-SSE event: {}", err);
                                    continue;
                                }
                            };
                            if value.get("method").is_some() {
                                dispatch_notification(&handlers, value).await;
                            } else {
                                // Only notifications are accepted here
                                debug!("Ignoring non-notification frame on GET-SSE channel");
                            }
                        }
                        Some(Err(err)) => {
                            warn!("GET-SSE read error: {}", err);
                            break;
                        }
                        None => {
                            debug!("GET-SSE stream closed, reconnecting");
                            break;
                        }
                    }
                }

                tokio::select! {
                    _ = tokio::time::sleep(reconnect_delay) => {}
                    _ = cancel.cancelled() => return,
                }
            }
        });
    }

    /// Stop the GET-SSE loop without terminating the session.
    pub fn close_notification_stream(&self) {
        if let Some(cancel) = self.get_sse_cancel.lock().take() {
            cancel.cancel();
        }
    }

    /// Explicitly terminate the session via DELETE. `405` is tolerated as
    /// "server does not support explicit termination".
    pub async fn terminate(&self) -> Result<()> {
        self.close_notification_stream();

        if self.is_stateless() || self.session_id().is_none() {
            return Ok(());
        }

        match self.transport.delete().await? {
            DeleteOutcome::Terminated => {
                info!("Session terminated");
                Ok(())
            }
            DeleteOutcome::Unsupported => {
                debug!("Server does not support explicit termination");
                self.transport.forget_session();
                Ok(())
            }
        }
    }
}

/// Look up and invoke the handler for a notification. The registry lock is
/// released before the handler runs so register/unregister can race with
/// delivery safely.
async fn dispatch_notification(handlers: &HandlerRegistry, value: Value) {
    let notification: JsonRpcNotification = match serde_json::from_value(value) {
        Ok(notification) => notification,
        Err(err) => {
            warn!("Discarding malformed notification: {}", err);
            return;
        }
    };

    let handler = handlers.read().get(&notification.method).cloned();
    match handler {
        Some(handler) => handler.handle(notification).await,
        None => {
            debug!(method = %notification.method, "No handler for notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handler_registry_replace_and_remove() {
        let client = McpClient::new(ClientConfig::new("http://localhost:1/mcp")).unwrap();

        struct Nop;
        #[async_trait]
        impl NotificationHandler for Nop {
            async fn handle(&self, _notification: JsonRpcNotification) {}
        }

        client.register_notification_handler("notifications/message", Nop);
        assert!(client.handlers.read().contains_key("notifications/message"));

        client.register_notification_handler("notifications/message", Nop);
        assert_eq!(client.handlers.read().len(), 1);

        client.unregister_notification_handler("notifications/message");
        assert!(client.handlers.read().is_empty());
    }

    #[test]
    fn test_request_ids_are_unique() {
        let client = McpClient::new(ClientConfig::new("http://localhost:1/mcp")).unwrap();
        let first = client.next_id();
        let second = client.next_id();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_matching_response_extraction() {
        let client = McpClient::new(ClientConfig::new("http://localhost:1/mcp")).unwrap();
        let id = RequestId::Number(7);

        let ok = client
            .take_matching_response(&id, json!({"jsonrpc":"2.0","id":7,"result":{"x":1}}))
            .unwrap();
        assert_eq!(ok["x"], 1);

        // Wrong id never completes the call
        assert!(client
            .take_matching_response(&id, json!({"jsonrpc":"2.0","id":8,"result":{}}))
            .is_err());

        // Error responses surface as Rpc errors
        let err = client
            .take_matching_response(
                &id,
                json!({"jsonrpc":"2.0","id":7,"error":{"code":-32601,"message":"nope"}}),
            )
            .unwrap_err();
        assert!(matches!(err, McpClientError::Rpc(_)));
    }
}
