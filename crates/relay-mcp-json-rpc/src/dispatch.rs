//! Method-keyed dispatch of JSON-RPC requests and notifications.
//!
//! Handlers return domain errors only; the dispatcher owns the conversion to
//! protocol errors and answers `-32601` for unregistered methods.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::RequestContext;
use crate::error::JsonRpcError;
use crate::notification::{JsonRpcNotification, NotificationParams};
use crate::request::{JsonRpcRequest, RequestParams};
use crate::response::JsonRpcMessage;

/// Trait for errors that can be converted to JSON-RPC error objects
pub trait ToJsonRpcError: std::error::Error + Send + Sync + 'static {
    /// Convert this error to a JSON-RPC error object
    fn to_error_object(&self) -> crate::error::JsonRpcErrorObject;
}

/// Trait for handling JSON-RPC method calls
#[async_trait]
pub trait JsonRpcHandler: Send + Sync {
    /// The error type returned by this handler
    type Error: ToJsonRpcError;

    /// Handle a JSON-RPC method call.
    /// Returns domain errors only; the dispatcher converts to JSON-RPC errors.
    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        ctx: &RequestContext,
    ) -> Result<Value, Self::Error>;

    /// Handle a JSON-RPC notification (default does nothing)
    async fn handle_notification(
        &self,
        method: &str,
        params: Option<NotificationParams>,
        ctx: &RequestContext,
    ) -> Result<(), Self::Error> {
        let _ = (method, params, ctx);
        Ok(())
    }

    /// List supported methods (used for introspection)
    fn supported_methods(&self) -> Vec<String> {
        vec![]
    }
}

/// JSON-RPC method dispatcher with a specific domain error type
pub struct JsonRpcDispatcher<E>
where
    E: ToJsonRpcError,
{
    handlers: HashMap<String, Arc<dyn JsonRpcHandler<Error = E>>>,
    default_handler: Option<Arc<dyn JsonRpcHandler<Error = E>>>,
}

impl<E> JsonRpcDispatcher<E>
where
    E: ToJsonRpcError,
{
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            default_handler: None,
        }
    }

    /// Register a handler for a specific method
    pub fn register_method<H>(&mut self, method: impl Into<String>, handler: H)
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        self.handlers.insert(method.into(), Arc::new(handler));
    }

    /// Register a handler for multiple methods
    pub fn register_methods<H>(&mut self, methods: Vec<String>, handler: H)
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        let handler_arc = Arc::new(handler);
        for method in methods {
            self.handlers.insert(method, handler_arc.clone());
        }
    }

    /// Register an already-shared handler for its supported methods
    pub fn register_handler_arc(&mut self, handler: Arc<dyn JsonRpcHandler<Error = E>>) {
        for method in handler.supported_methods() {
            self.handlers.insert(method, handler.clone());
        }
    }

    /// Set a default handler for unregistered methods
    pub fn set_default_handler<H>(&mut self, handler: H)
    where
        H: JsonRpcHandler<Error = E> + 'static,
    {
        self.default_handler = Some(Arc::new(handler));
    }

    /// Process a JSON-RPC request and return a response
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        ctx: &RequestContext,
    ) -> JsonRpcMessage {
        let handler = self
            .handlers
            .get(&request.method)
            .or(self.default_handler.as_ref());

        match handler {
            Some(handler) => {
                match handler.handle(&request.method, request.params, ctx).await {
                    Ok(result) => JsonRpcMessage::success(request.id, result),
                    Err(domain_error) => {
                        // Convert domain error using type-safe conversion
                        let error_object = domain_error.to_error_object();
                        let rpc_error = JsonRpcError::new(Some(request.id), error_object);
                        JsonRpcMessage::error(rpc_error)
                    }
                }
            }
            None => {
                let error = JsonRpcError::method_not_found(request.id, &request.method);
                JsonRpcMessage::error(error)
            }
        }
    }

    /// Process a JSON-RPC notification.
    /// Unknown notification methods are ignored; notifications never answer.
    pub async fn handle_notification(
        &self,
        notification: JsonRpcNotification,
        ctx: &RequestContext,
    ) -> Result<(), E> {
        let handler = self
            .handlers
            .get(&notification.method)
            .or(self.default_handler.as_ref());

        match handler {
            Some(handler) => {
                handler
                    .handle_notification(&notification.method, notification.params, ctx)
                    .await
            }
            None => Ok(()),
        }
    }

    /// Get all registered methods
    pub fn registered_methods(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Whether a method has a registered handler
    pub fn has_method(&self, method: &str) -> bool {
        self.handlers.contains_key(method)
    }
}

impl<E> Default for JsonRpcDispatcher<E>
where
    E: ToJsonRpcError,
{
    fn default() -> Self {
        Self::new()
    }
}
