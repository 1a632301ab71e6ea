//! Tool trait and registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use relay_mcp_json_rpc::RequestContext;
use relay_mcp_protocol::{CallToolParams, CallToolResult, McpError, McpResult, Tool};

/// High-level trait for implementing MCP tools.
///
/// From the context a tool can reach the session handle, the notification
/// sink for progress events, and the server handle for broadcasts.
#[async_trait]
pub trait McpTool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    /// JSON Schema for the tool's arguments
    fn input_schema(&self) -> Value;

    /// Execute the tool.
    ///
    /// Returning `Ok` with `is_error: true` reports a tool-shaped failure to
    /// the caller; returning `Err` surfaces as a JSON-RPC internal error.
    async fn call(&self, ctx: &RequestContext, params: CallToolParams)
        -> McpResult<CallToolResult>;

    /// Protocol descriptor for `tools/list`
    fn descriptor(&self) -> Tool {
        let mut tool = Tool::new(self.name(), self.input_schema());
        if let Some(description) = self.description() {
            tool = tool.with_description(description);
        }
        tool
    }
}

/// Name-keyed tool registry. Registration rejects duplicates; replacement is
/// an explicit update.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn McpTool>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, tool: Arc<dyn McpTool>) -> McpResult<()> {
        let mut tools = self.tools.write().await;
        let name = tool.name().to_string();
        if tools.contains_key(&name) {
            return Err(McpError::AlreadyRegistered(name));
        }
        tools.insert(name, tool);
        Ok(())
    }

    /// Replace an existing tool. Unlike `register`, the name must already be
    /// present.
    pub async fn update(&self, tool: Arc<dyn McpTool>) -> McpResult<()> {
        let mut tools = self.tools.write().await;
        let name = tool.name().to_string();
        if !tools.contains_key(&name) {
            return Err(McpError::ToolNotFound(name));
        }
        tools.insert(name, tool);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn McpTool>> {
        self.tools.read().await.get(name).cloned()
    }

    pub async fn descriptors(&self) -> Vec<Tool> {
        let tools = self.tools.read().await;
        let mut descriptors: Vec<Tool> = tools.values().map(|t| t.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub async fn is_empty(&self) -> bool {
        self.tools.read().await.is_empty()
    }

    pub async fn len(&self) -> usize {
        self.tools.read().await.len()
    }
}
