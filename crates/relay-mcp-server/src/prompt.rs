//! Prompt trait and registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use relay_mcp_json_rpc::RequestContext;
use relay_mcp_protocol::{
    GetPromptParams, GetPromptResult, McpError, McpResult, Prompt, PromptArgument,
};

/// High-level trait for implementing MCP prompts.
#[async_trait]
pub trait McpPrompt: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    fn arguments(&self) -> Vec<PromptArgument> {
        vec![]
    }

    /// Generate the prompt messages.
    async fn generate(
        &self,
        ctx: &RequestContext,
        params: GetPromptParams,
    ) -> McpResult<GetPromptResult>;

    /// Protocol descriptor for `prompts/list`
    fn descriptor(&self) -> Prompt {
        let mut prompt = Prompt::new(self.name());
        if let Some(description) = self.description() {
            prompt = prompt.with_description(description);
        }
        let arguments = self.arguments();
        if !arguments.is_empty() {
            prompt = prompt.with_arguments(arguments);
        }
        prompt
    }
}

/// Name-keyed prompt registry.
#[derive(Default)]
pub struct PromptRegistry {
    prompts: RwLock<HashMap<String, Arc<dyn McpPrompt>>>,
}

impl PromptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, prompt: Arc<dyn McpPrompt>) -> McpResult<()> {
        let mut prompts = self.prompts.write().await;
        let name = prompt.name().to_string();
        if prompts.contains_key(&name) {
            return Err(McpError::AlreadyRegistered(name));
        }
        prompts.insert(name, prompt);
        Ok(())
    }

    /// Replace an existing prompt.
    pub async fn update(&self, prompt: Arc<dyn McpPrompt>) -> McpResult<()> {
        let mut prompts = self.prompts.write().await;
        let name = prompt.name().to_string();
        if !prompts.contains_key(&name) {
            return Err(McpError::PromptNotFound(name));
        }
        prompts.insert(name, prompt);
        Ok(())
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn McpPrompt>> {
        self.prompts.read().await.get(name).cloned()
    }

    pub async fn descriptors(&self) -> Vec<Prompt> {
        let prompts = self.prompts.read().await;
        let mut descriptors: Vec<Prompt> = prompts.values().map(|p| p.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    pub async fn is_empty(&self) -> bool {
        self.prompts.read().await.is_empty()
    }
}
