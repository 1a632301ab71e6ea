//! Resource trait and registry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use relay_mcp_json_rpc::RequestContext;
use relay_mcp_protocol::{
    McpError, McpResult, ReadResourceParams, Resource, ResourceContents, ResourceTemplate,
};

/// High-level trait for implementing MCP resources.
#[async_trait]
pub trait McpResource: Send + Sync {
    fn uri(&self) -> &str;

    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }

    fn mime_type(&self) -> Option<&str> {
        None
    }

    /// Read the resource contents (text or base64 blob).
    async fn read(
        &self,
        ctx: &RequestContext,
        params: ReadResourceParams,
    ) -> McpResult<ResourceContents>;

    /// Protocol descriptor for `resources/list`
    fn descriptor(&self) -> Resource {
        let mut resource = Resource::new(self.uri(), self.name());
        if let Some(description) = self.description() {
            resource = resource.with_description(description);
        }
        if let Some(mime_type) = self.mime_type() {
            resource = resource.with_mime_type(mime_type);
        }
        resource
    }
}

/// Uri-keyed resource registry plus the template list.
#[derive(Default)]
pub struct ResourceRegistry {
    resources: RwLock<HashMap<String, Arc<dyn McpResource>>>,
    templates: RwLock<Vec<ResourceTemplate>>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, resource: Arc<dyn McpResource>) -> McpResult<()> {
        let mut resources = self.resources.write().await;
        let uri = resource.uri().to_string();
        if resources.contains_key(&uri) {
            return Err(McpError::AlreadyRegistered(uri));
        }
        resources.insert(uri, resource);
        Ok(())
    }

    /// Replace an existing resource.
    pub async fn update(&self, resource: Arc<dyn McpResource>) -> McpResult<()> {
        let mut resources = self.resources.write().await;
        let uri = resource.uri().to_string();
        if !resources.contains_key(&uri) {
            return Err(McpError::ResourceNotFound(uri));
        }
        resources.insert(uri, resource);
        Ok(())
    }

    pub async fn register_template(&self, template: ResourceTemplate) -> McpResult<()> {
        let mut templates = self.templates.write().await;
        if templates
            .iter()
            .any(|t| t.uri_template == template.uri_template)
        {
            return Err(McpError::AlreadyRegistered(template.uri_template));
        }
        templates.push(template);
        Ok(())
    }

    pub async fn get(&self, uri: &str) -> Option<Arc<dyn McpResource>> {
        self.resources.read().await.get(uri).cloned()
    }

    pub async fn descriptors(&self) -> Vec<Resource> {
        let resources = self.resources.read().await;
        let mut descriptors: Vec<Resource> = resources.values().map(|r| r.descriptor()).collect();
        descriptors.sort_by(|a, b| a.uri.cmp(&b.uri));
        descriptors
    }

    pub async fn templates(&self) -> Vec<ResourceTemplate> {
        self.templates.read().await.clone()
    }

    pub async fn is_empty(&self) -> bool {
        self.resources.read().await.is_empty() && self.templates.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticResource {
        uri: String,
        body: String,
    }

    #[async_trait]
    impl McpResource for StaticResource {
        fn uri(&self) -> &str {
            &self.uri
        }

        fn name(&self) -> &str {
            "static"
        }

        async fn read(
            &self,
            _ctx: &RequestContext,
            _params: ReadResourceParams,
        ) -> McpResult<ResourceContents> {
            Ok(ResourceContents::text(&self.uri, &self.body))
        }
    }

    fn resource(uri: &str) -> Arc<dyn McpResource> {
        Arc::new(StaticResource {
            uri: uri.to_string(),
            body: "data".to_string(),
        })
    }

    #[tokio::test]
    async fn test_register_and_read() {
        let registry = ResourceRegistry::new();
        registry.register(resource("file:///a")).await.unwrap();

        let found = registry.get("file:///a").await.unwrap();
        let ctx = RequestContext::detached();
        let contents = found
            .read(&ctx, ReadResourceParams::new("file:///a"))
            .await
            .unwrap();
        assert_eq!(contents.uri(), "file:///a");
    }

    #[tokio::test]
    async fn test_duplicate_uri_rejected() {
        let registry = ResourceRegistry::new();
        registry.register(resource("file:///a")).await.unwrap();
        assert!(matches!(
            registry.register(resource("file:///a")).await,
            Err(McpError::AlreadyRegistered(_))
        ));
    }

    #[tokio::test]
    async fn test_templates_counted_for_emptiness() {
        let registry = ResourceRegistry::new();
        assert!(registry.is_empty().await);

        registry
            .register_template(ResourceTemplate::new("file:///{path}", "files"))
            .await
            .unwrap();
        assert!(!registry.is_empty().await);
        assert_eq!(registry.templates().await.len(), 1);
    }
}
