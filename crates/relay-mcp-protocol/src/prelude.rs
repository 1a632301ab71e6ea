//! Convenience re-exports for downstream crates.

pub use crate::completion::{
    CompleteParams, CompleteResult, CompletionArgument, CompletionReference, CompletionValues,
};
pub use crate::content::{ResourceContents, ToolContent};
pub use crate::initialize::{
    ClientCapabilities, CompletionsCapability, Implementation, InitializeParams, InitializeResult,
    LoggingCapability, PromptsCapability, ResourcesCapability, ServerCapabilities, ToolsCapability,
};
pub use crate::logging::{LoggingLevel, SetLevelParams};
pub use crate::methods;
pub use crate::notifications::{
    logging_message_notification, progress_notification, resource_updated_notification,
    stream_resumed_notification, LoggingMessageParams, ProgressParams, ResourceUpdatedParams,
    StreamResumedParams,
};
pub use crate::prompts::{
    GetPromptParams, GetPromptResult, ListPromptsResult, Prompt, PromptArgument, PromptMessage,
    Role,
};
pub use crate::resources::{
    ListResourceTemplatesResult, ListResourcesResult, ReadResourceParams, ReadResourceResult,
    Resource, ResourceTemplate, SubscribeParams, UnsubscribeParams,
};
pub use crate::sink_ext::NotificationSinkExt;
pub use crate::tools::{CallToolParams, CallToolResult, ListToolsResult, Tool};
pub use crate::version::{ProtocolVersion, SUPPORTED_VERSIONS};
pub use crate::{McpError, McpResult};
