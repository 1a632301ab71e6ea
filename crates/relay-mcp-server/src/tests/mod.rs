//! Protocol-layer end-to-end tests over a bound server.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use relay_mcp_json_rpc::RequestContext;
use relay_mcp_protocol::{
    CallToolParams, CallToolResult, GetPromptParams, GetPromptResult, McpResult,
    NotificationSinkExt, PromptMessage, ReadResourceParams, ResourceContents,
};

use crate::{McpPrompt, McpResource, McpServer, McpTool};

struct EchoTool;

#[async_trait]
impl McpTool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> Option<&str> {
        Some("Echo back the input text")
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {"text": {"type": "string"}},
               "required": ["text"]})
    }

    async fn call(
        &self,
        _ctx: &RequestContext,
        params: CallToolParams,
    ) -> McpResult<CallToolResult> {
        let text = params
            .arguments
            .as_ref()
            .and_then(|a| a.get("text"))
            .and_then(|v| v.as_str())
            .unwrap_or("No text provided");
        Ok(CallToolResult::from_text(format!("Echo: {}", text)))
    }
}

struct SlowTool;

#[async_trait]
impl McpTool for SlowTool {
    fn name(&self) -> &str {
        "slow"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn call(
        &self,
        ctx: &RequestContext,
        _params: CallToolParams,
    ) -> McpResult<CallToolResult> {
        ctx.sink.send_progress(0.5, "half").await.ok();
        ctx.sink.send_progress(1.0, "done").await.ok();
        Ok(CallToolResult::from_text("ok"))
    }
}

struct FailingTool;

#[async_trait]
impl McpTool for FailingTool {
    fn name(&self) -> &str {
        "failing"
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object"})
    }

    async fn call(
        &self,
        _ctx: &RequestContext,
        _params: CallToolParams,
    ) -> McpResult<CallToolResult> {
        Err(relay_mcp_protocol::McpError::tool_execution("it broke"))
    }
}

struct ReadmeResource;

#[async_trait]
impl McpResource for ReadmeResource {
    fn uri(&self) -> &str {
        "file:///readme"
    }

    fn name(&self) -> &str {
        "readme"
    }

    fn mime_type(&self) -> Option<&str> {
        Some("text/plain")
    }

    async fn read(
        &self,
        _ctx: &RequestContext,
        _params: ReadResourceParams,
    ) -> McpResult<ResourceContents> {
        Ok(ResourceContents::text("file:///readme", "Hello from the readme")
            .with_mime_type("text/plain"))
    }
}

struct GreetingPrompt;

#[async_trait]
impl McpPrompt for GreetingPrompt {
    fn name(&self) -> &str {
        "greeting"
    }

    async fn generate(
        &self,
        _ctx: &RequestContext,
        params: GetPromptParams,
    ) -> McpResult<GetPromptResult> {
        let name = params
            .arguments
            .as_ref()
            .and_then(|a| a.get("name"))
            .and_then(|v| v.as_str())
            .unwrap_or("world");
        Ok(GetPromptResult::new(vec![PromptMessage::user_text(format!(
            "Hello, {}!",
            name
        ))]))
    }
}

async fn spawn_full_server() -> (String, McpServer) {
    let server = McpServer::builder()
        .name("test-server")
        .version("0.1.0")
        .bind_address("127.0.0.1:0".parse().unwrap())
        .tool(EchoTool)
        .tool(SlowTool)
        .tool(FailingTool)
        .resource(ReadmeResource)
        .prompt(GreetingPrompt)
        .build()
        .await
        .unwrap();

    let (listener, addr) = server.bind().await.unwrap();
    let run_server = server.clone();
    tokio::spawn(async move {
        run_server.run_on(listener, addr).await.unwrap();
    });

    (format!("http://{}/mcp", addr), server)
}

async fn spawn_bare_server() -> (String, McpServer) {
    let server = McpServer::builder()
        .name("bare-server")
        .bind_address("127.0.0.1:0".parse().unwrap())
        .build()
        .await
        .unwrap();

    let (listener, addr) = server.bind().await.unwrap();
    let run_server = server.clone();
    tokio::spawn(async move {
        run_server.run_on(listener, addr).await.unwrap();
    });

    (format!("http://{}/mcp", addr), server)
}

async fn do_initialize(client: &reqwest::Client, url: &str) -> (String, Value) {
    let response = client
        .post(url)
        .header("Content-Type", "application/json")
        .json(&json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {"protocolVersion": "2025-03-26",
                       "clientInfo": {"name": "c", "version": "1"},
                       "capabilities": {}}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let session_id = response
        .headers()
        .get("Mcp-Session-Id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    let body: Value = response.json().await.unwrap();

    // Complete the handshake
    let response = client
        .post(url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);

    (session_id, body)
}

#[tokio::test]
async fn test_initialize_handshake_and_capabilities() {
    let (url, _server) = spawn_full_server().await;
    let client = reqwest::Client::new();

    let (_session_id, body) = do_initialize(&client, &url).await;
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["id"], 1);

    let result = &body["result"];
    assert_eq!(result["protocolVersion"], "2025-03-26");
    assert_eq!(result["serverInfo"]["name"], "test-server");

    // Tools always advertised; resources and prompts because one of each is
    // registered
    assert!(result["capabilities"]["tools"].is_object());
    assert!(result["capabilities"]["resources"].is_object());
    assert!(result["capabilities"]["prompts"].is_object());
    assert!(result["capabilities"]["logging"].is_object());
}

#[tokio::test]
async fn test_capabilities_omitted_without_registrations() {
    let (url, _server) = spawn_bare_server().await;
    let client = reqwest::Client::new();

    let (_session_id, body) = do_initialize(&client, &url).await;
    let caps = &body["result"]["capabilities"];
    assert!(caps["tools"].is_object());
    assert!(caps.get("resources").is_none() || caps["resources"].is_null());
    assert!(caps.get("prompts").is_none() || caps["prompts"].is_null());
}

#[tokio::test]
async fn test_unknown_protocol_version_falls_back() {
    let (url, _server) = spawn_full_server().await;
    let client = reqwest::Client::new();

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {"protocolVersion": "2030-01-01",
                       "clientInfo": {"name": "c", "version": "1"},
                       "capabilities": {}}
        }))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["protocolVersion"], "2025-03-26");
}

#[tokio::test]
async fn test_guarded_method_requires_initialized_lifecycle() {
    let (url, _server) = spawn_full_server().await;
    let client = reqwest::Client::new();

    // Initialize but skip notifications/initialized
    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {"protocolVersion": "2025-03-26",
                       "clientInfo": {"name": "c", "version": "1"},
                       "capabilities": {}}
        }))
        .send()
        .await
        .unwrap();
    let session_id = response
        .headers()
        .get("Mcp-Session-Id")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("not initialized"));
}

#[tokio::test]
async fn test_tools_list_and_call() {
    let (url, _server) = spawn_full_server().await;
    let client = reqwest::Client::new();
    let (session_id, _) = do_initialize(&client, &url).await;

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let tools = body["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 3);
    assert!(tools.iter().any(|t| t["name"] == "echo"));

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Accept", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                      "params": {"name": "echo", "arguments": {"text": "hi"}}}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"jsonrpc": "2.0", "id": 3,
               "result": {"content": [{"type": "text", "text": "Echo: hi"}]}})
    );
}

#[tokio::test]
async fn test_tool_call_streaming_progress() {
    let (url, _server) = spawn_full_server().await;
    let client = reqwest::Client::new();
    let (session_id, _) = do_initialize(&client, &url).await;

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Accept", "application/json, text/event-stream")
        .header("Prefer", "respond-async")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                      "params": {"name": "slow", "arguments": {}}}))
        .send()
        .await
        .unwrap();

    let body = response.text().await.unwrap();
    let events: Vec<&str> = body
        .split("\n\n")
        .filter(|b| !b.trim().is_empty())
        .collect();
    assert_eq!(events.len(), 3);
    assert!(events[0].contains("notifications/progress"));
    assert!(events[0].contains("\"progress\":0.5"));
    assert!(events[1].contains("\"progress\":1.0"));
    assert!(events[2].contains("\"text\":\"ok\""));
}

#[tokio::test]
async fn test_failing_tool_maps_to_internal_error() {
    let (url, _server) = spawn_full_server().await;
    let client = reqwest::Client::new();
    let (session_id, _) = do_initialize(&client, &url).await;

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call",
                      "params": {"name": "failing", "arguments": {}}}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32603);
}

#[tokio::test]
async fn test_unknown_tool_is_reported() {
    let (url, _server) = spawn_full_server().await;
    let client = reqwest::Client::new();
    let (session_id, _) = do_initialize(&client, &url).await;

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call",
                      "params": {"name": "ghost"}}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Tool not found"));
}

#[tokio::test]
async fn test_resources_read() {
    let (url, _server) = spawn_full_server().await;
    let client = reqwest::Client::new();
    let (session_id, _) = do_initialize(&client, &url).await;

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 7, "method": "resources/read",
                      "params": {"uri": "file:///readme"}}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let contents = &body["result"]["contents"][0];
    assert_eq!(contents["uri"], "file:///readme");
    assert_eq!(contents["text"], "Hello from the readme");
    assert_eq!(contents["mimeType"], "text/plain");
}

#[tokio::test]
async fn test_prompts_get() {
    let (url, _server) = spawn_full_server().await;
    let client = reqwest::Client::new();
    let (session_id, _) = do_initialize(&client, &url).await;

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 8, "method": "prompts/get",
                      "params": {"name": "greeting", "arguments": {"name": "relay"}}}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    let message = &body["result"]["messages"][0];
    assert_eq!(message["role"], "user");
    assert_eq!(message["content"]["text"], "Hello, relay!");
}

#[tokio::test]
async fn test_unknown_method() {
    let (url, _server) = spawn_full_server().await;
    let client = reqwest::Client::new();
    let (session_id, _) = do_initialize(&client, &url).await;

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 9, "method": "no/such/method"}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], 9);
    assert_eq!(body["error"]["code"], -32601);
}

#[tokio::test]
async fn test_logging_set_level_persists_on_session() {
    let (url, server) = spawn_full_server().await;
    let client = reqwest::Client::new();
    let (session_id, _) = do_initialize(&client, &url).await;

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 10, "method": "logging/setLevel",
                      "params": {"level": "warning"}}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert!(body.get("error").is_none());

    let stored = server
        .core()
        .sessions
        .get_state(&session_id, crate::handlers::LOG_LEVEL_KEY)
        .await;
    assert_eq!(stored, Some(json!("warning")));
}

#[tokio::test]
async fn test_subscription_fan_out_to_get_sse() {
    let (url, server) = spawn_full_server().await;
    let client = reqwest::Client::new();
    let (session_id, _) = do_initialize(&client, &url).await;

    // Open the GET-SSE channel
    let get_response = client
        .get(&url)
        .header("Accept", "text/event-stream")
        .header("Mcp-Session-Id", &session_id)
        .send()
        .await
        .unwrap();
    assert_eq!(get_response.status(), 200);

    // Subscribe to the resource
    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 11, "method": "resources/subscribe",
                      "params": {"uri": "file:///readme"}}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert!(body.get("error").is_none());

    // Wait for the GET connection to register, then trigger an update
    let core = Arc::clone(server.core());
    let sid = session_id.clone();
    tokio::spawn(async move {
        for _ in 0..50 {
            if core.stream_manager.has_connection(&sid).await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        core.notify_resource_updated("file:///readme").await;
    });

    let mut stream = get_response.bytes_stream();
    let frame = tokio::time::timeout(Duration::from_secs(3), stream.next())
        .await
        .expect("resource update within deadline")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(frame.to_vec()).unwrap();
    assert!(text.contains("notifications/resources/updated"));
    assert!(text.contains("file:///readme"));
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let (url, server) = spawn_full_server().await;
    let client = reqwest::Client::new();
    let (session_id, _) = do_initialize(&client, &url).await;

    client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 12, "method": "resources/subscribe",
                      "params": {"uri": "file:///readme"}}))
        .send()
        .await
        .unwrap();
    assert_eq!(
        server.core().subscriptions.subscriber_count("file:///readme").await,
        1
    );

    // Unsubscribe acknowledges and removes the channel
    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 13, "method": "resources/unsubscribe",
                      "params": {"uri": "file:///readme"}}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert!(body.get("error").is_none());
    assert_eq!(
        server.core().subscriptions.subscriber_count("file:///readme").await,
        0
    );

    // Unsubscribing again still succeeds
    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 14, "method": "resources/unsubscribe",
                      "params": {"uri": "file:///readme"}}))
        .send()
        .await
        .unwrap();
    let body: Value = response.json().await.unwrap();
    assert!(body.get("error").is_none());
}
