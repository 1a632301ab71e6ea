//! End-to-end transport tests over a real bound listener.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{json, Value};

use relay_mcp_json_rpc::{
    JsonRpcHandler, NotificationParams, RequestContext, RequestParams,
};
use relay_mcp_protocol::{methods, LoggingLevel, McpError, NotificationSinkExt};

use crate::server::{HttpMcpServer, ServerConfig};
use crate::responder::ResponseMode;

/// Test handler: echoes params, streams progress, and answers initialize
/// with an empty result so the transport can create sessions.
struct TestHandler;

#[async_trait]
impl JsonRpcHandler for TestHandler {
    type Error = McpError;

    async fn handle(
        &self,
        method: &str,
        params: Option<RequestParams>,
        ctx: &RequestContext,
    ) -> Result<Value, Self::Error> {
        match method {
            methods::INITIALIZE => Ok(json!({"protocolVersion": "2025-03-26"})),
            "test/echo" => Ok(params
                .map(|p| p.to_value())
                .unwrap_or_else(|| json!({}))),
            "test/stream" => {
                ctx.sink.send_progress(0.5, "half").await.ok();
                ctx.sink.send_progress(1.0, "done").await.ok();
                ctx.sink
                    .send_log(LoggingLevel::Info, "stream finished")
                    .await
                    .ok();
                Ok(json!({"ok": true}))
            }
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }

    async fn handle_notification(
        &self,
        _method: &str,
        _params: Option<NotificationParams>,
        _ctx: &RequestContext,
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}

async fn spawn_server(mut config: ServerConfig) -> (String, HttpMcpServer) {
    config.bind_address = "127.0.0.1:0".parse().unwrap();
    let method_names: Vec<String> = vec![
        methods::INITIALIZE.to_string(),
        "test/echo".to_string(),
        "test/stream".to_string(),
        methods::NOTIFICATIONS_INITIALIZED.to_string(),
    ];
    let server = HttpMcpServer::builder()
        .config(config)
        .bind_address("127.0.0.1:0".parse().unwrap())
        .register_handler(method_names, TestHandler)
        .build();

    let (listener, addr) = server.bind().await.unwrap();
    let run_server = server.clone();
    tokio::spawn(async move {
        run_server.run_on(listener, addr).await.unwrap();
    });

    (format!("http://{}/mcp", addr), server)
}

async fn initialize(client: &reqwest::Client, url: &str) -> String {
    let response = client
        .post(url)
        .header("Content-Type", "application/json")
        .header("Accept", "application/json")
        .json(&json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {"protocolVersion": "2025-03-26",
                       "clientInfo": {"name": "t", "version": "1"},
                       "capabilities": {}}
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    response
        .headers()
        .get("Mcp-Session-Id")
        .expect("stateful initialize carries the session header")
        .to_str()
        .unwrap()
        .to_string()
}

fn split_sse_events(body: &str) -> Vec<(String, Value)> {
    body.split("\n\n")
        .filter(|block| !block.trim().is_empty() && !block.starts_with(':'))
        .map(|block| {
            let mut id = String::new();
            let mut data = String::new();
            for line in block.lines() {
                if let Some(value) = line.strip_prefix("id: ") {
                    id = value.to_string();
                } else if let Some(value) = line.strip_prefix("data: ") {
                    data = value.to_string();
                }
            }
            (id, serde_json::from_str(&data).unwrap())
        })
        .collect()
}

#[tokio::test]
async fn test_initialize_creates_session_and_notification_is_accepted() {
    let (url, _server) = spawn_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();

    let session_id = initialize(&client, &url).await;
    assert!(!session_id.is_empty());

    // Follow-up notification with the session header -> 202 empty body
    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "method": "notifications/initialized"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);
    assert!(response.text().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_session_is_rejected() {
    let (url, _server) = spawn_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&json!({"jsonrpc": "2.0", "id": 3, "method": "test/echo"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn test_unknown_session_is_not_found() {
    let (url, _server) = spawn_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", "no-such-session")
        .json(&json!({"jsonrpc": "2.0", "id": 3, "method": "test/echo"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_json_request_response() {
    let (url, _server) = spawn_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();
    let session_id = initialize(&client, &url).await;

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Accept", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 2, "method": "test/echo",
                      "params": {"text": "hi"}}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["id"], 2);
    assert_eq!(body["result"]["text"], "hi");
}

#[tokio::test]
async fn test_sse_stream_orders_notifications_before_response() {
    let mut config = ServerConfig::default();
    config.default_mode = ResponseMode::Sse;
    let (url, _server) = spawn_server(config).await;
    let client = reqwest::Client::new();
    let session_id = initialize(&client, &url).await;

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Accept", "application/json, text/event-stream")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 5, "method": "test/stream"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let body = response.text().await.unwrap();
    let events = split_sse_events(&body);
    assert_eq!(events.len(), 4);

    // Progress notifications in emission order, then the terminal response
    assert_eq!(events[0].1["method"], "notifications/progress");
    assert_eq!(events[0].1["params"]["progress"], 0.5);
    assert_eq!(events[1].1["params"]["progress"], 1.0);
    assert_eq!(events[2].1["method"], "notifications/message");
    assert_eq!(events[3].1["id"], 5);
    assert_eq!(events[3].1["result"]["ok"], true);

    // Event ids are per-responder monotonic
    for (id, _) in &events {
        assert!(id.starts_with("evt-"));
    }
}

#[tokio::test]
async fn test_accept_without_event_stream_gets_json() {
    let mut config = ServerConfig::default();
    config.default_mode = ResponseMode::Sse;
    let (url, _server) = spawn_server(config).await;
    let client = reqwest::Client::new();
    let session_id = initialize(&client, &url).await;

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Accept", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 6, "method": "test/stream"}))
        .send()
        .await
        .unwrap();

    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("application/json"));
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["result"]["ok"], true);
}

#[tokio::test]
async fn test_prefer_respond_async_selects_sse() {
    let (url, _server) = spawn_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();
    let session_id = initialize(&client, &url).await;

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Accept", "application/json, text/event-stream")
        .header("Prefer", "respond-async")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 7, "method": "test/echo"}))
        .send()
        .await
        .unwrap();

    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
}

#[tokio::test]
async fn test_unknown_method_maps_to_json_rpc_error() {
    let (url, _server) = spawn_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();
    let session_id = initialize(&client, &url).await;

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 4, "method": "no/such/method"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["id"], 4);
    assert_eq!(body["error"]["code"], -32601);
}

#[tokio::test]
async fn test_wrong_content_type_is_rejected() {
    let (url, _server) = spawn_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(&url)
        .header("Content-Type", "text/plain")
        .body(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .contains("Content-Type must be application/json"));

    // A charset parameter on the right media type is accepted
    let response = client
        .post(&url)
        .header("Content-Type", "application/json; charset=utf-8")
        .body(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);
}

#[tokio::test]
async fn test_parse_error_without_id_is_bad_request() {
    let (url, _server) = spawn_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], -32700);
}

#[tokio::test]
async fn test_method_not_allowed() {
    let (url, _server) = spawn_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();

    let response = client.put(&url).body("{}").send().await.unwrap();
    assert_eq!(response.status(), 405);
    let allow = response.headers().get("allow").unwrap().to_str().unwrap();
    assert!(allow.contains("POST"));
    assert!(allow.contains("DELETE"));
}

#[tokio::test]
async fn test_delete_terminates_session() {
    let (url, _server) = spawn_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();
    let session_id = initialize(&client, &url).await;

    let response = client
        .delete(&url)
        .header("Mcp-Session-Id", &session_id)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // The old id is gone
    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 8, "method": "test/echo"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    // Deleting again is a 404
    let response = client
        .delete(&url)
        .header("Mcp-Session-Id", &session_id)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_stateless_mode_omits_session_header() {
    let mut config = ServerConfig::default();
    config.stateless = true;
    let (url, server) = spawn_server(config).await;
    let client = reqwest::Client::new();

    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {"protocolVersion": "2025-03-26",
                       "clientInfo": {"name": "t", "version": "1"},
                       "capabilities": {}}
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response.headers().get("Mcp-Session-Id").is_none());

    // Requests without any session header keep working
    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .json(&json!({"jsonrpc": "2.0", "id": 2, "method": "test/echo", "params": {}}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Ephemeral sessions do not accumulate
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(server.sessions().count().await, 0);

    // DELETE requires sessions
    let response = client.delete(&url).send().await.unwrap();
    assert_eq!(response.status(), 501);
}

#[tokio::test]
async fn test_get_sse_resume_emits_stream_resumed() {
    let (url, _server) = spawn_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();
    let session_id = initialize(&client, &url).await;

    let response = client
        .get(&url)
        .header("Accept", "text/event-stream")
        .header("Mcp-Session-Id", &session_id)
        .header("Last-Event-ID", "evt-99-7")
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));

    let mut stream = response.bytes_stream();
    let first = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("first event within deadline")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(first.to_vec()).unwrap();
    assert!(text.contains("stream/resumed"));
    assert!(text.contains("\"resumedFrom\":\"evt-99-7\""));
}

#[tokio::test]
async fn test_get_sse_delivers_server_notifications() {
    let (url, server) = spawn_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();
    let session_id = initialize(&client, &url).await;

    let response = client
        .get(&url)
        .header("Accept", "text/event-stream")
        .header("Mcp-Session-Id", &session_id)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Give the connection a moment to register, then push a notification
    // through the session's channel.
    let manager = Arc::clone(server.stream_manager());
    let sid = session_id.clone();
    tokio::spawn(async move {
        for _ in 0..50 {
            if manager.has_connection(&sid).await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let mut params = HashMap::new();
        params.insert("note".to_string(), json!("out-of-band"));
        manager
            .send_to_session(
                &sid,
                &relay_mcp_json_rpc::JsonRpcNotification::new_with_params(
                    "notifications/message",
                    params,
                ),
            )
            .await
            .unwrap();
    });

    let mut stream = response.bytes_stream();
    let first = tokio::time::timeout(Duration::from_secs(2), stream.next())
        .await
        .expect("notification within deadline")
        .unwrap()
        .unwrap();
    let text = String::from_utf8(first.to_vec()).unwrap();
    assert!(text.contains("notifications/message"));
    assert!(text.contains("out-of-band"));
}

#[tokio::test]
async fn test_get_sse_requires_session() {
    let (url, _server) = spawn_server(ServerConfig::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .get(&url)
        .header("Accept", "text/event-stream")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = client
        .get(&url)
        .header("Accept", "text/event-stream")
        .header("Mcp-Session-Id", "ghost")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

struct HangHandler {
    cancelled: Arc<tokio::sync::Notify>,
}

#[async_trait]
impl JsonRpcHandler for HangHandler {
    type Error = McpError;

    async fn handle(
        &self,
        method: &str,
        _params: Option<RequestParams>,
        ctx: &RequestContext,
    ) -> Result<Value, Self::Error> {
        match method {
            methods::INITIALIZE => Ok(json!({"protocolVersion": "2025-03-26"})),
            "test/hang" => {
                ctx.cancel.cancelled().await;
                self.cancelled.notify_one();
                Ok(json!({}))
            }
            other => Err(McpError::MethodNotFound(other.to_string())),
        }
    }
}

#[tokio::test]
async fn test_client_disconnect_cancels_handler() {
    let cancelled = Arc::new(tokio::sync::Notify::new());
    let server = HttpMcpServer::builder()
        .bind_address("127.0.0.1:0".parse().unwrap())
        .default_mode(ResponseMode::Sse)
        .register_handler(
            vec![methods::INITIALIZE.to_string(), "test/hang".to_string()],
            HangHandler {
                cancelled: Arc::clone(&cancelled),
            },
        )
        .build();
    let (listener, addr) = server.bind().await.unwrap();
    let run_server = server.clone();
    tokio::spawn(async move {
        run_server.run_on(listener, addr).await.unwrap();
    });
    let url = format!("http://{}/mcp", addr);

    let client = reqwest::Client::new();
    let session_id = initialize(&client, &url).await;

    // Start a streaming request whose handler blocks on cancellation, then
    // drop the connection.
    let response = client
        .post(&url)
        .header("Content-Type", "application/json")
        .header("Accept", "application/json, text/event-stream")
        .header("Mcp-Session-Id", &session_id)
        .json(&json!({"jsonrpc": "2.0", "id": 9, "method": "test/hang"}))
        .send()
        .await
        .unwrap();
    assert!(response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/event-stream"));
    drop(response);

    tokio::time::timeout(Duration::from_secs(2), cancelled.notified())
        .await
        .expect("handler context cancelled after disconnect");
}

#[tokio::test]
async fn test_get_sse_disabled_is_not_implemented() {
    let mut config = ServerConfig::default();
    config.get_sse_enabled = false;
    let (url, _server) = spawn_server(config).await;
    let client = reqwest::Client::new();
    let session_id = initialize(&client, &url).await;

    let response = client
        .get(&url)
        .header("Accept", "text/event-stream")
        .header("Mcp-Session-Id", &session_id)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 501);
}
