//! End-to-end session tests over the in-memory transport.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mcplex_client::{ChatBackend, ChatRequest, ChatResponse, ChatSamplingHandler, Client, ClientError, StaticRoots};
use mcplex_core::{McpError, McpResult};
use mcplex_endpoint::{notification_handler, Endpoint, EndpointBuilder};
use mcplex_protocol::{
    methods, CallToolParams, CallToolResult, ClientCapabilities, CreateMessageParams,
    Implementation, InitializeParams, InitializeResult, ListToolsResult, LogLevel,
    LogMessageParams, ProgressParams, ProgressToken, RequestMeta, ResourceUpdatedParams, Root,
    SamplingMessage, Tool, PROTOCOL_VERSION,
};
use mcplex_server::{Server, ServerTool};
use mcplex_transport::memory;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(2);

fn numbered_tool(n: u32) -> ServerTool {
    let name = format!("Method{n}");
    let tag = name.clone();
    ServerTool::new(
        Tool::new(
            name,
            serde_json::json!({
                "type": "object",
                "properties": {"i": {"type": "integer"}}
            }),
        )
        .with_description(format!("test tool {n}")),
        move |_ctx, args| {
            let tag = tag.clone();
            async move {
                let i = args
                    .as_ref()
                    .and_then(|a| a.get("i"))
                    .and_then(Value::as_i64)
                    .unwrap_or(0);
                Ok(CallToolResult::text(format!("{tag} Result {i}")))
            }
        },
    )
}

/// A tool that parks until cancelled, reporting when the token fires.
fn hang_tool(cancelled_tx: mpsc::UnboundedSender<Instant>) -> ServerTool {
    ServerTool::new(
        Tool::new("hang", serde_json::json!({"type": "object"})),
        move |ctx, _args| {
            let cancelled_tx = cancelled_tx.clone();
            async move {
                ctx.token().cancelled().await;
                let _ = cancelled_tx.send(Instant::now());
                Err(McpError::request_cancelled())
            }
        },
    )
}

async fn connect(server: &Server, client: &Client) -> Result<(), ClientError> {
    let (client_half, server_half) = memory::pair();
    let connection = server.serve(server_half);
    // Keep the session alive for the duration of the test process
    std::mem::forget(connection);
    client.connect(client_half).await
}

// ============================================================================
// Scenario: handshake
// ============================================================================

#[tokio::test]
async fn handshake_captures_server_identity() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let server = Server::builder("s", "1")
        .instructions("use the tools")
        .build()
        .unwrap();
    let client = Client::builder("c", "1").build().unwrap();
    connect(&server, &client).await.unwrap();

    let info = client.server_info().unwrap();
    assert_eq!(info.name, "s");
    assert_eq!(info.version, "1");
    assert_eq!(client.instructions().as_deref(), Some("use the tools"));
}

// ============================================================================
// Scenario: tool dispatch
// ============================================================================

#[tokio::test]
async fn tool_dispatch_lists_and_calls() {
    let mut builder = Server::builder("s", "1");
    for n in 1..=10 {
        builder = builder.tool(numbered_tool(n));
    }
    let server = builder
        .list_tools_handler(|_ctx, params| async move {
            // One extra page of two tools
            assert!(params.cursor.is_none());
            Ok(ListToolsResult {
                tools: vec![
                    Tool::new("extra_alpha", serde_json::json!({"type": "object"})),
                    Tool::new("extra_beta", serde_json::json!({"type": "object"})),
                ],
                next_cursor: None,
            })
        })
        .call_tool_handler(|_ctx, params| async move {
            Ok(CallToolResult::text(format!("extra {}", params.name)))
        })
        .build()
        .unwrap();
    let client = Client::builder("c", "1").build().unwrap();
    connect(&server, &client).await.unwrap();

    let token = CancellationToken::new();
    let list = client.list_tools(None, &token).await.unwrap();
    assert_eq!(list.tools.len(), 12);

    let result = client
        .call_tool(
            CallToolParams {
                name: "Method4".to_string(),
                arguments: Some(serde_json::json!({"i": 42})),
                meta: None,
            },
            &token,
        )
        .await
        .unwrap();
    assert!(!result.is_error);
    assert_eq!(result.content[0].as_text(), Some("Method4 Result 42"));
}

// ============================================================================
// Scenario: version mismatch
// ============================================================================

#[tokio::test]
async fn version_mismatch_fails_connect() {
    let server = Server::builder("s", "1").protocol_version("v2").build().unwrap();
    let client = Client::builder("c", "1").protocol_version("v1").build().unwrap();

    let err = connect(&server, &client).await.unwrap_err();
    match err {
        ClientError::VersionMismatch { requested, offered } => {
            assert_eq!(requested, "v1");
            assert_eq!(offered, "v2");
        }
        other => panic!("unexpected error: {other}"),
    }
    // The failed connect tore the client session down
    let token = CancellationToken::new();
    assert!(client.ping(&token).await.is_err());
}

// ============================================================================
// Scenario: cancellation
// ============================================================================

#[tokio::test]
async fn cancellation_propagates_to_server() {
    let (cancelled_tx, mut cancelled_rx) = mpsc::unbounded_channel();
    let server = Server::builder("s", "1")
        .tool(hang_tool(cancelled_tx))
        .build()
        .unwrap();
    let client = Arc::new(Client::builder("c", "1").build().unwrap());
    connect(&server, &client).await.unwrap();

    let token = CancellationToken::new();
    let call = {
        let client = Arc::clone(&client);
        let token = token.clone();
        tokio::spawn(async move {
            client
                .call_tool(
                    CallToolParams {
                        name: "hang".to_string(),
                        arguments: None,
                        meta: None,
                    },
                    &token,
                )
                .await
        })
    };

    // Let the request land in the handler, then cancel
    tokio::time::sleep(Duration::from_millis(50)).await;
    let cancel_at = Instant::now();
    token.cancel();

    let observed_at = timeout(WAIT, cancelled_rx.recv()).await.unwrap().unwrap();
    assert!(
        observed_at.duration_since(cancel_at) < Duration::from_millis(100),
        "server observed the cancellation too late"
    );

    let err = call.await.unwrap().unwrap_err();
    match err {
        ClientError::Rpc(e) => {
            assert_eq!(e.code, mcplex_core::McpErrorCode::RequestCancelled);
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ============================================================================
// Scenario: unknown method
// ============================================================================

/// Runs the handshake by hand over a raw endpoint.
async fn raw_handshake(server: &Server) -> Endpoint {
    let (client_half, server_half) = memory::pair();
    std::mem::forget(server.serve(server_half));
    let endpoint = EndpointBuilder::new().connect(client_half);

    let token = CancellationToken::new();
    let params = serde_json::to_value(InitializeParams {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation::new("c", "1"),
    })
    .unwrap();
    let _: InitializeResult = endpoint
        .request(methods::INITIALIZE, Some(params), &token)
        .await
        .unwrap();
    endpoint.notify(methods::INITIALIZED, None).await.unwrap();
    endpoint
}

#[tokio::test]
async fn unknown_method_keeps_session_alive() {
    let server = Server::builder("s", "1").tool(numbered_tool(1)).build().unwrap();
    let endpoint = raw_handshake(&server).await;
    let token = CancellationToken::new();

    let err = endpoint
        .request::<Value>("foo/bar", None, &token)
        .await
        .unwrap_err();
    assert_eq!(i32::from(err.code), -32601);

    // Subsequent calls on the same session succeed
    let list: ListToolsResult = endpoint
        .request(methods::TOOLS_LIST, None, &token)
        .await
        .unwrap();
    assert_eq!(list.tools.len(), 1);
}

// ============================================================================
// Scenario: list-changed
// ============================================================================

#[tokio::test]
async fn tools_mutation_notifies_client() {
    let server = Server::builder("s", "1").tool(numbered_tool(1)).build().unwrap();

    let (changed_tx, mut changed_rx) = mpsc::unbounded_channel();
    let client = Client::builder("c", "1")
        .notification_handler(
            methods::TOOLS_LIST_CHANGED,
            notification_handler(move |_endpoint, _params: Value| {
                let changed_tx = changed_tx.clone();
                async move {
                    let _ = changed_tx.send(());
                    Ok(())
                }
            }),
        )
        .build()
        .unwrap();
    connect(&server, &client).await.unwrap();

    // Give the server's read loop time to arm the change notifier
    tokio::time::sleep(Duration::from_millis(100)).await;
    server.tools().insert(numbered_tool(2));

    timeout(WAIT, changed_rx.recv()).await.unwrap().unwrap();
}

#[tokio::test]
async fn duplicate_initialized_subscribes_once() {
    let server = Server::builder("s", "1").tool(numbered_tool(1)).build().unwrap();

    let (client_half, server_half) = memory::pair();
    std::mem::forget(server.serve(server_half));

    let (changed_tx, mut changed_rx) = mpsc::unbounded_channel::<()>();
    let mut builder = EndpointBuilder::new();
    builder.notification_handler(
        methods::TOOLS_LIST_CHANGED,
        notification_handler(move |_endpoint, _params: Value| {
            let changed_tx = changed_tx.clone();
            async move {
                let _ = changed_tx.send(());
                Ok(())
            }
        }),
    );
    let endpoint = builder.connect(client_half);

    let token = CancellationToken::new();
    let params = serde_json::to_value(InitializeParams {
        protocol_version: PROTOCOL_VERSION.to_string(),
        capabilities: ClientCapabilities::default(),
        client_info: Implementation::new("c", "1"),
    })
    .unwrap();
    let _: InitializeResult = endpoint
        .request(methods::INITIALIZE, Some(params), &token)
        .await
        .unwrap();

    // Two initialized notifications must arm the notifier only once
    endpoint.notify(methods::INITIALIZED, None).await.unwrap();
    endpoint.notify(methods::INITIALIZED, None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    server.tools().insert(numbered_tool(2));

    timeout(WAIT, changed_rx.recv()).await.unwrap().unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(
        changed_rx.try_recv().is_err(),
        "a single mutation produced more than one list_changed"
    );
}

// ============================================================================
// Sampling and roots
// ============================================================================

struct CannedBackend;

#[async_trait::async_trait]
impl ChatBackend for CannedBackend {
    async fn complete(&self, request: ChatRequest) -> McpResult<ChatResponse> {
        let last = request.messages.last().map(|m| m.text.clone()).unwrap_or_default();
        Ok(ChatResponse {
            model: "canned-1".to_string(),
            text: format!("echo: {last}"),
        })
    }
}

#[tokio::test]
async fn sampling_roundtrip_through_client() {
    let server = Server::builder("s", "1").build().unwrap();
    let client = Client::builder("c", "1")
        .with_sampling(ChatSamplingHandler::new(CannedBackend))
        .build()
        .unwrap();

    let (client_half, server_half) = memory::pair();
    let connection = server.serve(server_half);
    client.connect(client_half).await.unwrap();

    let token = CancellationToken::new();
    let result = connection
        .create_message(
            CreateMessageParams::new(vec![SamplingMessage::user("hello")], 32),
            &token,
        )
        .await
        .unwrap();
    assert_eq!(result.model, "canned-1");
    assert_eq!(result.content.as_text(), Some("echo: hello"));
    assert_eq!(
        serde_json::to_value(result.stop_reason).unwrap(),
        "endTurn"
    );
}

#[tokio::test]
async fn roots_roundtrip() {
    let server = Server::builder("s", "1").build().unwrap();
    let client = Client::builder("c", "1")
        .with_roots(
            StaticRoots::new(vec![Root {
                uri: "file:///workspace".to_string(),
                name: Some("workspace".to_string()),
            }]),
            true,
        )
        .build()
        .unwrap();

    let (client_half, server_half) = memory::pair();
    let connection = server.serve(server_half);
    client.connect(client_half).await.unwrap();

    let token = CancellationToken::new();
    let roots = connection.list_roots(&token).await.unwrap();
    assert_eq!(roots.roots.len(), 1);
    assert_eq!(roots.roots[0].uri, "file:///workspace");
}

// ============================================================================
// Progress
// ============================================================================

#[tokio::test]
async fn progress_flows_back_to_caller() {
    let server = Server::builder("s", "1")
        .tool(ServerTool::new(
            Tool::new("steps", serde_json::json!({"type": "object"})),
            |ctx, _args| async move {
                for step in 1..=3 {
                    ctx.report_progress(f64::from(step), Some(3.0), Some("working"))
                        .await;
                }
                Ok(CallToolResult::text("done"))
            },
        ))
        .build()
        .unwrap();

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let client = Client::builder("c", "1")
        .notification_handler(
            methods::PROGRESS,
            notification_handler(move |_endpoint, params: ProgressParams| {
                let progress_tx = progress_tx.clone();
                async move {
                    let _ = progress_tx.send(params);
                    Ok(())
                }
            }),
        )
        .build()
        .unwrap();
    connect(&server, &client).await.unwrap();

    let token = CancellationToken::new();
    let result = client
        .call_tool(
            CallToolParams {
                name: "steps".to_string(),
                arguments: Some(serde_json::json!({})),
                meta: Some(RequestMeta {
                    progress_token: Some("tok-7".into()),
                }),
            },
            &token,
        )
        .await
        .unwrap();
    assert_eq!(result.content[0].as_text(), Some("done"));

    let first = timeout(WAIT, progress_rx.recv()).await.unwrap().unwrap();
    assert_eq!(first.progress_token, ProgressToken::from("tok-7"));
    assert_eq!(first.total, Some(3.0));
}

// ============================================================================
// Resource subscriptions and logging
// ============================================================================

#[tokio::test]
async fn resource_updates_only_for_subscribed_uris() {
    let server = Server::builder("s", "1")
        .list_resources_handler(|_ctx, _params| async move {
            Ok(mcplex_protocol::ListResourcesResult {
                resources: vec![],
                next_cursor: None,
            })
        })
        .read_resource_handler(|_ctx, params| async move {
            Err(McpError::resource_not_found(&params.uri))
        })
        .enable_resource_subscriptions()
        .build()
        .unwrap();

    let (updated_tx, mut updated_rx) = mpsc::unbounded_channel();
    let client = Client::builder("c", "1")
        .notification_handler(
            methods::RESOURCES_UPDATED,
            notification_handler(move |_endpoint, params: ResourceUpdatedParams| {
                let updated_tx = updated_tx.clone();
                async move {
                    let _ = updated_tx.send(params.uri);
                    Ok(())
                }
            }),
        )
        .build()
        .unwrap();

    let (client_half, server_half) = memory::pair();
    let connection = server.serve(server_half);
    client.connect(client_half).await.unwrap();

    let token = CancellationToken::new();
    client.subscribe_resource("file:///a", &token).await.unwrap();

    // Unsubscribed URI: nothing is sent
    connection.notify_resource_updated("file:///b").await.unwrap();
    // Subscribed URI: the notification arrives
    connection.notify_resource_updated("file:///a").await.unwrap();

    let uri = timeout(WAIT, updated_rx.recv()).await.unwrap().unwrap();
    assert_eq!(uri, "file:///a");

    // After unsubscribing, updates stop
    client.unsubscribe_resource("file:///a", &token).await.unwrap();
    connection.notify_resource_updated("file:///a").await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(updated_rx.try_recv().is_err());
}

#[tokio::test]
async fn log_messages_respect_client_level() {
    let server = Server::builder("s", "1").enable_logging().build().unwrap();

    let (log_tx, mut log_rx) = mpsc::unbounded_channel();
    let client = Client::builder("c", "1")
        .notification_handler(
            methods::LOGGING_MESSAGE,
            notification_handler(move |_endpoint, params: LogMessageParams| {
                let log_tx = log_tx.clone();
                async move {
                    let _ = log_tx.send(params);
                    Ok(())
                }
            }),
        )
        .build()
        .unwrap();

    let (client_half, server_half) = memory::pair();
    let connection = server.serve(server_half);
    client.connect(client_half).await.unwrap();

    let token = CancellationToken::new();
    client.set_log_level(LogLevel::Warning, &token).await.unwrap();

    // Below the requested level: suppressed
    connection
        .log_message(LogLevel::Info, None, serde_json::json!("quiet"))
        .await
        .unwrap();
    // At/above the requested level: delivered
    connection
        .log_message(
            LogLevel::Error,
            Some("mcplex::test".to_string()),
            serde_json::json!("loud"),
        )
        .await
        .unwrap();

    let delivered = timeout(WAIT, log_rx.recv()).await.unwrap().unwrap();
    assert_eq!(delivered.data, serde_json::json!("loud"));
    assert_eq!(delivered.logger.as_deref(), Some("mcplex::test"));
}

// ============================================================================
// Ping both ways
// ============================================================================

#[tokio::test]
async fn ping_in_both_directions() {
    let server = Server::builder("s", "1").build().unwrap();
    let client = Client::builder("c", "1").build().unwrap();

    let (client_half, server_half) = memory::pair();
    let connection = server.serve(server_half);
    client.connect(client_half).await.unwrap();

    let token = CancellationToken::new();
    client.ping(&token).await.unwrap();
    connection.ping(&token).await.unwrap();
}

// ============================================================================
// Completion
// ============================================================================

#[tokio::test]
async fn completion_default_is_empty() {
    let server = Server::builder("s", "1").build().unwrap();
    let client = Client::builder("c", "1").build().unwrap();
    connect(&server, &client).await.unwrap();

    let token = CancellationToken::new();
    let result = client
        .complete(
            mcplex_protocol::CompleteParams {
                reference: mcplex_protocol::CompletionReference::Prompt {
                    name: "greeting".to_string(),
                },
                argument: mcplex_protocol::CompletionArgument {
                    name: "name".to_string(),
                    value: "Al".to_string(),
                },
            },
            &token,
        )
        .await
        .unwrap();
    assert!(result.completion.values.is_empty());
    assert_eq!(result.completion.has_more, Some(false));
}
