mod common;

use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

async fn mcp_post(
    State(expected_auth): State<Option<String>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response {
    if let Some(expected) = expected_auth {
        let auth = headers
            .get("Authorization")
            .and_then(|value| value.to_str().ok());
        if auth != Some(expected.as_str()) {
            return StatusCode::UNAUTHORIZED.into_response();
        }
    }

    let id = payload.get("id").cloned().unwrap_or(Value::Null);
    match payload.get("method").and_then(Value::as_str) {
        Some("initialize") => Json(common::initialize_result(id)).into_response(),
        Some("notifications/initialized") => StatusCode::ACCEPTED.into_response(),
        Some("tools/list") => Json(common::tools_list_result(id)).into_response(),
        _ => Json(common::method_not_found(id)).into_response(),
    }
}

async fn spawn_stub(expected_auth: Option<&str>) -> (String, tokio::task::JoinHandle<()>) {
    let app = Router::new()
        .route("/mcp", post(mcp_post))
        .with_state(expected_auth.map(str::to_string));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub addr");
    let task = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve stub");
    });

    (format!("http://{}:{}/mcp", addr.ip(), addr.port()), task)
}

#[tokio::test]
async fn prints_tool_lines_and_exits_zero() {
    let (endpoint, server_task) = spawn_stub(None).await;

    let output = common::run_mcplist(
        &["--url", &endpoint, "--logLevel", "none"],
        Duration::from_secs(20),
    )
    .await;

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "Name: get-weather Description: Returns weather\nName: echo Description: Echoes input\n"
    );

    server_task.abort();
}

#[tokio::test]
async fn bearer_token_reaches_the_server() {
    let (endpoint, server_task) = spawn_stub(Some("Bearer s3cret")).await;

    let output = common::run_mcplist(
        &[&endpoint, "--oauth2Bearer", "s3cret", "--logLevel", "none"],
        Duration::from_secs(20),
    )
    .await;

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert_eq!(String::from_utf8_lossy(&output.stdout).lines().count(), 2);

    server_task.abort();
}

#[tokio::test]
async fn unreachable_server_exits_nonzero_with_empty_stdout() {
    let port = common::find_free_port();
    let endpoint = format!("http://127.0.0.1:{port}/mcp");

    let output = common::run_mcplist(
        &["--url", &endpoint, "--logLevel", "none"],
        Duration::from_secs(20),
    )
    .await;

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("[mcplist] Error: Failed to connect"),
        "stderr: {stderr}"
    );
}

#[tokio::test]
async fn invalid_header_is_rejected_before_connecting() {
    let output = common::run_mcplist(
        &["--url", "http://127.0.0.1:1/mcp", "--header", "no-colon"],
        Duration::from_secs(20),
    )
    .await;

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid header format"));
}
