mod common;

use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::Event;
use axum::response::{IntoResponse, Response, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::stream;
use futures::StreamExt;
use mcplist::tool_api::{ToolClientBuilder, ToolListError};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

#[derive(Clone)]
struct MockState {
    events: broadcast::Sender<String>,
    list_count: Arc<AtomicUsize>,
    send_endpoint: bool,
    accepted_body: bool,
}

async fn sse_get(State(state): State<MockState>) -> Response {
    let rx = state.events.subscribe();

    let endpoint_event = stream::iter(
        state
            .send_endpoint
            .then(|| Ok::<Event, Infallible>(Event::default().event("endpoint").data("/message"))),
    );

    let updates = BroadcastStream::new(rx).filter_map(|message| async move {
        match message {
            Ok(payload) => Some(Ok::<Event, Infallible>(Event::default().data(payload))),
            Err(_) => None,
        }
    });

    Sse::new(endpoint_event.chain(updates)).into_response()
}

async fn message_post(
    State(state): State<MockState>,
    Json(payload): Json<Value>,
) -> Response {
    let id = payload.get("id").cloned().unwrap_or(Value::Null);
    let method = payload
        .get("method")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match method {
        "initialize" => {
            // A server-initiated request sharing the id must not be taken as the reply.
            send_event(
                &state,
                serde_json::json!({"jsonrpc": "2.0", "id": id.clone(), "method": "ping"}),
            );
            send_event(&state, common::initialize_result(id));
        }
        "notifications/initialized" => {}
        "tools/list" => {
            state.list_count.fetch_add(1, Ordering::SeqCst);
            send_event(&state, common::tools_list_result(id));
        }
        _ => send_event(&state, common::method_not_found(id)),
    }

    if state.accepted_body {
        (StatusCode::ACCEPTED, "Accepted").into_response()
    } else {
        StatusCode::ACCEPTED.into_response()
    }
}

fn send_event(state: &MockState, payload: Value) {
    let _ = state.events.send(payload.to_string());
}

async fn spawn_mock_server(
    send_endpoint: bool,
    accepted_body: bool,
) -> (String, MockState, tokio::task::JoinHandle<()>) {
    let (events_tx, _) = broadcast::channel(32);
    let state = MockState {
        events: events_tx,
        list_count: Arc::new(AtomicUsize::new(0)),
        send_endpoint,
        accepted_body,
    };

    let app = Router::new()
        .route("/sse", get(sse_get))
        .route("/message", post(message_post))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let endpoint = format!("http://{}:{}/sse", addr.ip(), addr.port());

    let task = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve mock app");
    });

    (endpoint, state, task)
}

#[tokio::test]
async fn sse_transport_lists_tools_from_async_events() {
    let (endpoint, state, server_task) = spawn_mock_server(true, false).await;

    let mut session = ToolClientBuilder::new(endpoint)
        .connect()
        .await
        .expect("connect over inferred sse transport");

    let first = session.list_tools().await.expect("list tools");
    let second = session.list_tools().await.expect("list tools again");

    let names: Vec<&str> = first.iter().map(|tool| tool.name.as_str()).collect();
    assert_eq!(names, vec!["get-weather", "echo"]);
    assert_eq!(first, second);
    assert_eq!(state.list_count.load(Ordering::SeqCst), 2);

    session.close().await.expect("close");
    session.close().await.expect("close twice");
    assert!(matches!(
        session.list_tools().await,
        Err(ToolListError::Request(_))
    ));

    server_task.abort();
}

#[tokio::test]
async fn sse_transport_without_endpoint_event_fails_to_connect() {
    let (endpoint, _state, server_task) = spawn_mock_server(false, false).await;

    let err = ToolClientBuilder::new(endpoint)
        .connect_timeout(Duration::from_millis(300))
        .connect()
        .await
        .err()
        .expect("endpoint event never arrives");

    assert!(err.is_connection(), "unexpected error: {err}");
    assert!(err.to_string().contains("endpoint"));

    server_task.abort();
}

#[tokio::test]
async fn sse_transport_ignores_plain_text_accepted_bodies() {
    let (endpoint, state, server_task) = spawn_mock_server(true, true).await;

    let mut session = ToolClientBuilder::new(endpoint)
        .connect()
        .await
        .expect("handshake completes over the event stream");

    let tools = session.list_tools().await.expect("list tools");
    assert_eq!(tools.len(), 2);
    assert_eq!(tools[1].name, "echo");
    assert_eq!(state.list_count.load(Ordering::SeqCst), 1);

    session.close().await.expect("close");
    server_task.abort();
}

#[tokio::test]
async fn sse_transport_times_out_when_stream_never_answers() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind silent listener");
    let addr = listener.local_addr().expect("listener addr");
    let silent_task = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let builder = ToolClientBuilder::new(format!("http://{addr}/sse"))
        .connect_timeout(Duration::from_millis(300));
    let connect = builder.connect();
    let err = tokio::time::timeout(Duration::from_secs(3), connect)
        .await
        .expect("connect is bounded by the connect timeout")
        .err()
        .expect("server never responds");

    assert!(err.is_connection(), "unexpected error: {err}");
    assert!(err.to_string().contains("Timed out"), "unexpected error: {err}");

    silent_task.abort();
}
