use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::{SinkExt, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::RequestBuilder;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::tool_api::error::ToolListError;

pub(crate) const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub(crate) const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SESSION_HEADER: &str = "Mcp-Session-Id";
const STREAMABLE_ACCEPT: &str = "application/json, text/event-stream";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = futures::stream::SplitSink<WsStream, Message>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    StreamableHttp,
    Sse,
    Ws,
    Stdio,
}

impl Transport {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StreamableHttp => "streamable-http",
            Self::Sse => "sse",
            Self::Ws => "ws",
            Self::Stdio => "stdio",
        }
    }

    /// Picks a transport from the shape of a remote URL.
    ///
    /// `ws`/`wss` select WebSocket, `http(s)` URLs whose path ends in `/sse`
    /// select the SSE transport and every other `http(s)` URL selects
    /// Streamable HTTP. Stdio is never inferred.
    pub fn infer(endpoint: &str) -> Result<Self, ToolListError> {
        let url = Url::parse(endpoint.trim())
            .map_err(|err| ToolListError::connection(endpoint, format!("Invalid URL: {err}")))?;
        match url.scheme() {
            "ws" | "wss" => Ok(Self::Ws),
            "http" | "https" => {
                if url.path().trim_end_matches('/').ends_with("/sse") {
                    Ok(Self::Sse)
                } else {
                    Ok(Self::StreamableHttp)
                }
            }
            other => Err(ToolListError::connection(
                endpoint,
                format!("Unsupported URL scheme '{other}' (expected http, https, ws or wss)"),
            )),
        }
    }
}

/// An established message channel to an MCP server.
///
/// Implementations correlate a request with its response by JSON-RPC id.
/// `close` must be idempotent and safe to call after any failed exchange.
#[async_trait]
pub trait Connection: Send {
    async fn send_request(&mut self, request: &Value) -> Result<Value, ToolListError>;

    async fn send_notification(&mut self, notification: &Value) -> Result<(), ToolListError>;

    async fn close(&mut self) -> Result<(), ToolListError>;
}

/// Opens a [`Connection`] for an endpoint. One attempt, no retries.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Connection>, ToolListError>;
}

#[derive(Debug, Clone)]
pub struct TransportOptions {
    pub headers: HashMap<String, String>,
    pub env: HashMap<String, String>,
    pub connect_timeout: Duration,
    pub request_timeout: Option<Duration>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            headers: HashMap::new(),
            env: HashMap::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

/// The network-backed [`Connector`].
#[derive(Debug, Clone)]
pub struct TransportConnector {
    transport: Option<Transport>,
    options: TransportOptions,
}

impl TransportConnector {
    pub fn new(transport: Option<Transport>, options: TransportOptions) -> Self {
        Self { transport, options }
    }

    pub fn resolve_transport(&self, endpoint: &str) -> Result<Transport, ToolListError> {
        match self.transport {
            Some(explicit) => Ok(explicit),
            None => Transport::infer(endpoint),
        }
    }
}

#[async_trait]
impl Connector for TransportConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Connection>, ToolListError> {
        if endpoint.trim().is_empty() {
            return Err(ToolListError::connection(endpoint, "endpoint cannot be empty"));
        }

        let transport = self.resolve_transport(endpoint)?;
        tracing::debug!("Opening {} transport to {endpoint}", transport.as_str());

        let connection: Box<dyn Connection> = match transport {
            Transport::StreamableHttp => Box::new(StreamableHttpTransport::open(
                endpoint,
                self.options.clone(),
            )?),
            Transport::Sse => {
                Box::new(SseTransport::open(endpoint, self.options.clone()).await?)
            }
            Transport::Ws => Box::new(WsTransport::open(endpoint, self.options.clone()).await?),
            Transport::Stdio => Box::new(StdioTransport::open(endpoint, &self.options)?),
        };
        Ok(connection)
    }
}

/// Response slots for transports whose replies arrive on a separate stream.
#[derive(Clone, Default)]
struct PendingResponses {
    slots: Arc<Mutex<HashMap<String, oneshot::Sender<Value>>>>,
}

impl PendingResponses {
    async fn register(&self, id_key: &str) -> oneshot::Receiver<Value> {
        let (tx, rx) = oneshot::channel();
        self.slots.lock().await.insert(id_key.to_string(), tx);
        rx
    }

    async fn forget(&self, id_key: &str) {
        self.slots.lock().await.remove(id_key);
    }

    async fn deliver(&self, payload: Value) {
        if payload.get("method").is_some() {
            tracing::debug!("Ignoring server-initiated message: {payload}");
            return;
        }
        let Some(id_key) = id_key_from_envelope(&payload) else {
            return;
        };
        if let Some(tx) = self.slots.lock().await.remove(&id_key) {
            let _ = tx.send(payload);
        }
    }

    /// Drops every waiting slot so callers observe the disconnect immediately.
    async fn disconnect_all(&self) {
        self.slots.lock().await.clear();
    }

    async fn wait(
        &self,
        id_key: &str,
        rx: oneshot::Receiver<Value>,
        timeout: Duration,
        label: &str,
    ) -> Result<Value, ToolListError> {
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(_)) => Err(ToolListError::Request(format!(
                "{label} disconnected while waiting for response"
            ))),
            Err(_) => {
                self.forget(id_key).await;
                Err(ToolListError::Request(format!(
                    "Timed out waiting for {label} response after {}ms",
                    timeout.as_millis()
                )))
            }
        }
    }
}

fn request_id_key(request: &Value) -> Result<String, ToolListError> {
    id_key_from_envelope(request)
        .ok_or_else(|| ToolListError::Protocol("JSON-RPC request is missing an id".to_string()))
}

pub(crate) struct StreamableHttpTransport {
    endpoint: String,
    headers: HashMap<String, String>,
    client: reqwest::Client,
    session_id: Option<String>,
    closed: bool,
}

impl StreamableHttpTransport {
    fn open(endpoint: &str, options: TransportOptions) -> Result<Self, ToolListError> {
        Url::parse(endpoint)
            .map_err(|err| ToolListError::connection(endpoint, format!("Invalid URL: {err}")))?;
        let mut builder = reqwest::Client::builder().connect_timeout(options.connect_timeout);
        if let Some(timeout) = options.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|err| {
            ToolListError::connection(endpoint, format!("Failed to build HTTP client: {err}"))
        })?;
        Ok(Self {
            endpoint: endpoint.to_string(),
            headers: options.headers,
            client,
            session_id: None,
            closed: false,
        })
    }

    async fn dispatch(&mut self, payload: &Value) -> Result<Option<Value>, ToolListError> {
        if self.closed {
            return Err(ToolListError::Request("connection is closed".to_string()));
        }

        let mut req = apply_headers(
            self.client
                .post(&self.endpoint)
                .header(ACCEPT, STREAMABLE_ACCEPT)
                .json(payload),
            &self.headers,
        );
        if let Some(session_id) = &self.session_id {
            req = req.header(SESSION_HEADER, session_id);
        }
        let response = req
            .send()
            .await
            .map_err(|err| ToolListError::Request(err.to_string()))?;
        if let Some(session_id) = extract_session_id(response.headers()) {
            self.session_id = Some(session_id);
        }

        if is_event_stream(&response) {
            let id_key = id_key_from_envelope(payload);
            return read_event_stream_response(response, id_key.as_deref()).await;
        }
        parse_json_response(response).await
    }
}

#[async_trait]
impl Connection for StreamableHttpTransport {
    async fn send_request(&mut self, request: &Value) -> Result<Value, ToolListError> {
        let response = self.dispatch(request).await?;
        response.ok_or_else(|| {
            ToolListError::Protocol(
                "Expected JSON-RPC response but received empty body".to_string(),
            )
        })
    }

    async fn send_notification(&mut self, notification: &Value) -> Result<(), ToolListError> {
        let _ = self.dispatch(notification).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ToolListError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Servers that issued a session id expect an explicit DELETE on shutdown.
        let Some(session_id) = self.session_id.take() else {
            return Ok(());
        };
        let req = apply_headers(self.client.delete(&self.endpoint), &self.headers)
            .header(SESSION_HEADER, session_id);
        if let Err(err) = req.send().await {
            tracing::debug!("Session termination request failed: {err}");
        }
        Ok(())
    }
}

pub(crate) struct SseTransport {
    headers: HashMap<String, String>,
    client: reqwest::Client,
    request_timeout: Duration,
    message_endpoint: Url,
    pending: PendingResponses,
    stream_task: Option<JoinHandle<()>>,
}

impl SseTransport {
    async fn open(endpoint: &str, options: TransportOptions) -> Result<Self, ToolListError> {
        let sse_endpoint = Url::parse(endpoint)
            .map_err(|err| ToolListError::connection(endpoint, format!("Invalid URL: {err}")))?;
        let client = reqwest::Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()
            .map_err(|err| {
                ToolListError::connection(endpoint, format!("Failed to build SSE client: {err}"))
            })?;

        let req = apply_headers(
            client
                .get(sse_endpoint.clone())
                .header(ACCEPT, "text/event-stream"),
            &options.headers,
        );
        let response = tokio::time::timeout(options.connect_timeout, req.send())
            .await
            .map_err(|_| {
                ToolListError::connection(
                    endpoint,
                    format!(
                        "Timed out opening SSE stream after {}ms",
                        options.connect_timeout.as_millis()
                    ),
                )
            })?
            .map_err(|err| {
                ToolListError::connection(endpoint, format!("Failed to open SSE stream: {err}"))
            })?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_status_error(status, body.trim()).during_connect(endpoint));
        }

        let pending = PendingResponses::default();
        let (endpoint_tx, endpoint_rx) = oneshot::channel::<Url>();
        let base_url = sse_endpoint.clone();
        let task_pending = pending.clone();

        let stream_task = tokio::spawn(async move {
            let mut endpoint_tx = Some(endpoint_tx);
            let stream = response.bytes_stream().eventsource();
            tokio::pin!(stream);
            while let Some(event) = stream.next().await {
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        tracing::debug!("SSE stream error: {err}");
                        break;
                    }
                };

                if event.event == "endpoint" {
                    match base_url.join(event.data.trim()) {
                        Ok(url) => {
                            if let Some(tx) = endpoint_tx.take() {
                                let _ = tx.send(url);
                            }
                        }
                        Err(err) => tracing::warn!("Ignoring invalid endpoint event: {err}"),
                    }
                    continue;
                }

                if event.data.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<Value>(&event.data) {
                    Ok(payload) => task_pending.deliver(payload).await,
                    Err(err) => tracing::debug!("Skipping non-JSON SSE event: {err}"),
                }
            }
            task_pending.disconnect_all().await;
        });

        let message_endpoint =
            match tokio::time::timeout(options.connect_timeout, endpoint_rx).await {
                Ok(Ok(url)) => url,
                Ok(Err(_)) => {
                    stream_task.abort();
                    return Err(ToolListError::connection(
                        endpoint,
                        "SSE stream closed before the endpoint event arrived",
                    ));
                }
                Err(_) => {
                    stream_task.abort();
                    return Err(ToolListError::connection(
                        endpoint,
                        format!(
                            "Timed out waiting for SSE message endpoint after {}ms",
                            options.connect_timeout.as_millis()
                        ),
                    ));
                }
            };
        tracing::debug!("SSE message endpoint: {message_endpoint}");

        Ok(Self {
            headers: options.headers,
            client,
            request_timeout: options.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            message_endpoint,
            pending,
            stream_task: Some(stream_task),
        })
    }

    fn ensure_open(&self) -> Result<(), ToolListError> {
        match &self.stream_task {
            Some(task) if !task.is_finished() => Ok(()),
            Some(_) => Err(ToolListError::Request("SSE stream has ended".to_string())),
            None => Err(ToolListError::Request("connection is closed".to_string())),
        }
    }

    /// Posts to the message endpoint. Replies normally arrive on the event
    /// stream; the body (often a bare `Accepted`) is only used when it is the
    /// JSON-RPC response for `id_key`.
    async fn post_message(
        &self,
        payload: &Value,
        id_key: Option<&str>,
    ) -> Result<Option<Value>, ToolListError> {
        let req = apply_headers(
            self.client
                .post(self.message_endpoint.clone())
                .timeout(self.request_timeout)
                .json(payload),
            &self.headers,
        );
        let response = req
            .send()
            .await
            .map_err(|err| ToolListError::Request(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(map_http_status_error(status, body.trim()));
        }

        let Some(id_key) = id_key else {
            return Ok(None);
        };
        let body = response
            .bytes()
            .await
            .map_err(|err| ToolListError::Request(err.to_string()))?;
        Ok(serde_json::from_slice::<Value>(&body).ok().filter(|reply| {
            reply.get("method").is_none() && id_key_from_envelope(reply).as_deref() == Some(id_key)
        }))
    }
}

#[async_trait]
impl Connection for SseTransport {
    async fn send_request(&mut self, request: &Value) -> Result<Value, ToolListError> {
        self.ensure_open()?;
        let id_key = request_id_key(request)?;
        let rx = self.pending.register(&id_key).await;

        match self.post_message(request, Some(&id_key)).await {
            Ok(Some(payload)) => {
                self.pending.forget(&id_key).await;
                return Ok(payload);
            }
            Ok(None) => {}
            Err(err) => {
                self.pending.forget(&id_key).await;
                return Err(err);
            }
        }

        self.pending
            .wait(&id_key, rx, self.request_timeout, "SSE")
            .await
    }

    async fn send_notification(&mut self, notification: &Value) -> Result<(), ToolListError> {
        self.ensure_open()?;
        let _ = self.post_message(notification, None).await?;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ToolListError> {
        if let Some(task) = self.stream_task.take() {
            task.abort();
            self.pending.disconnect_all().await;
        }
        Ok(())
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        if let Some(task) = self.stream_task.take() {
            task.abort();
        }
    }
}

pub(crate) struct WsTransport {
    request_timeout: Duration,
    writer: Option<WsWriter>,
    pending: PendingResponses,
    reader_task: Option<JoinHandle<()>>,
}

impl WsTransport {
    async fn open(endpoint: &str, options: TransportOptions) -> Result<Self, ToolListError> {
        let mut request = endpoint
            .into_client_request()
            .map_err(|err| ToolListError::connection(endpoint, err.to_string()))?;

        for (key, value) in &options.headers {
            let header_name = HeaderName::from_bytes(key.as_bytes()).map_err(|err| {
                ToolListError::connection(endpoint, format!("Invalid header name '{key}': {err}"))
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|err| {
                ToolListError::connection(
                    endpoint,
                    format!("Invalid header value for '{key}': {err}"),
                )
            })?;
            request.headers_mut().insert(header_name, header_value);
        }

        let (stream, _) = tokio::time::timeout(options.connect_timeout, connect_async(request))
            .await
            .map_err(|_| {
                ToolListError::connection(
                    endpoint,
                    format!(
                        "Timed out connecting to WebSocket endpoint after {}ms",
                        options.connect_timeout.as_millis()
                    ),
                )
            })?
            .map_err(|err| {
                ToolListError::connection(endpoint, format!("WebSocket connection failed: {err}"))
            })?;

        let (writer, mut reader) = stream.split();
        let pending = PendingResponses::default();
        let task_pending = pending.clone();

        let reader_task = tokio::spawn(async move {
            while let Some(frame) = reader.next().await {
                let Ok(frame) = frame else {
                    break;
                };

                let payload = match frame {
                    Message::Text(text) => serde_json::from_str::<Value>(&text).ok(),
                    Message::Binary(bytes) => serde_json::from_slice::<Value>(&bytes).ok(),
                    Message::Close(_) => break,
                    _ => None,
                };

                if let Some(payload) = payload {
                    task_pending.deliver(payload).await;
                }
            }
            task_pending.disconnect_all().await;
        });

        Ok(Self {
            request_timeout: options.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            writer: Some(writer),
            pending,
            reader_task: Some(reader_task),
        })
    }

    async fn send_text(&mut self, payload: &Value) -> Result<(), ToolListError> {
        if self
            .reader_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(true)
        {
            return Err(ToolListError::Request(
                "WebSocket connection is closed".to_string(),
            ));
        }
        let writer = self.writer.as_mut().ok_or_else(|| {
            ToolListError::Request("WebSocket connection is closed".to_string())
        })?;
        writer
            .send(Message::Text(payload.to_string().into()))
            .await
            .map_err(|err| {
                ToolListError::Request(format!("Failed to send WebSocket message: {err}"))
            })
    }
}

#[async_trait]
impl Connection for WsTransport {
    async fn send_request(&mut self, request: &Value) -> Result<Value, ToolListError> {
        let id_key = request_id_key(request)?;
        let rx = self.pending.register(&id_key).await;

        if let Err(err) = self.send_text(request).await {
            self.pending.forget(&id_key).await;
            return Err(err);
        }

        self.pending
            .wait(&id_key, rx, self.request_timeout, "WebSocket")
            .await
    }

    async fn send_notification(&mut self, notification: &Value) -> Result<(), ToolListError> {
        self.send_text(notification).await
    }

    async fn close(&mut self) -> Result<(), ToolListError> {
        if let Some(mut writer) = self.writer.take() {
            if let Err(err) = writer.send(Message::Close(None)).await {
                tracing::debug!("WebSocket close frame failed: {err}");
            }
        }
        if let Some(task) = self.reader_task.take() {
            task.abort();
            self.pending.disconnect_all().await;
        }
        Ok(())
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
    }
}

pub(crate) struct StdioTransport {
    request_timeout: Duration,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    pending: PendingResponses,
    reader_task: Option<JoinHandle<()>>,
}

impl StdioTransport {
    fn open(command_line: &str, options: &TransportOptions) -> Result<Self, ToolListError> {
        let parts = shell_words::split(command_line)
            .map_err(|err| ToolListError::connection(command_line, err.to_string()))?;
        let Some((program, args)) = parts
            .split_first()
            .filter(|(program, _)| !program.trim().is_empty())
        else {
            return Err(ToolListError::connection(command_line, "stdio command is empty"));
        };

        let mut child = Command::new(program)
            .args(args)
            .envs(&options.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|err| {
                ToolListError::connection(command_line, format!("Failed to spawn '{program}': {err}"))
            })?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take().ok_or_else(|| {
            ToolListError::connection(command_line, "child process has no stdout pipe")
        })?;

        let pending = PendingResponses::default();
        let task_pending = pending.clone();
        let reader_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        match serde_json::from_str::<Value>(line) {
                            Ok(payload) => task_pending.deliver(payload).await,
                            Err(_) => tracing::debug!("Child output (non-JSON): {line}"),
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::debug!("Failed reading child stdout: {err}");
                        break;
                    }
                }
            }
            task_pending.disconnect_all().await;
        });

        Ok(Self {
            request_timeout: options.request_timeout.unwrap_or(DEFAULT_REQUEST_TIMEOUT),
            child: Some(child),
            stdin,
            pending,
            reader_task: Some(reader_task),
        })
    }

    async fn write_line(&mut self, payload: &Value) -> Result<(), ToolListError> {
        if self
            .reader_task
            .as_ref()
            .map(|task| task.is_finished())
            .unwrap_or(true)
        {
            return Err(ToolListError::Request(
                "stdio server has exited".to_string(),
            ));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| ToolListError::Request("connection is closed".to_string()))?;
        let mut line = payload.to_string();
        line.push('\n');
        stdin
            .write_all(line.as_bytes())
            .await
            .map_err(|err| ToolListError::Request(format!("Failed to write to child: {err}")))?;
        stdin
            .flush()
            .await
            .map_err(|err| ToolListError::Request(format!("Failed to flush child stdin: {err}")))
    }
}

#[async_trait]
impl Connection for StdioTransport {
    async fn send_request(&mut self, request: &Value) -> Result<Value, ToolListError> {
        let id_key = request_id_key(request)?;
        let rx = self.pending.register(&id_key).await;

        if let Err(err) = self.write_line(request).await {
            self.pending.forget(&id_key).await;
            return Err(err);
        }

        self.pending
            .wait(&id_key, rx, self.request_timeout, "stdio")
            .await
    }

    async fn send_notification(&mut self, notification: &Value) -> Result<(), ToolListError> {
        self.write_line(notification).await
    }

    async fn close(&mut self) -> Result<(), ToolListError> {
        // Closing stdin first lets well-behaved servers exit on their own.
        self.stdin.take();
        if let Some(task) = self.reader_task.take() {
            task.abort();
            self.pending.disconnect_all().await;
        }
        if let Some(mut child) = self.child.take() {
            if let Err(err) = child.kill().await {
                tracing::debug!("Failed to stop stdio server: {err}");
            }
        }
        Ok(())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
    }
}

pub(crate) fn id_key_from_envelope(message: &Value) -> Option<String> {
    let id = message.get("id")?;
    Some(match id {
        Value::String(s) => format!("s:{s}"),
        Value::Number(n) => format!("n:{n}"),
        Value::Bool(v) => format!("b:{v}"),
        Value::Null => "null".to_string(),
        other => format!("j:{}", other),
    })
}

fn apply_headers(mut req: RequestBuilder, headers: &HashMap<String, String>) -> RequestBuilder {
    for (k, v) in headers {
        req = req.header(k, v);
    }
    req
}

fn extract_session_id(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn is_event_stream(response: &reqwest::Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("text/event-stream"))
        .unwrap_or(false)
}

async fn read_event_stream_response(
    response: reqwest::Response,
    id_key: Option<&str>,
) -> Result<Option<Value>, ToolListError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(map_http_status_error(status, body.trim()));
    }
    let Some(id_key) = id_key else {
        return Ok(None);
    };

    let stream = response.bytes_stream().eventsource();
    tokio::pin!(stream);
    while let Some(event) = stream.next().await {
        let event = event.map_err(|err| ToolListError::Request(err.to_string()))?;
        if event.data.trim().is_empty() {
            continue;
        }
        let payload = serde_json::from_str::<Value>(&event.data).map_err(|err| {
            ToolListError::Protocol(format!("Event stream data was not JSON: {err}"))
        })?;
        if payload.get("method").is_none()
            && id_key_from_envelope(&payload).as_deref() == Some(id_key)
        {
            return Ok(Some(payload));
        }
    }

    Err(ToolListError::Request(
        "Event stream ended before a response arrived".to_string(),
    ))
}

async fn parse_json_response(response: reqwest::Response) -> Result<Option<Value>, ToolListError> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(map_http_status_error(status, body.trim()));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|err| ToolListError::Request(err.to_string()))?;

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let payload = serde_json::from_slice::<Value>(&bytes)
        .map_err(|err| ToolListError::Protocol(format!("Response was not JSON: {err}")))?;
    Ok(Some(payload))
}

fn map_http_status_error(status: reqwest::StatusCode, body: &str) -> ToolListError {
    if body.is_empty() {
        ToolListError::Request(format!("HTTP {status}"))
    } else {
        ToolListError::Request(format!("HTTP {status} {body}"))
    }
}
