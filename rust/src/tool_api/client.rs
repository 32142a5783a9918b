use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::tool_api::error::ToolListError;
use crate::tool_api::transport::{Connection, Connector};

pub(crate) const CLIENT_NAME: &str = "mcplist";

/// One tool advertised by a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

#[derive(Deserialize)]
struct ToolsListResult {
    tools: Vec<ListedTool>,
}

#[derive(Deserialize)]
struct ListedTool {
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// A connection on which the `initialize` handshake has completed.
pub struct ToolSession {
    endpoint: String,
    connection: Box<dyn Connection>,
    request_seq: u64,
    closed: bool,
}

impl ToolSession {
    /// Opens a connection through `connector` and performs the handshake.
    ///
    /// Every failure, including a rejected `initialize`, is reported as
    /// [`ToolListError::Connection`]. A half-open connection is closed
    /// before the error is returned.
    pub async fn connect(
        connector: &dyn Connector,
        endpoint: &str,
        protocol_version: &str,
    ) -> Result<Self, ToolListError> {
        let connection = connector
            .connect(endpoint)
            .await
            .map_err(|err| err.during_connect(endpoint))?;

        let mut session = Self {
            endpoint: endpoint.to_string(),
            connection,
            request_seq: 0,
            closed: false,
        };

        if let Err(err) = session.initialize(protocol_version).await {
            if let Err(close_err) = session.close().await {
                tracing::debug!("Close after failed handshake also failed: {close_err}");
            }
            return Err(err.during_connect(endpoint));
        }

        Ok(session)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Issues one `tools/list` request and returns the tools in server order.
    pub async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>, ToolListError> {
        let response = self.send_jsonrpc_request("tools/list", json!({})).await?;
        let tools = parse_tools_list_response(&response)?;
        tracing::debug!("tools/list returned {} tool(s)", tools.len());
        Ok(tools)
    }

    /// Releases the connection. Calling it again is a no-op.
    pub async fn close(&mut self) -> Result<(), ToolListError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        tracing::debug!("Closing connection to {}", self.endpoint);
        self.connection.close().await
    }

    async fn initialize(&mut self, protocol_version: &str) -> Result<(), ToolListError> {
        let response = self
            .send_jsonrpc_request(
                "initialize",
                json!({
                    "protocolVersion": protocol_version,
                    "capabilities": {},
                    "clientInfo": {
                        "name": CLIENT_NAME,
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            )
            .await?;

        let result = response.get("result").ok_or_else(|| {
            ToolListError::Protocol("initialize response missing result".to_string())
        })?;
        let server_name = result
            .pointer("/serverInfo/name")
            .and_then(Value::as_str)
            .unwrap_or("unknown server");
        let server_version = result
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(protocol_version);
        tracing::info!("Connected to {server_name} (protocol {server_version})");

        self.connection
            .send_notification(&json!({
                "jsonrpc": "2.0",
                "method": "notifications/initialized"
            }))
            .await
    }

    async fn send_jsonrpc_request(
        &mut self,
        method: &str,
        params: Value,
    ) -> Result<Value, ToolListError> {
        if self.closed {
            return Err(ToolListError::Request("connection is closed".to_string()));
        }

        let request = json!({
            "jsonrpc": "2.0",
            "id": self.next_request_id(),
            "method": method,
            "params": params,
        });

        let response = self.connection.send_request(&request).await?;
        ensure_no_rpc_error(method, &response)?;
        Ok(response)
    }

    fn next_request_id(&mut self) -> String {
        self.request_seq = self.request_seq.saturating_add(1);
        format!("{CLIENT_NAME}-{}", self.request_seq)
    }
}

/// Connects, lists once, and closes, all within an optional deadline.
///
/// The session is closed on every path before this returns. A deadline that
/// expires while connecting is a connection error; one that expires while
/// listing is a request error.
pub async fn fetch_tools(
    connector: &dyn Connector,
    endpoint: &str,
    protocol_version: &str,
    deadline: Option<Instant>,
) -> Result<Vec<ToolDescriptor>, ToolListError> {
    let connect = ToolSession::connect(connector, endpoint, protocol_version);
    let mut session = match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, connect)
            .await
            .map_err(|_| ToolListError::connection(endpoint, "deadline exceeded while connecting"))??,
        None => connect.await?,
    };

    let listed = match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, session.list_tools())
            .await
            .unwrap_or_else(|_| {
                Err(ToolListError::Request(
                    "deadline exceeded while listing tools".to_string(),
                ))
            }),
        None => session.list_tools().await,
    };

    if let Err(err) = session.close().await {
        tracing::warn!("Failed to close connection to {endpoint}: {err}");
    }
    listed
}

fn parse_tools_list_response(response: &Value) -> Result<Vec<ToolDescriptor>, ToolListError> {
    let result = response
        .get("result")
        .ok_or_else(|| ToolListError::Protocol("tools/list response missing result".to_string()))?;
    let listed = ToolsListResult::deserialize(result)
        .map_err(|err| ToolListError::Protocol(format!("invalid tools/list result: {err}")))?;

    listed
        .tools
        .into_iter()
        .map(|tool| match tool.name {
            Some(name) if !name.trim().is_empty() => Ok(ToolDescriptor {
                name,
                description: tool.description.unwrap_or_default(),
            }),
            _ => Err(ToolListError::Protocol(
                "tool entry missing non-empty name".to_string(),
            )),
        })
        .collect()
}

fn ensure_no_rpc_error(method: &str, response: &Value) -> Result<(), ToolListError> {
    let Some(error) = response.get("error") else {
        return Ok(());
    };

    let code = error.get("code").and_then(Value::as_i64);
    let message = error.get("message").and_then(Value::as_str);
    Err(ToolListError::Protocol(match (code, message) {
        (Some(code), Some(message)) => {
            format!("RPC method '{method}' returned error {code}: {message}")
        }
        _ => format!("RPC method '{method}' returned error: {error}"),
    }))
}
