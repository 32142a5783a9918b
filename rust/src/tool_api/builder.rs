use std::collections::HashMap;
use std::time::Duration;

use crate::tool_api::client::ToolSession;
use crate::tool_api::error::ToolListError;
use crate::tool_api::transport::{
    Transport, TransportConnector, TransportOptions, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_REQUEST_TIMEOUT,
};

pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

pub struct ToolClientBuilder {
    endpoint: String,
    transport: Option<Transport>,
    protocol_version: String,
    headers: HashMap<String, String>,
    env: HashMap<String, String>,
    connect_timeout: Duration,
    request_timeout: Option<Duration>,
}

impl ToolClientBuilder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            transport: None,
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            headers: HashMap::new(),
            env: HashMap::new(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Forces a transport instead of inferring it from the endpoint URL.
    pub fn transport(mut self, transport: Transport) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn protocol_version(mut self, protocol_version: impl Into<String>) -> Self {
        self.protocol_version = protocol_version.into();
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Environment for a spawned stdio server.
    pub fn env(mut self, env: HashMap<String, String>) -> Self {
        self.env.extend(env);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn connector(&self) -> TransportConnector {
        TransportConnector::new(
            self.transport,
            TransportOptions {
                headers: self.headers.clone(),
                env: self.env.clone(),
                connect_timeout: self.connect_timeout,
                request_timeout: self.request_timeout,
            },
        )
    }

    pub async fn connect(&self) -> Result<ToolSession, ToolListError> {
        if self.endpoint.trim().is_empty() {
            return Err(ToolListError::connection(
                &self.endpoint,
                "endpoint cannot be empty",
            ));
        }

        let connector = self.connector();
        ToolSession::connect(&connector, &self.endpoint, &self.protocol_version).await
    }
}
