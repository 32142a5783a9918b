use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolListError {
    /// The endpoint was malformed, unreachable, or rejected the handshake.
    #[error("Failed to connect to {endpoint}: {message}")]
    Connection { endpoint: String, message: String },
    /// The connection broke, timed out, or was already closed mid-request.
    #[error("Request failed: {0}")]
    Request(String),
    /// The server answered with something that is not a usable response.
    #[error("Protocol error: {0}")]
    Protocol(String),
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

impl ToolListError {
    pub fn connection(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Re-labels a failure raised while a session was being established.
    pub(crate) fn during_connect(self, endpoint: &str) -> Self {
        match self {
            Self::Connection { .. } => self,
            Self::Request(message) | Self::Protocol(message) => {
                Self::connection(endpoint, message)
            }
            Self::Output(err) => Self::connection(endpoint, err.to_string()),
        }
    }

    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}
