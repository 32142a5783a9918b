mod builder;
mod client;
mod error;
mod transport;

pub use builder::{ToolClientBuilder, DEFAULT_PROTOCOL_VERSION};
pub use client::{fetch_tools, ToolDescriptor, ToolSession};
pub use error::ToolListError;
pub use transport::{Connection, Connector, Transport, TransportConnector, TransportOptions};
