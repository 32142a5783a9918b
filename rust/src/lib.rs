//! Connects to an MCP server, performs the handshake and lists its tools.
//!
//! [`tool_api`] holds the reusable client; [`connect`] wires it to the
//! command line.

pub mod config;
pub mod connect;
pub mod output;
pub mod support;
pub mod tool_api;
