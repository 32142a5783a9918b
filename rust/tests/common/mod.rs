#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;

pub fn find_free_port() -> u16 {
    std::net::TcpListener::bind(("127.0.0.1", 0))
        .expect("failed to bind local test port")
        .local_addr()
        .expect("failed to read local address")
        .port()
}

/// Runs the compiled binary to completion and captures its output.
pub async fn run_mcplist(args: &[&str], timeout: Duration) -> Output {
    let exe = mcplist_exe_path();

    let mut cmd = Command::new(exe);
    cmd.args(args)
        .env_remove("RUST_LOG")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tokio::time::timeout(timeout, cmd.output())
        .await
        .expect("mcplist did not exit in time")
        .expect("failed to run mcplist")
}

fn mcplist_exe_path() -> PathBuf {
    if let Ok(exe) = std::env::var("CARGO_BIN_EXE_mcplist") {
        return PathBuf::from(exe);
    }

    let current = std::env::current_exe().expect("failed to read current test binary path");
    let target_dir = current
        .parent()
        .and_then(|path| path.parent())
        .expect("failed to derive target/debug directory from test binary path");
    let fallback = target_dir.join(format!("mcplist{}", std::env::consts::EXE_SUFFIX));
    assert!(
        fallback.exists(),
        "mcplist binary not found at {}",
        fallback.display()
    );
    fallback
}

pub fn initialize_result(id: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "protocolVersion": "2024-11-05",
            "capabilities": {"tools": {}},
            "serverInfo": {"name": "stub-server", "version": "0.1.0"}
        }
    })
}

pub fn tools_list_result(id: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "tools": [
                {
                    "name": "get-weather",
                    "description": "Returns weather",
                    "inputSchema": {
                        "type": "object",
                        "properties": {"city": {"type": "string"}},
                        "required": ["city"]
                    }
                },
                {
                    "name": "echo",
                    "description": "Echoes input",
                    "inputSchema": {"type": "object"}
                }
            ]
        }
    })
}

pub fn method_not_found(id: serde_json::Value) -> serde_json::Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {"code": -32601, "message": "method not found"}
    })
}
