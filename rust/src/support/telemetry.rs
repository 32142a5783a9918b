use std::io::IsTerminal;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LogLevel;

/// Installs the stderr log subscriber. Stdout stays reserved for tool lines.
///
/// `RUST_LOG` takes precedence over `--logLevel` when it is set.
pub fn init_telemetry(log_level: LogLevel) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    let result = tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(std::io::stderr().is_terminal())
                .with_target(false),
        )
        .try_init();

    if let Err(err) = result {
        eprintln!("[mcplist] Failed to initialize logging: {err}");
    }
}

fn default_directive(log_level: LogLevel) -> &'static str {
    match log_level {
        LogLevel::Debug => "mcplist=debug",
        LogLevel::Info => "mcplist=info",
        LogLevel::None => "off",
    }
}
