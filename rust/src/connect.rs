use std::io::Write;

use tokio::time::Instant;

use crate::config::{ListConfig, Target};
use crate::output::write_tools;
use crate::support::telemetry::init_telemetry;
use crate::tool_api::{fetch_tools, Connector, ToolListError, TransportConnector, TransportOptions};

/// Lists the tools of the configured server on stdout.
pub async fn run(config: ListConfig) -> Result<(), ToolListError> {
    init_telemetry(config.log_level);

    let connector = connector_for(&config);
    let mut stdout = std::io::stdout();
    run_with(&connector, &config, &mut stdout).await?;
    Ok(())
}

/// Connects through `connector`, lists once and writes the tools to `out`.
///
/// Nothing is written unless listing fully succeeded. Returns the number of
/// tools written.
pub async fn run_with<W: Write>(
    connector: &dyn Connector,
    config: &ListConfig,
    out: &mut W,
) -> Result<usize, ToolListError> {
    let endpoint = config.target.endpoint();
    tracing::info!("Connecting to MCP server: {endpoint}");
    tracing::debug!(
        "  - transport: {}",
        config
            .transport()
            .map(|transport| transport.as_str())
            .unwrap_or("inferred")
    );
    tracing::debug!("  - protocolVersion: {}", config.protocol_version);

    let deadline = config.timeout.map(|timeout| Instant::now() + timeout);
    let tools = fetch_tools(connector, endpoint, &config.protocol_version, deadline).await?;
    tracing::info!("Server reported {} tool(s)", tools.len());

    write_tools(out, &tools)?;
    Ok(tools.len())
}

pub fn connector_for(config: &ListConfig) -> TransportConnector {
    let env = match config.target {
        Target::Stdio(_) => config.env.clone(),
        Target::Url(_) => Default::default(),
    };
    TransportConnector::new(
        config.transport(),
        TransportOptions {
            headers: config.headers.clone(),
            env,
            connect_timeout: config.connect_timeout,
            request_timeout: Some(config.request_timeout),
        },
    )
}
