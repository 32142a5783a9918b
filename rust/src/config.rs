use clap::{value_parser, Arg, ArgAction, ArgMatches, Command, ValueEnum};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::tool_api::{Transport, DEFAULT_PROTOCOL_VERSION};

/// Used when neither `--url`, a positional URL, nor `--stdio` is given.
pub const DEFAULT_URL: &str = "http://127.0.0.1:8000/sse";

const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConnectProtocol {
    Sse,
    Ws,
    #[value(alias = "streamableHttp")]
    StreamableHttp,
}

impl ConnectProtocol {
    pub fn transport(self) -> Transport {
        match self {
            Self::Sse => Transport::Sse,
            Self::Ws => Transport::Ws,
            Self::StreamableHttp => Transport::StreamableHttp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Debug,
    Info,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Url(String),
    Stdio(String),
}

impl Target {
    pub fn endpoint(&self) -> &str {
        match self {
            Self::Url(url) => url,
            Self::Stdio(command) => command,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListConfig {
    pub target: Target,
    pub protocol: Option<ConnectProtocol>,
    pub headers: HashMap<String, String>,
    pub env: HashMap<String, String>,
    pub protocol_version: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub timeout: Option<Duration>,
    pub log_level: LogLevel,
}

impl ListConfig {
    /// The transport to force, if any. Remote URLs otherwise infer one.
    pub fn transport(&self) -> Option<Transport> {
        match self.target {
            Target::Stdio(_) => Some(Transport::Stdio),
            Target::Url(_) => self.protocol.map(ConnectProtocol::transport),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Cli(#[from] clap::Error),
    #[error("{0}")]
    InvalidArg(String),
}

pub fn parse_cli_command() -> Result<ListConfig, ConfigError> {
    let raw_args: Vec<String> = env::args().collect();
    parse_config_from(raw_args)
}

fn parse_config_from(raw_args: Vec<String>) -> Result<ListConfig, ConfigError> {
    let matches = build_cli().try_get_matches_from(raw_args)?;

    let target = parse_target(&matches)?;

    let protocol = matches.get_one::<ConnectProtocol>("protocol").copied();
    let env_values = collect_values(&matches, "env");
    let header_values = collect_values(&matches, "header");
    let oauth2_bearer = matches.get_one::<String>("oauth2Bearer").cloned();
    if matches!(target, Target::Stdio(_)) {
        if protocol.is_some() {
            return Err(ConfigError::InvalidArg(
                "--protocol is only supported for remote URLs".to_string(),
            ));
        }
        if !header_values.is_empty() || oauth2_bearer.is_some() {
            return Err(ConfigError::InvalidArg(
                "--header and --oauth2Bearer are only supported for remote URLs".to_string(),
            ));
        }
    } else if !env_values.is_empty() {
        return Err(ConfigError::InvalidArg(
            "--env is only supported together with --stdio".to_string(),
        ));
    }

    let headers = parse_headers(&header_values, oauth2_bearer.as_deref())?;
    let env = parse_env_values(&env_values)?;

    let protocol_version = matches
        .get_one::<String>("protocolVersion")
        .cloned()
        .unwrap_or_else(|| DEFAULT_PROTOCOL_VERSION.to_string());
    let log_level = matches
        .get_one::<LogLevel>("logLevel")
        .copied()
        .unwrap_or(LogLevel::Info);

    let connect_timeout = millis_arg(&matches, "connectTimeout")
        .unwrap_or(Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS));
    let request_timeout = millis_arg(&matches, "requestTimeout")
        .unwrap_or(Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS));
    let timeout = millis_arg(&matches, "timeout");

    Ok(ListConfig {
        target,
        protocol,
        headers,
        env,
        protocol_version,
        connect_timeout,
        request_timeout,
        timeout,
        log_level,
    })
}

fn parse_target(matches: &ArgMatches) -> Result<Target, ConfigError> {
    let url_flag = matches.get_one::<String>("url").cloned();
    let url_positional = matches.get_one::<String>("target").cloned();
    let stdio = matches.get_one::<String>("stdio").cloned();

    if let Some(command) = stdio {
        if command.trim().is_empty() {
            return Err(ConfigError::InvalidArg(
                "--stdio requires a non-empty command".to_string(),
            ));
        }
        return Ok(Target::Stdio(command));
    }

    let url = url_flag
        .or(url_positional)
        .unwrap_or_else(|| DEFAULT_URL.to_string());
    let url = url.trim().to_string();
    if url.is_empty() {
        return Err(ConfigError::InvalidArg("--url cannot be empty".to_string()));
    }
    Ok(Target::Url(url))
}

fn build_cli() -> Command {
    Command::new("mcplist")
        .about("List the tools exposed by an MCP server")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("target")
                .value_name("URL")
                .help("MCP server URL (same as --url)"),
        )
        .arg(
            Arg::new("url")
                .long("url")
                .value_name("URL")
                .conflicts_with("target")
                .help(format!("MCP server URL [default: {DEFAULT_URL}]")),
        )
        .arg(
            Arg::new("stdio")
                .long("stdio")
                .value_name("CMD")
                .conflicts_with_all(["target", "url"])
                .help("Spawn a stdio MCP server command instead of connecting to a URL"),
        )
        .arg(
            Arg::new("env")
                .long("env")
                .action(ArgAction::Append)
                .value_name("KEY=VALUE")
                .help("Environment variable for the --stdio command (repeatable)"),
        )
        .arg(
            Arg::new("protocol")
                .long("protocol")
                .value_parser(clap::builder::EnumValueParser::<ConnectProtocol>::new())
                .value_name("sse|streamable-http|ws")
                .help("Force a transport instead of inferring it from the URL"),
        )
        .arg(
            Arg::new("header")
                .long("header")
                .action(ArgAction::Append)
                .value_name("HEADER")
                .help("Extra request header as 'Name: value' (repeatable)"),
        )
        .arg(
            Arg::new("oauth2Bearer")
                .long("oauth2Bearer")
                .value_name("TOKEN"),
        )
        .arg(
            Arg::new("protocolVersion")
                .long("protocolVersion")
                .default_value(DEFAULT_PROTOCOL_VERSION),
        )
        .arg(
            Arg::new("connectTimeout")
                .long("connect-timeout")
                .value_name("MILLISECONDS")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("requestTimeout")
                .long("request-timeout")
                .value_name("MILLISECONDS")
                .value_parser(value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .value_name("MILLISECONDS")
                .value_parser(value_parser!(u64).range(1..))
                .help("Overall deadline for connecting and listing"),
        )
        .arg(
            Arg::new("logLevel")
                .long("logLevel")
                .value_parser(clap::builder::EnumValueParser::<LogLevel>::new())
                .default_value("info"),
        )
}

fn collect_values(matches: &ArgMatches, key: &str) -> Vec<String> {
    matches
        .get_many::<String>(key)
        .map(|vals| vals.map(|v| v.to_string()).collect())
        .unwrap_or_default()
}

fn millis_arg(matches: &ArgMatches, key: &str) -> Option<Duration> {
    matches.get_one::<u64>(key).copied().map(Duration::from_millis)
}

fn parse_headers(
    header_values: &[String],
    oauth2_bearer: Option<&str>,
) -> Result<HashMap<String, String>, ConfigError> {
    let mut headers: HashMap<String, String> = HashMap::new();
    for raw in header_values {
        let Some((key, value)) = raw.split_once(':') else {
            return Err(ConfigError::InvalidArg(format!(
                "Invalid header format: {raw}, expected 'Name: value'"
            )));
        };
        let key = key.trim();
        let value = value.trim();
        if key.is_empty() || value.is_empty() {
            return Err(ConfigError::InvalidArg(format!(
                "Invalid header format: {raw}, expected 'Name: value'"
            )));
        }
        headers.insert(key.to_string(), value.to_string());
    }
    if let Some(token) = oauth2_bearer {
        let token = token.trim();
        if !token.is_empty() {
            headers.insert("Authorization".to_string(), format!("Bearer {token}"));
        }
    }
    Ok(headers)
}

fn parse_env_values(values: &[String]) -> Result<HashMap<String, String>, ConfigError> {
    let mut env_map = HashMap::new();
    for raw in values {
        let Some((key, value)) = raw.split_once('=') else {
            return Err(ConfigError::InvalidArg(format!(
                "Invalid env format: {raw}, expected KEY=VALUE"
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ConfigError::InvalidArg(format!(
                "Invalid env format: {raw}, expected KEY=VALUE"
            )));
        }
        env_map.insert(key.to_string(), value.to_string());
    }
    Ok(env_map)
}
