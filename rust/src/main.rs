use mcplist::config::{parse_cli_command, ConfigError};
use mcplist::connect;

#[tokio::main]
async fn main() {
    let config = match parse_cli_command() {
        Ok(config) => config,
        Err(ConfigError::Cli(err)) if !err.use_stderr() => err.exit(),
        Err(ConfigError::Cli(err)) => {
            let _ = err.print();
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("[mcplist] Error: {err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = connect::run(config).await {
        eprintln!("[mcplist] Error: {err}");
        std::process::exit(1);
    }
}
