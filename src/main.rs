// src/main.rs
// diagram-mcp - prompt-to-diagram image generation over MCP

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use diagram_mcp::config::{EnvConfig, RunMode};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Serve);
    let mode = command.run_mode();

    // stdout carries the protocol for stdio and proxy, so keep logs quiet there
    let default_level = match mode {
        RunMode::Stdio | RunMode::Proxy => Level::WARN,
        RunMode::Http => Level::INFO,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(EnvConfig::log_level_from_env().unwrap_or(default_level))
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = EnvConfig::load();
    if let Commands::Http { host, port } = &command {
        if let Some(host) = host {
            config.server.host = host.clone();
        }
        if let Some(port) = port {
            config.server.port = *port;
            config.server.invalid_port = None;
        }
    }
    if let Commands::Proxy { remote: Some(remote) } = &command {
        config.proxy.remote_url = Some(remote.clone());
    }

    cli::check_config(&config, mode)?;

    match command {
        Commands::Serve => cli::run_stdio_server(config).await?,
        Commands::Http { .. } => cli::run_http_server(config).await?,
        Commands::Proxy { .. } => cli::run_proxy(config).await?,
    }

    Ok(())
}
