// src/cli/mod.rs
// CLI module for diagram-mcp commands

use clap::{Parser, Subcommand};

use diagram_mcp::config::{EnvConfig, RunMode};

pub mod http;
pub mod proxy;
pub mod serve;

pub use http::run_http_server;
pub use proxy::run_proxy;
pub use serve::run_stdio_server;

#[derive(Parser)]
#[command(name = "diagram-mcp")]
#[command(about = "MCP server that turns prompts into diagram images")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve one client over stdio (default)
    Serve,

    /// Run the centralized HTTP server
    Http {
        /// Address to bind (overrides HOST)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Forward stdio tool calls to a remote HTTP server
    Proxy {
        /// Remote MCP endpoint (overrides MCP_REMOTE_URL)
        #[arg(long)]
        remote: Option<String>,
    },
}

impl Commands {
    pub fn run_mode(&self) -> RunMode {
        match self {
            Commands::Serve => RunMode::Stdio,
            Commands::Http { .. } => RunMode::Http,
            Commands::Proxy { .. } => RunMode::Proxy,
        }
    }
}

/// Validate for `mode`, logging warnings; errors abort startup
pub fn check_config(config: &EnvConfig, mode: RunMode) -> anyhow::Result<()> {
    let validation = config.validate(mode);
    for warning in &validation.warnings {
        tracing::warn!("{}", warning);
    }
    if !validation.is_valid() {
        anyhow::bail!("invalid configuration:\n{}", validation.report());
    }
    Ok(())
}
