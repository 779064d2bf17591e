// src/cli/proxy.rs
// Forwarding proxy: stdio in, remote HTTP server out

use std::sync::Arc;

use anyhow::{Context, Result};
use diagram_mcp::config::EnvConfig;
use diagram_mcp::tools::RemoteTools;
use diagram_mcp::transport::stdio::serve_stdio;
use tracing::info;

pub async fn run_proxy(config: EnvConfig) -> Result<()> {
    let url = config
        .proxy
        .remote_url
        .clone()
        .context("MCP_REMOTE_URL is required in proxy mode")?;
    let remote = RemoteTools::new(url, config.proxy.remote_token.clone());
    info!(remote = %remote.url(), "Forwarding tool calls");
    serve_stdio(Arc::new(remote)).await?;
    Ok(())
}
