// src/transport/stdio.rs
// Single-client binding over stdin/stdout

use std::sync::Arc;

use tracing::info;

use super::shutdown_signal;
use crate::error::{DiagramError, Result};
use crate::mcp::DiagramServer;
use crate::tools::ImageTools;

/// Serve one client on stdio until it disconnects or a signal arrives
pub async fn serve_stdio(tools: Arc<dyn ImageTools>) -> Result<()> {
    let server = DiagramServer::new(tools);
    let transport = rmcp::transport::io::stdio();
    let service = rmcp::serve_server(server, transport)
        .await
        .map_err(|e| DiagramError::Other(format!("MCP handshake failed: {}", e)))?;

    tokio::select! {
        result = service.waiting() => {
            result.map_err(|e| DiagramError::Other(format!("MCP service failed: {}", e)))?;
            info!("Client disconnected");
        }
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
        }
    }
    Ok(())
}
