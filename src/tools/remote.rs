// src/tools/remote.rs
// Forwarding binding: re-issue tool calls against a centralized HTTP instance

use std::borrow::Cow;
use std::time::Duration;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParams, CallToolResult, ClientInfo};
use rmcp::service::{Peer, RunningService};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::{RoleClient, serve_client};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::ImageTools;
use crate::http::DEFAULT_TIMEOUT;
use crate::mcp::requests::{GenerateImageRequest, RefineImageRequest};
use crate::mcp::responses;

/// A live client session with the remote server
struct RemoteConnection {
    peer: Peer<RoleClient>,
    /// Dropping this closes the remote session
    _service: RunningService<RoleClient, ClientInfo>,
}

/// Tool implementation that forwards every call to a remote server.
///
/// Holds no session state of its own; refinement state lives in the remote
/// session, which stays open for as long as this connection does.
pub struct RemoteTools {
    url: String,
    token: Option<String>,
    call_timeout: Duration,
    connection: Mutex<Option<RemoteConnection>>,
}

impl RemoteTools {
    pub fn new(url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            url: url.into(),
            token,
            // Remote generation has its own timeout; allow for retries on top
            call_timeout: DEFAULT_TIMEOUT * 2,
            connection: Mutex::new(None),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self) -> Result<RemoteConnection, String> {
        let client_info = ClientInfo {
            meta: None,
            protocol_version: Default::default(),
            capabilities: Default::default(),
            client_info: rmcp::model::Implementation {
                name: "diagram-mcp-proxy".into(),
                title: Some("diagram-mcp forwarding proxy".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
        };

        let mut config = StreamableHttpClientTransportConfig::with_uri(self.url.as_str());
        if let Some(token) = &self.token {
            config = config.auth_header(token.clone());
        }
        let transport = StreamableHttpClientTransport::from_config(config);
        let service = serve_client(client_info, transport)
            .await
            .map_err(|e| format!("Failed to connect to remote server {}: {}", self.url, e))?;

        info!(url = %self.url, "Connected to remote server");
        Ok(RemoteConnection {
            peer: service.peer().clone(),
            _service: service,
        })
    }

    /// Peer for the current connection, connecting on first use
    async fn peer(&self) -> Result<Peer<RoleClient>, String> {
        let mut connection = self.connection.lock().await;
        if let Some(existing) = connection.as_ref() {
            return Ok(existing.peer.clone());
        }
        let fresh = self.connect().await?;
        let peer = fresh.peer.clone();
        *connection = Some(fresh);
        Ok(peer)
    }

    async fn reset(&self) {
        if self.connection.lock().await.take().is_some() {
            debug!(url = %self.url, "Dropped remote connection");
        }
    }

    /// Forward one call and hand back the remote result unchanged
    pub async fn forward<T: Serialize>(&self, tool: &'static str, args: &T) -> CallToolResult {
        let arguments = match serde_json::to_value(args) {
            Ok(serde_json::Value::Object(map)) => Some(map),
            Ok(_) => None,
            Err(e) => return responses::error_result(format!("Failed to encode arguments: {}", e)),
        };

        let peer = match self.peer().await {
            Ok(peer) => peer,
            Err(message) => {
                warn!(url = %self.url, error = %message, "Remote connection failed");
                return responses::error_result(message);
            }
        };

        debug!(tool, url = %self.url, "Forwarding tool call");
        let call = peer.call_tool(CallToolRequestParams {
            meta: None,
            name: Cow::Borrowed(tool),
            arguments,
            task: None,
        });

        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!(tool, error = %e, "Remote call failed");
                self.reset().await;
                responses::error_result(format!("Remote server returned an invalid response: {}", e))
            }
            Err(_) => {
                warn!(tool, "Remote call timed out");
                self.reset().await;
                responses::error_result(format!(
                    "Remote server did not respond within {}s",
                    self.call_timeout.as_secs()
                ))
            }
        }
    }
}

#[async_trait]
impl ImageTools for RemoteTools {
    async fn generate_image(&self, request: GenerateImageRequest) -> CallToolResult {
        self.forward("generate_image", &request).await
    }

    async fn refine_image(&self, request: RefineImageRequest) -> CallToolResult {
        self.forward("refine_image", &request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_remote_is_error_result() {
        let remote = RemoteTools::new("http://127.0.0.1:1/mcp", Some("secret".into()));
        let result = remote.generate_image(GenerateImageRequest::new("a timeline")).await;
        assert_eq!(result.is_error, Some(true));
        assert!(responses::result_text(&result).contains("127.0.0.1:1"));
    }
}
