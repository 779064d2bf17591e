// src/http.rs
// Shared HTTP client for all outbound network operations

use std::time::Duration;

/// Default request timeout (image generation can take a while at 4K)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Default connect timeout
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Create the shared HTTP client with appropriate defaults.
///
/// Created once at startup and handed to the generation client and the OIDC
/// verifier. Uses connection pooling internally.
pub fn create_shared_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(10)
        .user_agent(concat!("diagram-mcp/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}
