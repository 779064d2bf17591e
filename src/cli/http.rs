// src/cli/http.rs
// Centralized HTTP binding: many callers, flat output names, auth required

use std::sync::Arc;

use anyhow::{Context, Result};
use diagram_mcp::auth::AuthVerifier;
use diagram_mcp::config::{EnvConfig, RunMode};
use diagram_mcp::http::create_shared_client;
use diagram_mcp::tools::DispatcherSettings;
use diagram_mcp::transport::{HttpApp, dispatcher_factory};
use tokio::net::TcpListener;
use tracing::info;

use super::serve::build_generator;

pub async fn run_http_server(config: EnvConfig) -> Result<()> {
    let generator = build_generator(&config)?;

    // Discovery happens here so a bad issuer stops startup
    let verifier = AuthVerifier::from_config(&config.auth, &create_shared_client())
        .await
        .context("failed to initialise authentication")?;

    let output_dir = config.server.output_dir_for(RunMode::Http);
    tokio::fs::create_dir_all(&output_dir)
        .await
        .with_context(|| format!("failed to create output directory {}", output_dir.display()))?;

    let mut settings = DispatcherSettings::multi_tenant(output_dir.clone(), config.server.download_base());
    settings.inline_images = config.server.inline_images;
    settings.session_ttl = config.server.session_ttl;
    info!(
        output_dir = %output_dir.display(),
        download_base = %config.server.download_base(),
        inline_images = settings.inline_images,
        "Artifact storage configured"
    );

    let factory = dispatcher_factory(generator, Arc::new(settings));
    // Idle streamable sessions close once their refine state would have expired
    let app = HttpApp::new(factory, verifier, output_dir, config.server.session_ttl);

    let addr = config.server.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    app.run(listener).await?;
    Ok(())
}
