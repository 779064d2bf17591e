// src/cli/serve.rs
// Embedded stdio binding: one caller, trusted output paths

use std::sync::Arc;

use anyhow::{Context, Result};
use diagram_mcp::config::{EnvConfig, RunMode};
use diagram_mcp::generator::{GeminiImageClient, ImageGenerator};
use diagram_mcp::http::create_shared_client;
use diagram_mcp::tools::{Dispatcher, DispatcherSettings};
use diagram_mcp::transport::stdio::serve_stdio;
use tracing::info;

/// Build the generation client from validated configuration
pub fn build_generator(config: &EnvConfig) -> Result<Arc<dyn ImageGenerator>> {
    let api_key = config
        .api_key
        .clone()
        .context("GEMINI_API_KEY (or GOOGLE_API_KEY) is required")?;
    let client = GeminiImageClient::new(create_shared_client(), api_key, config.image_model.clone());
    info!(model = %client.model(), "Image generation client ready");
    Ok(Arc::new(client))
}

pub async fn run_stdio_server(config: EnvConfig) -> Result<()> {
    let generator = build_generator(&config)?;

    let mut settings = DispatcherSettings::trusted(config.server.output_dir_for(RunMode::Stdio));
    settings.inline_images = config.server.inline_images;
    settings.session_ttl = config.server.session_ttl;

    let dispatcher = Dispatcher::new(generator, Arc::new(settings), "stdio");
    serve_stdio(Arc::new(dispatcher)).await?;
    Ok(())
}
