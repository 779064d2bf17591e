// tests/proxy.rs
// Forwarding proxy driven against a live centralized HTTP server


use std::net::SocketAddr;
use std::sync::Arc;

use diagram_mcp::auth::{AuthVerifier, StaticTokenVerifier};
use diagram_mcp::mcp::requests::{GenerateImageRequest, RefineImageRequest};
use diagram_mcp::mcp::responses::{NO_PRIOR_SESSION, result_text};
use diagram_mcp::tools::{DispatcherSettings, ImageTools, RemoteTools};
use diagram_mcp::transport::streamable::DEFAULT_IDLE_TIMEOUT;
use diagram_mcp::transport::{HttpApp, dispatcher_factory};
use tempfile::TempDir;
use test_utils::FakeGenerator;
use tokio::net::TcpListener;

const TOKEN: &str = "proxy-secret";
const CLEAR_PROMPT: &str = "Compare latency: 450ms before vs 120ms after";

/// Serve a fresh HTTP app on an ephemeral port
async fn spawn_server(dir: &TempDir, generator: Arc<FakeGenerator>) -> SocketAddr {
    let settings = Arc::new(DispatcherSettings::multi_tenant(dir.path(), "http://localhost:8000"));
    let factory = dispatcher_factory(generator, settings);
    let verifier = AuthVerifier::StaticToken(StaticTokenVerifier::new(vec![TOKEN.to_string()], false).unwrap());
    let app = HttpApp::new(factory, verifier, dir.path().to_path_buf(), DEFAULT_IDLE_TIMEOUT);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn test_forwarded_generate_matches_remote_result() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    let addr = spawn_server(&dir, generator.clone()).await;

    let remote = RemoteTools::new(format!("http://{}/mcp", addr), Some(TOKEN.to_string()));
    let result = remote.generate_image(GenerateImageRequest::new(CLEAR_PROMPT)).await;
    assert_ne!(result.is_error, Some(true), "{}", result_text(&result));

    let text = result_text(&result);
    assert!(text.starts_with("Generated comparison image (16:9, 2K)"), "{text}");
    assert!(text.contains("Download: http://localhost:8000/files/"));
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn test_refine_state_survives_between_forwarded_calls() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    let addr = spawn_server(&dir, generator.clone()).await;
    let remote = RemoteTools::new(format!("http://{}/mcp", addr), Some(TOKEN.to_string()));

    let result = remote
        .refine_image(RefineImageRequest {
            refinement: "add a title".to_string(),
        })
        .await;
    assert_eq!(result_text(&result), NO_PRIOR_SESSION);

    remote.generate_image(GenerateImageRequest::new(CLEAR_PROMPT)).await;
    let result = remote
        .refine_image(RefineImageRequest {
            refinement: "add a title".to_string(),
        })
        .await;
    assert_ne!(result.is_error, Some(true), "{}", result_text(&result));
    assert!(result_text(&result).starts_with("Refined comparison image"));
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn test_wrong_token_is_error_result() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    let addr = spawn_server(&dir, generator.clone()).await;

    let remote = RemoteTools::new(format!("http://{}/mcp", addr), Some("not-the-token".to_string()));
    let result = remote.generate_image(GenerateImageRequest::new(CLEAR_PROMPT)).await;
    assert_eq!(result.is_error, Some(true));
    assert!(result_text(&result).contains(&addr.to_string()));
    assert_eq!(generator.call_count(), 0);
}
