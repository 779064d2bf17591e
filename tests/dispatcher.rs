// tests/dispatcher.rs
// Dispatcher behaviour against a recording fake generator


use std::sync::Arc;

use diagram_mcp::analyzer::{AspectRatio, Category, Overrides, Resolution};
use diagram_mcp::generator::GenerationError;
use diagram_mcp::mcp::requests::{GenerateImageRequest, RefineImageRequest};
use diagram_mcp::mcp::responses::{NO_PRIOR_SESSION, result_text};
use diagram_mcp::tools::dispatcher::GenerateParams;
use diagram_mcp::tools::{Dispatcher, DispatcherSettings, ImageTools, ToolOutcome};
use tempfile::TempDir;
use test_utils::{FakeGenerator, PNG_BYTES, trusted_dispatcher};

const CLEAR_PROMPT: &str = "Compare latency: 450ms before vs 120ms after";
const VAGUE_PROMPT: &str = "Create a nice visual for my presentation";

fn params(prompt: &str) -> GenerateParams {
    GenerateParams {
        prompt: prompt.to_string(),
        ..Default::default()
    }
}

fn generated(outcome: ToolOutcome) -> diagram_mcp::tools::ArtifactDescriptor {
    match outcome {
        ToolOutcome::Generated(artifact) => artifact,
        other => panic!("expected a generated artifact, got {:?}", other),
    }
}

// ============================================================================
// Generate
// ============================================================================

#[tokio::test]
async fn test_generate_saves_and_remembers() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    let dispatcher = trusted_dispatcher(generator.clone(), dir.path(), "s1");

    let artifact = generated(dispatcher.generate(params(CLEAR_PROMPT)).await);
    assert_eq!(artifact.category, Category::Comparison);
    assert_eq!(artifact.aspect_ratio, AspectRatio::Wide);
    assert!(artifact.path.starts_with(dir.path()));
    assert_eq!(std::fs::read(&artifact.path).unwrap(), PNG_BYTES);
    assert!(artifact.inline_image.is_some());
    assert_eq!(artifact.download_url, None);

    let calls = generator.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].prompt.ends_with(CLEAR_PROMPT));
    assert_eq!(calls[0].aspect_ratio, AspectRatio::Wide);

    let session = dispatcher.current_session().unwrap();
    assert_eq!(session.prompt, CLEAR_PROMPT);
    assert_eq!(session.artifact, artifact.path);
}

#[tokio::test]
async fn test_low_confidence_asks_without_generating() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    let dispatcher = trusted_dispatcher(generator.clone(), dir.path(), "s1");

    let outcome = dispatcher.generate(params(VAGUE_PROMPT)).await;
    let ToolOutcome::Clarify(question) = outcome else {
        panic!("expected a clarifying question");
    };
    assert!(question.contains("architecture"));
    assert_eq!(generator.call_count(), 0);
    assert!(dispatcher.current_session().is_none());
}

#[tokio::test]
async fn test_override_skips_clarification() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    let dispatcher = trusted_dispatcher(generator.clone(), dir.path(), "s1");

    let outcome = dispatcher
        .generate(GenerateParams {
            prompt: VAGUE_PROMPT.to_string(),
            output: None,
            overrides: Overrides {
                category: Some(Category::Concept),
                aspect_ratio: None,
                resolution: Some(Resolution::Small),
            },
        })
        .await;
    let artifact = generated(outcome);
    assert_eq!(artifact.category, Category::Concept);
    assert_eq!(artifact.resolution, Resolution::Small);
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn test_empty_prompt_fails() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    let dispatcher = trusted_dispatcher(generator.clone(), dir.path(), "s1");

    assert!(matches!(dispatcher.generate(params("   ")).await, ToolOutcome::Failed(_)));
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_generation_failure_keeps_previous_session() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    let dispatcher = trusted_dispatcher(generator.clone(), dir.path(), "s1");

    let first = generated(dispatcher.generate(params(CLEAR_PROMPT)).await);

    generator.set_response(Err(GenerationError::Quota("daily limit".into())));
    let outcome = dispatcher
        .generate(params("system architecture with api gateway and load balancer"))
        .await;
    let ToolOutcome::Failed(message) = outcome else {
        panic!("expected failure");
    };
    assert!(message.contains("quota"));

    let session = dispatcher.current_session().unwrap();
    assert_eq!(session.artifact, first.path);
    assert_eq!(session.prompt, CLEAR_PROMPT);
}

#[tokio::test]
async fn test_malformed_bytes_are_not_saved() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::with_response(Ok(b"<html>not an image</html>".to_vec()));
    let dispatcher = trusted_dispatcher(generator.clone(), dir.path(), "s1");

    let outcome = dispatcher
        .generate(GenerateParams {
            prompt: CLEAR_PROMPT.to_string(),
            output: Some("latency.png".to_string()),
            overrides: Overrides::default(),
        })
        .await;
    assert!(matches!(outcome, ToolOutcome::Failed(_)));
    assert!(!dir.path().join("latency.png").exists());
    assert!(dispatcher.current_session().is_none());
}

// ============================================================================
// Refine
// ============================================================================

#[tokio::test]
async fn test_refine_without_session_gives_guidance() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    let dispatcher = trusted_dispatcher(generator.clone(), dir.path(), "s1");

    assert_eq!(dispatcher.refine("make it blue").await, ToolOutcome::NoPriorSession);
    assert_eq!(generator.call_count(), 0);

    let result = dispatcher
        .refine_image(RefineImageRequest {
            refinement: "make it blue".to_string(),
        })
        .await;
    assert_ne!(result.is_error, Some(true));
    assert_eq!(result_text(&result), NO_PRIOR_SESSION);
}

#[tokio::test]
async fn test_refine_chain_writes_new_files_and_accumulates_prompt() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    let dispatcher = trusted_dispatcher(generator.clone(), dir.path(), "s1");

    let original = generated(dispatcher.generate(params(CLEAR_PROMPT)).await);
    let first = generated(dispatcher.refine("use a red palette").await);
    let second = generated(dispatcher.refine("add a title").await);

    assert!(first.refined && second.refined);
    assert_ne!(first.path, original.path);
    assert_ne!(second.path, first.path);
    assert!(original.path.exists() && first.path.exists() && second.path.exists());

    // Composition is inherited, never reclassified
    assert_eq!(second.category, Category::Comparison);
    assert_eq!(second.aspect_ratio, AspectRatio::Wide);

    let calls = generator.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[2].prompt.contains(CLEAR_PROMPT));
    assert!(calls[2].prompt.contains("use a red palette"));
    assert!(calls[2].prompt.contains("add a title"));

    let session = dispatcher.current_session().unwrap();
    assert_eq!(session.artifact, second.path);
}

#[tokio::test]
async fn test_refine_expired_session_is_absent() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    let mut settings = DispatcherSettings::trusted(dir.path());
    settings.session_ttl = std::time::Duration::ZERO;
    let dispatcher = Dispatcher::new(generator.clone(), Arc::new(settings), "s1");

    generated(dispatcher.generate(params(CLEAR_PROMPT)).await);
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    assert_eq!(dispatcher.refine("add a title").await, ToolOutcome::NoPriorSession);
    assert_eq!(generator.call_count(), 1);
}

#[tokio::test]
async fn test_session_ttl_counts_from_saved_artifact() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    generator.set_delay(std::time::Duration::from_millis(300));
    let mut settings = DispatcherSettings::trusted(dir.path());
    settings.session_ttl = std::time::Duration::from_millis(200);
    let dispatcher = Dispatcher::new(generator.clone(), Arc::new(settings), "s1");

    // Generation outlasts the TTL; the session must still be fresh afterwards
    generated(dispatcher.generate(params(CLEAR_PROMPT)).await);
    assert!(dispatcher.current_session().is_some());
}

// ============================================================================
// Isolation and confinement
// ============================================================================

#[tokio::test]
async fn test_dispatchers_do_not_share_sessions() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    let settings = Arc::new(DispatcherSettings::multi_tenant(dir.path(), "http://localhost:8000"));
    let alice = Dispatcher::new(generator.clone(), settings.clone(), "alice");
    let bob = Dispatcher::new(generator.clone(), settings, "bob");

    let a = generated(alice.generate(params(CLEAR_PROMPT)).await);
    let b = generated(bob.generate(params(CLEAR_PROMPT)).await);
    assert_ne!(a.path, b.path);

    let refined = generated(alice.refine("add a title").await);
    assert_eq!(alice.current_session().unwrap().artifact, refined.path);
    assert_eq!(bob.current_session().unwrap().artifact, b.path);

    let carol = Dispatcher::new(generator, Arc::new(DispatcherSettings::trusted(dir.path())), "carol");
    assert_eq!(carol.refine("add a title").await, ToolOutcome::NoPriorSession);
}

#[tokio::test]
async fn test_multi_tenant_output_is_flat() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    let settings = Arc::new(DispatcherSettings::multi_tenant(dir.path(), "https://img.example.com/"));
    let dispatcher = Dispatcher::new(generator, settings, "s1");

    let artifact = generated(
        dispatcher
            .generate(GenerateParams {
                prompt: CLEAR_PROMPT.to_string(),
                output: Some("../../etc/evil.png".to_string()),
                overrides: Overrides::default(),
            })
            .await,
    );
    assert_eq!(artifact.path, dir.path().join("evil.png"));
    assert_eq!(
        artifact.download_url.as_deref(),
        Some("https://img.example.com/files/evil.png")
    );
}

#[tokio::test]
async fn test_inline_images_can_be_disabled() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    let mut settings = DispatcherSettings::trusted(dir.path());
    settings.inline_images = false;
    let dispatcher = Dispatcher::new(generator, Arc::new(settings), "s1");

    let result = dispatcher.generate_image(GenerateImageRequest::new(CLEAR_PROMPT)).await;
    assert_ne!(result.is_error, Some(true));
    assert_eq!(result.content.len(), 1);
    assert!(result_text(&result).contains("Generated comparison image"));
}

#[tokio::test]
async fn test_invalid_override_is_rejected_before_generation() {
    let dir = TempDir::new().unwrap();
    let generator = FakeGenerator::png();
    let dispatcher = trusted_dispatcher(generator.clone(), dir.path(), "s1");

    let mut request = GenerateImageRequest::new(CLEAR_PROMPT);
    request.aspect_ratio = Some("5:4".to_string());
    let result = dispatcher.generate_image(request).await;
    assert_eq!(result.is_error, Some(true));
    assert!(result_text(&result).contains("16:9"));
    assert_eq!(generator.call_count(), 0);
}
