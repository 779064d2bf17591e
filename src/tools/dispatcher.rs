// src/tools/dispatcher.rs
// Per-connection tool dispatcher: classify, generate, persist, remember

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rmcp::model::CallToolResult;
use tracing::{info, warn};

use super::{ArtifactDescriptor, ImageTools, InlineImage, ToolOutcome};
use crate::analyzer::{self, Overrides};
use crate::generator::{GenerationError, GenerationRequest, ImageGenerator, detect_image_format};
use crate::mcp::requests::{GenerateImageRequest, RefineImageRequest};
use crate::mcp::responses;
use crate::output::{self, PathPolicy};
use crate::session::{DEFAULT_SESSION_TTL, Session, SessionStore};

/// Deployment-level settings shared by every dispatcher in a process
#[derive(Debug, Clone)]
pub struct DispatcherSettings {
    pub output_dir: PathBuf,
    pub path_policy: PathPolicy,
    /// Base URL for `/files/{name}` links; `None` when files are not served
    pub download_base: Option<String>,
    pub inline_images: bool,
    pub session_ttl: Duration,
}

impl DispatcherSettings {
    /// Embedded single-caller settings
    pub fn trusted(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            path_policy: PathPolicy::Trusted,
            download_base: None,
            inline_images: true,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }

    /// Multi-tenant settings serving downloads from `download_base`
    pub fn multi_tenant(output_dir: impl Into<PathBuf>, download_base: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            path_policy: PathPolicy::FlatOnly,
            download_base: Some(download_base.into()),
            inline_images: true,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }

    fn download_url(&self, path: &Path) -> Option<String> {
        let base = self.download_base.as_ref()?;
        let name = path.file_name()?.to_str()?;
        Some(format!("{}/files/{}", base.trim_end_matches('/'), name))
    }
}

/// Typed generate parameters after wire parsing
#[derive(Debug, Clone, Default)]
pub struct GenerateParams {
    pub prompt: String,
    pub output: Option<String>,
    pub overrides: Overrides,
}

/// Binds the tool contracts to one caller's session state.
///
/// One instance per logical connection; the session store is owned here and
/// never shared with another connection.
pub struct Dispatcher {
    generator: Arc<dyn ImageGenerator>,
    settings: Arc<DispatcherSettings>,
    session_key: String,
    sessions: Mutex<SessionStore>,
}

impl Dispatcher {
    pub fn new(
        generator: Arc<dyn ImageGenerator>,
        settings: Arc<DispatcherSettings>,
        session_key: impl Into<String>,
    ) -> Self {
        let ttl = settings.session_ttl;
        Self {
            generator,
            settings,
            session_key: session_key.into(),
            sessions: Mutex::new(SessionStore::new(ttl)),
        }
    }

    fn store(&self) -> MutexGuard<'_, SessionStore> {
        // A panic mid-update leaves nothing half-written; keep using the store
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Snapshot of the live session, if any
    pub fn current_session(&self) -> Option<Session> {
        self.store().get(&self.session_key).cloned()
    }

    /// Classify, generate and remember a new artifact
    pub async fn generate(&self, params: GenerateParams) -> ToolOutcome {
        let prompt = params.prompt.trim();
        if prompt.is_empty() {
            return ToolOutcome::Failed("prompt must not be empty".to_string());
        }

        let classification = analyzer::classify(prompt, &params.overrides);
        if let Some(question) = classification.clarifying_question() {
            info!(
                session = %self.session_key,
                confidence = %classification.confidence,
                "Prompt too ambiguous, asking for a type"
            );
            return ToolOutcome::Clarify(question.to_string());
        }

        let path = output::resolve_output_path(
            &self.settings.output_dir,
            params.output.as_deref(),
            prompt,
            self.settings.path_policy,
        );
        let request = GenerationRequest {
            prompt: analyzer::enhance_prompt(
                prompt,
                classification.category,
                classification.aspect_ratio,
                classification.resolution,
            ),
            aspect_ratio: classification.aspect_ratio,
            resolution: classification.resolution,
        };

        let session = Session {
            prompt: prompt.to_string(),
            artifact: path,
            category: classification.category,
            aspect_ratio: classification.aspect_ratio,
            resolution: classification.resolution,
            created_at: Instant::now(),
        };
        self.produce(request, session, false, classification.suggestions().to_vec())
            .await
    }

    /// Apply a delta to the last artifact, inheriting its composition
    pub async fn refine(&self, refinement: &str) -> ToolOutcome {
        let refinement = refinement.trim();
        if refinement.is_empty() {
            return ToolOutcome::Failed("refinement must not be empty".to_string());
        }

        let Some(previous) = self.current_session() else {
            info!(session = %self.session_key, "Refine requested without a prior image");
            return ToolOutcome::NoPriorSession;
        };

        let prompt = refinement_prompt(&previous.prompt, refinement);
        let request = GenerationRequest {
            prompt: analyzer::enhance_prompt(
                &prompt,
                previous.category,
                previous.aspect_ratio,
                previous.resolution,
            ),
            aspect_ratio: previous.aspect_ratio,
            resolution: previous.resolution,
        };
        let session = Session {
            prompt,
            artifact: output::refined_path(&previous.artifact),
            category: previous.category,
            aspect_ratio: previous.aspect_ratio,
            resolution: previous.resolution,
            created_at: Instant::now(),
        };
        self.produce(request, session, true, Vec::new()).await
    }

    /// Call the generator, validate and save the bytes, then replace the session
    async fn produce(
        &self,
        request: GenerationRequest,
        mut session: Session,
        refined: bool,
        suggestions: Vec<String>,
    ) -> ToolOutcome {
        let bytes = match self.generator.generate(&request).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(session = %self.session_key, error = %e, "Image generation failed");
                return ToolOutcome::Failed(failure_message(&e));
            }
        };

        let Some(format) = detect_image_format(&bytes) else {
            let e = GenerationError::InvalidOutput("response is not a PNG, JPEG or WebP image".into());
            warn!(session = %self.session_key, size = bytes.len(), "Discarding malformed image data");
            return ToolOutcome::Failed(failure_message(&e));
        };

        if let Err(e) = save(&session.artifact, &bytes).await {
            warn!(path = %session.artifact.display(), error = %e, "Failed to save image");
            return ToolOutcome::Failed(format!(
                "Failed to save image to {}: {}",
                session.artifact.display(),
                e
            ));
        }

        info!(
            session = %self.session_key,
            path = %session.artifact.display(),
            category = %session.category,
            refined,
            "Image saved"
        );

        let descriptor = ArtifactDescriptor {
            path: session.artifact.clone(),
            category: session.category,
            aspect_ratio: session.aspect_ratio,
            resolution: session.resolution,
            download_url: self.settings.download_url(&session.artifact),
            inline_image: self.settings.inline_images.then(|| InlineImage {
                mime_type: format.mime_type(),
                bytes,
            }),
            refined,
            suggestions,
        };
        // TTL runs from when the artifact exists, not from when the call began
        session.created_at = Instant::now();
        self.store().put(&self.session_key, session);
        ToolOutcome::Generated(descriptor)
    }
}

#[async_trait]
impl ImageTools for Dispatcher {
    async fn generate_image(&self, request: GenerateImageRequest) -> CallToolResult {
        let overrides = match request.overrides() {
            Ok(overrides) => overrides,
            Err(message) => return responses::error_result(message),
        };
        let outcome = self
            .generate(GenerateParams {
                prompt: request.prompt,
                output: request.output,
                overrides,
            })
            .await;
        responses::outcome_to_result(outcome)
    }

    async fn refine_image(&self, request: RefineImageRequest) -> CallToolResult {
        responses::outcome_to_result(self.refine(&request.refinement).await)
    }
}

/// Prior prompt plus an explicit instruction block for the delta
pub fn refinement_prompt(previous: &str, refinement: &str) -> String {
    format!(
        "{}\n\nREFINEMENT INSTRUCTIONS:\nKeep the overall design, layout, style and colours of the previous image. Apply only the following change: {}",
        previous, refinement
    )
}

fn failure_message(error: &GenerationError) -> String {
    match error {
        GenerationError::Quota(_) => {
            format!("Image generation failed: {}. Wait for the quota to reset and try again.", error)
        }
        GenerationError::InvalidCredential(_) => {
            format!("Image generation failed: {}. Check the configured API key.", error)
        }
        _ => format!("Image generation failed: {}", error),
    }
}

async fn save(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, bytes).await
}
