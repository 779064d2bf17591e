// src/generator/gemini.rs
// Gemini image generation client with retry on transient failures

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use super::{GenerationError, GenerationRequest, ImageGenerator};

/// Default image model
pub const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";
/// Generative Language API base URL
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Total attempts for transient failures
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Base backoff between retries (doubles each attempt)
const DEFAULT_BASE_BACKOFF: Duration = Duration::from_secs(1);

/// Client for the Gemini `generateContent` image endpoint
pub struct GeminiImageClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl GeminiImageClient {
    pub fn new(client: Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_backoff: DEFAULT_BASE_BACKOFF,
        }
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn request_body(request: &GenerationRequest) -> serde_json::Value {
        json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }]
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": {
                    "aspectRatio": request.aspect_ratio.to_string(),
                    "imageSize": request.resolution.to_string()
                }
            }
        })
    }

    async fn attempt(&self, body: &serde_json::Value) -> Result<Vec<u8>, GenerationError> {
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &error_body));
        }

        let payload: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::InvalidOutput(format!("unreadable response: {}", e)))?;
        extract_image(payload)
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError> {
        let body = Self::request_body(request);
        let mut attempts = 1;
        let mut backoff = self.base_backoff;

        debug!(
            model = %self.model,
            aspect_ratio = %request.aspect_ratio,
            resolution = %request.resolution,
            "Requesting image generation"
        );

        loop {
            match self.attempt(&body).await {
                Err(e) if e.is_retryable() && attempts < self.max_attempts => {
                    warn!(
                        attempt = attempts,
                        error = %e,
                        "Transient generation failure, retrying in {:?}...",
                        backoff
                    );
                    tokio::time::sleep(backoff).await;
                    attempts += 1;
                    backoff *= 2;
                }
                result => return result,
            }
        }
    }
}

fn classify_transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_connect() || e.is_timeout() {
        GenerationError::Transient(e.to_string())
    } else {
        GenerationError::Other(format!("request failed: {}", e))
    }
}

fn mentions_invalid_key(body: &str) -> bool {
    body.contains("API_KEY_INVALID") || body.contains("API key not valid")
}

/// Map a non-success status onto the failure taxonomy
fn classify_status(status: StatusCode, body: &str) -> GenerationError {
    let detail = format!("{}: {}", status, error_message(body));
    match status.as_u16() {
        429 => GenerationError::Quota(detail),
        401 => GenerationError::InvalidCredential(detail),
        400 | 403 if mentions_invalid_key(body) => GenerationError::InvalidCredential(detail),
        403 => GenerationError::Permission(detail),
        408 => GenerationError::Transient(detail),
        _ if status.is_server_error() => GenerationError::Transient(detail),
        _ => GenerationError::Other(detail),
    }
}

/// Pull `error.message` out of a Google error body, falling back to the raw text
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().to_string())
}

fn extract_image(payload: GenerateContentResponse) -> Result<Vec<u8>, GenerationError> {
    if let Some(reason) = payload.prompt_feedback.and_then(|f| f.block_reason) {
        return Err(GenerationError::Other(format!("prompt blocked: {}", reason)));
    }

    let mut text = Vec::new();
    for candidate in payload.candidates {
        let Some(content) = candidate.content else {
            if let Some(reason) = candidate.finish_reason {
                text.push(format!("finish reason {}", reason));
            }
            continue;
        };
        for part in content.parts {
            if let Some(inline) = part.inline_data {
                return BASE64.decode(inline.data.as_bytes()).map_err(|e| {
                    GenerationError::InvalidOutput(format!("image data is not base64: {}", e))
                });
            }
            if let Some(t) = part.text {
                text.push(t);
            }
        }
    }

    if text.is_empty() {
        Err(GenerationError::InvalidOutput("no image in response".to_string()))
    } else {
        Err(GenerationError::InvalidOutput(format!(
            "model returned text instead of an image: {}",
            text.join(" ")
        )))
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{AspectRatio, Resolution};
    use axum::{Json, Router, http::StatusCode as AxumStatus, routing::post};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    fn request() -> GenerationRequest {
        GenerationRequest {
            prompt: "a flowchart".to_string(),
            aspect_ratio: AspectRatio::Standard,
            resolution: Resolution::Medium,
        }
    }

    /// Serve one fixed status/body pair, counting hits
    async fn mock_server(status: AxumStatus, body: serde_json::Value) -> (String, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let app = Router::new().route(
            "/models/{model}",
            post(move || {
                let counter = counter.clone();
                let body = body.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (status, Json(body))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), hits)
    }

    fn client(base_url: &str) -> GeminiImageClient {
        let mut client = GeminiImageClient::new(Client::new(), "test-key", DEFAULT_MODEL)
            .with_base_url(base_url);
        client.base_backoff = Duration::from_millis(5);
        client
    }

    // ========================================================================
    // Request shape
    // ========================================================================

    #[test]
    fn test_request_body_shape() {
        let body = GeminiImageClient::request_body(&request());
        assert_eq!(body["contents"][0]["parts"][0]["text"], "a flowchart");
        assert_eq!(body["generationConfig"]["responseModalities"][0], "IMAGE");
        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "4:3");
        assert_eq!(body["generationConfig"]["imageConfig"]["imageSize"], "2K");
    }

    #[test]
    fn test_endpoint() {
        let c = client("http://localhost:9/v1beta/");
        assert_eq!(
            c.endpoint(),
            "http://localhost:9/v1beta/models/gemini-3-pro-image-preview:generateContent"
        );
    }

    // ========================================================================
    // Status classification
    // ========================================================================

    #[test]
    fn test_classify_status() {
        let quota = classify_status(StatusCode::TOO_MANY_REQUESTS, r#"{"error":{"message":"limit"}}"#);
        assert!(matches!(quota, GenerationError::Quota(ref m) if m.contains("limit")));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            GenerationError::InvalidCredential(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "denied"),
            GenerationError::Permission(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "API key not valid. Please pass a valid API key."),
            GenerationError::InvalidCredential(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "bad field"),
            GenerationError::Other(_)
        ));
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
    }

    #[test]
    fn test_text_only_response_is_invalid_output() {
        let payload: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "I cannot draw that" }] } }]
        }))
        .unwrap();
        let err = extract_image(payload).unwrap_err();
        assert!(matches!(err, GenerationError::InvalidOutput(ref m) if m.contains("cannot draw")));
    }

    #[test]
    fn test_blocked_prompt() {
        let payload: GenerateContentResponse =
            serde_json::from_value(json!({ "promptFeedback": { "blockReason": "SAFETY" } })).unwrap();
        assert!(matches!(extract_image(payload), Err(GenerationError::Other(ref m)) if m.contains("SAFETY")));
    }

    // ========================================================================
    // Retry behavior (local HTTP server)
    // ========================================================================

    #[tokio::test]
    async fn test_success_decodes_inline_data() {
        let body = json!({
            "candidates": [{ "content": { "parts": [
                { "text": "here you go" },
                { "inlineData": { "mimeType": "image/png", "data": BASE64.encode(PNG) } }
            ] } }]
        });
        let (url, hits) = mock_server(AxumStatus::OK, body).await;
        let bytes = client(&url).generate(&request()).await.unwrap();
        assert_eq!(bytes, PNG);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_error_retried_up_to_limit() {
        let (url, hits) = mock_server(AxumStatus::SERVICE_UNAVAILABLE, json!({})).await;
        let err = client(&url).generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Transient(_)));
        assert_eq!(hits.load(Ordering::SeqCst), DEFAULT_MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn test_quota_never_retried() {
        let body = json!({ "error": { "message": "Resource has been exhausted" } });
        let (url, hits) = mock_server(AxumStatus::TOO_MANY_REQUESTS, body).await;
        let err = client(&url).generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Quota(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_permission_never_retried() {
        let (url, hits) = mock_server(AxumStatus::FORBIDDEN, json!({ "error": { "message": "no" } })).await;
        let err = client(&url).generate(&request()).await.unwrap_err();
        assert!(matches!(err, GenerationError::Permission(_)));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_refused_is_transient() {
        let mut c = client("http://127.0.0.1:1");
        c.max_attempts = 2;
        let err = c.generate(&request()).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
