// src/generator/mod.rs
// External image generation collaborator

pub mod gemini;

use async_trait::async_trait;
use thiserror::Error;

use crate::analyzer::{AspectRatio, Resolution};

pub use gemini::GeminiImageClient;

/// Fully specified generation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    /// Enhanced prompt, ready to send
    pub prompt: String,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
}

/// Failure reported by the generation service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("invalid API key: {0}")]
    InvalidCredential(String),

    #[error("transient failure: {0}")]
    Transient(String),

    #[error("invalid image output: {0}")]
    InvalidOutput(String),

    #[error("{0}")]
    Other(String),
}

impl GenerationError {
    /// Only transient failures can succeed on a later attempt
    pub fn is_retryable(&self) -> bool {
        matches!(self, GenerationError::Transient(_))
    }
}

/// Turns a fully specified prompt into encoded image bytes
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, GenerationError>;
}

/// Image formats the generator may return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Webp => "image/webp",
        }
    }
}

const PNG_SIGNATURE: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];

/// Identify an encoded image by its leading signature bytes
pub fn detect_image_format(bytes: &[u8]) -> Option<ImageFormat> {
    if bytes.starts_with(PNG_SIGNATURE) {
        Some(ImageFormat::Png)
    } else if bytes.starts_with(JPEG_SIGNATURE) {
        Some(ImageFormat::Jpeg)
    } else if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        Some(ImageFormat::Webp)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(GenerationError::Transient("503".into()).is_retryable());
        assert!(!GenerationError::Quota("429".into()).is_retryable());
        assert!(!GenerationError::Permission("403".into()).is_retryable());
        assert!(!GenerationError::InvalidCredential("401".into()).is_retryable());
        assert!(!GenerationError::InvalidOutput("text".into()).is_retryable());
    }

    #[test]
    fn test_detect_png() {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(b"IHDR");
        assert_eq!(detect_image_format(&bytes), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::Png.mime_type(), "image/png");
    }

    #[test]
    fn test_detect_jpeg_and_webp() {
        assert_eq!(detect_image_format(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
        assert_eq!(
            detect_image_format(b"RIFF\x00\x00\x00\x00WEBPVP8 "),
            Some(ImageFormat::Webp)
        );
    }

    #[test]
    fn test_reject_non_image() {
        assert_eq!(detect_image_format(b"<html>nope</html>"), None);
        assert_eq!(detect_image_format(&[]), None);
        assert_eq!(detect_image_format(b"RIFF"), None);
    }
}
