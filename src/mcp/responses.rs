// src/mcp/responses.rs
// Protocol formatting of tool outcomes

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use rmcp::model::{CallToolResult, Content};

use crate::tools::{ArtifactDescriptor, ToolOutcome};

/// Guidance returned when refine has nothing to work from
pub const NO_PRIOR_SESSION: &str = "No previous image to refine in this session. Call generate_image first, then use refine_image to adjust the result.";

/// Convert a dispatcher outcome into a tool result
pub fn outcome_to_result(outcome: ToolOutcome) -> CallToolResult {
    match outcome {
        ToolOutcome::Generated(artifact) => success(artifact),
        ToolOutcome::Clarify(question) => CallToolResult::success(vec![Content::text(question)]),
        ToolOutcome::NoPriorSession => CallToolResult::success(vec![Content::text(NO_PRIOR_SESSION)]),
        ToolOutcome::Failed(message) => CallToolResult::error(vec![Content::text(message)]),
    }
}

/// Plain error result carrying a message
pub fn error_result(message: impl Into<String>) -> CallToolResult {
    CallToolResult::error(vec![Content::text(message.into())])
}

fn success(artifact: ArtifactDescriptor) -> CallToolResult {
    let mut contents = vec![Content::text(summary(&artifact))];
    if let Some(image) = &artifact.inline_image {
        contents.push(Content::image(BASE64.encode(&image.bytes), image.mime_type));
    }
    CallToolResult::success(contents)
}

fn summary(artifact: &ArtifactDescriptor) -> String {
    let mut lines = Vec::new();
    if artifact.refined {
        lines.push(format!(
            "Refined {} image ({}, {})",
            artifact.category, artifact.aspect_ratio, artifact.resolution
        ));
    } else {
        lines.push(format!(
            "Generated {} image ({}, {})",
            artifact.category, artifact.aspect_ratio, artifact.resolution
        ));
    }
    lines.push(format!("Saved to: {}", artifact.path.display()));
    if let Some(url) = &artifact.download_url {
        lines.push(format!("Download: {}", url));
    }
    if !artifact.suggestions.is_empty() {
        lines.push(String::new());
        lines.extend(artifact.suggestions.iter().cloned());
    }
    lines.push(String::new());
    lines.push("Use refine_image to adjust this image.".to_string());
    lines.join("\n")
}

/// Concatenated text content of a tool result
pub fn result_text(result: &CallToolResult) -> String {
    result
        .content
        .iter()
        .filter_map(|c| c.as_text())
        .map(|t| t.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
