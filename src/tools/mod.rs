// src/tools/mod.rs
// Tool contracts shared by every transport binding

pub mod dispatcher;
pub mod remote;

use std::path::PathBuf;

use async_trait::async_trait;
use rmcp::model::CallToolResult;

use crate::analyzer::{AspectRatio, Category, Resolution};
use crate::mcp::requests::{GenerateImageRequest, RefineImageRequest};

pub use dispatcher::{Dispatcher, DispatcherSettings};
pub use remote::RemoteTools;

/// The two tool operations, independent of the wire they arrive on
#[async_trait]
pub trait ImageTools: Send + Sync {
    async fn generate_image(&self, request: GenerateImageRequest) -> CallToolResult;
    async fn refine_image(&self, request: RefineImageRequest) -> CallToolResult;
}

/// Encoded image attached to a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Description of a saved artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDescriptor {
    pub path: PathBuf,
    pub category: Category,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    /// Present when the deployment serves files over HTTP
    pub download_url: Option<String>,
    pub inline_image: Option<InlineImage>,
    pub refined: bool,
    /// Human-readable alternatives from a medium-confidence classification
    pub suggestions: Vec<String>,
}

/// Result of a dispatcher operation before protocol formatting
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    Generated(ArtifactDescriptor),
    /// Classification was too ambiguous to act on
    Clarify(String),
    /// Refinement requested with no live session
    NoPriorSession,
    Failed(String),
}
