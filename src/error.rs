// src/error.rs
// Standardized error types for diagram-mcp

use thiserror::Error;

/// Main error type for the diagram-mcp library.
///
/// Per-request failures (auth, generation, transport) have their own types;
/// this one covers startup and process-level failures.
#[derive(Error, Debug)]
pub enum DiagramError {
    /// Missing credential, bad auth settings, failed key-set discovery
    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown error: {0}")]
    Other(String),
}

/// Convenience type alias for Result using DiagramError
pub type Result<T> = std::result::Result<T, DiagramError>;
