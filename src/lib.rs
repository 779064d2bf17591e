// src/lib.rs
// diagram-mcp - prompt-to-diagram image generation over MCP

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod analyzer;
pub mod auth;
pub mod config;
pub mod error;
pub mod generator;
pub mod http;
pub mod mcp;
pub mod output;
pub mod session;
pub mod tools;
pub mod transport;

pub use error::{DiagramError, Result};
