// src/config/mod.rs
// Configuration and shared constants

pub mod env;

pub use env::{
    AuthConfig, AuthMode, ConfigValidation, EnvConfig, ProxyConfig, RunMode, ServerConfig,
};
