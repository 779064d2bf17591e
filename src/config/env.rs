// src/config/env.rs
// Environment-based configuration - single source of truth for all env vars

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use strum::{Display, EnumString};
use tracing::{Level, debug, warn};

use crate::generator::gemini::DEFAULT_MODEL;
use crate::session::DEFAULT_SESSION_TTL;

/// Default bind host for the HTTP binding
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default bind port for the HTTP binding
pub const DEFAULT_PORT: u16 = 8000;
/// Default artifact directory for the HTTP binding
pub const DEFAULT_HTTP_OUTPUT_DIR: &str = "generated";

/// Which deployment topology the process runs as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Embedded direct-pipe binding (stdio)
    Stdio,
    /// Centralized multi-tenant HTTP binding
    Http,
    /// Credential-hiding forwarding proxy
    Proxy,
}

/// Authentication strategy for the HTTP binding (MCP_AUTH_MODE)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum AuthMode {
    #[default]
    #[strum(serialize = "token", serialize = "static")]
    Token,
    #[strum(serialize = "oidc", serialize = "jwt")]
    Oidc,
    #[strum(serialize = "none", serialize = "disabled", serialize = "off")]
    None,
}

/// Authentication settings loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub mode: AuthMode,
    /// Set when MCP_AUTH_MODE held something unrecognized
    pub invalid_mode: Option<String>,
    /// Accepted static secrets (MCP_AUTH_TOKEN, comma-separated)
    pub tokens: Vec<String>,
    /// OIDC issuer URL (OIDC_ISSUER)
    pub oidc_issuer: Option<String>,
    /// Accepted audiences (OIDC_AUDIENCE, comma-separated)
    pub oidc_audiences: Vec<String>,
    /// Explicit key-set URL, skipping discovery (OIDC_JWKS_URL)
    pub oidc_jwks_url: Option<String>,
    /// Accept `?token=` credentials (MCP_ALLOW_QUERY_TOKEN)
    pub allow_query_token: bool,
}

/// Bind address, artifact storage and response shaping
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// OUTPUT_DIR; mode-specific default applied by `output_dir_for`
    pub output_dir: Option<PathBuf>,
    /// PUBLIC_URL used to build download links
    pub public_url: Option<String>,
    /// INLINE_IMAGES
    pub inline_images: bool,
    /// SESSION_TTL_SECS
    pub session_ttl: Duration,
    /// Set when PORT held something that is not a port number
    pub invalid_port: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            output_dir: None,
            public_url: None,
            inline_images: true,
            session_ttl: DEFAULT_SESSION_TTL,
            invalid_port: None,
        }
    }
}

impl ServerConfig {
    /// Artifact directory for a given run mode
    pub fn output_dir_for(&self, mode: RunMode) -> PathBuf {
        match (&self.output_dir, mode) {
            (Some(dir), _) => dir.clone(),
            (None, RunMode::Http) => PathBuf::from(DEFAULT_HTTP_OUTPUT_DIR),
            (None, _) => PathBuf::from("."),
        }
    }

    /// Base URL for download links, without trailing slash
    pub fn download_base(&self) -> String {
        match &self.public_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.host, self.port),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Forwarding-proxy target (MCP_REMOTE_URL / MCP_REMOTE_TOKEN)
#[derive(Debug, Clone, Default)]
pub struct ProxyConfig {
    pub remote_url: Option<String>,
    pub remote_token: Option<String>,
}

/// Complete environment configuration
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Generation-service credential (GEMINI_API_KEY or GOOGLE_API_KEY)
    pub api_key: Option<String>,
    /// GEMINI_IMAGE_MODEL
    pub image_model: String,
    pub auth: AuthConfig,
    pub server: ServerConfig,
    pub proxy: ProxyConfig,
}

impl EnvConfig {
    /// Load configuration from the process environment
    pub fn load() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// LOG_LEVEL alone, for installing the subscriber before the full load
    pub fn log_level_from_env() -> Option<Level> {
        std::env::var("LOG_LEVEL").ok().as_deref().and_then(parse_log_level)
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let api_key = read("GEMINI_API_KEY").or_else(|| read("GOOGLE_API_KEY"));
        let image_model = read("GEMINI_IMAGE_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let (mode, invalid_mode) = match read("MCP_AUTH_MODE") {
            Some(raw) => match AuthMode::from_str(raw.trim()) {
                Ok(mode) => (mode, None),
                Err(_) => (AuthMode::default(), Some(raw)),
            },
            None => (AuthMode::default(), None),
        };

        // Query-string credentials leak into access logs; OIDC is opt-in only
        let allow_query_token = read("MCP_ALLOW_QUERY_TOKEN")
            .and_then(|v| parse_bool(&v))
            .unwrap_or(mode == AuthMode::Token);

        let auth = AuthConfig {
            mode,
            invalid_mode,
            tokens: read("MCP_AUTH_TOKEN").map(|v| split_list(&v)).unwrap_or_default(),
            oidc_issuer: read("OIDC_ISSUER"),
            oidc_audiences: read("OIDC_AUDIENCE").map(|v| split_list(&v)).unwrap_or_default(),
            oidc_jwks_url: read("OIDC_JWKS_URL"),
            allow_query_token,
        };

        let (port, invalid_port) = match read("PORT") {
            Some(raw) => match raw.trim().parse() {
                Ok(port) => (port, None),
                Err(_) => {
                    warn!(value = %raw, "Invalid PORT, using default");
                    (DEFAULT_PORT, Some(raw))
                }
            },
            None => (DEFAULT_PORT, None),
        };

        let session_ttl = read("SESSION_TTL_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_SESSION_TTL);

        let server = ServerConfig {
            host: read("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            output_dir: read("OUTPUT_DIR").map(PathBuf::from),
            public_url: read("PUBLIC_URL"),
            inline_images: read("INLINE_IMAGES").and_then(|v| parse_bool(&v)).unwrap_or(true),
            session_ttl,
            invalid_port,
        };

        let proxy = ProxyConfig {
            remote_url: read("MCP_REMOTE_URL"),
            remote_token: read("MCP_REMOTE_TOKEN"),
        };

        debug!(
            auth_mode = %auth.mode,
            has_api_key = api_key.is_some(),
            "Environment configuration loaded"
        );

        Self {
            api_key,
            image_model,
            auth,
            server,
            proxy,
        }
    }

    /// Check the configuration for a given run mode
    pub fn validate(&self, mode: RunMode) -> ConfigValidation {
        let mut validation = ConfigValidation::new();

        if matches!(mode, RunMode::Stdio | RunMode::Http) && self.api_key.is_none() {
            validation.add_error("GEMINI_API_KEY (or GOOGLE_API_KEY) is required");
        }

        if mode == RunMode::Http {
            if let Some(raw) = &self.server.invalid_port {
                validation.add_warning(format!(
                    "PORT '{}' is not a valid port number; using {}",
                    raw, self.server.port
                ));
            }
            self.validate_auth(&mut validation);
        }

        if mode == RunMode::Proxy {
            if self.proxy.remote_url.is_none() {
                validation.add_error("MCP_REMOTE_URL is required in proxy mode");
            }
            if self.proxy.remote_token.is_none() {
                validation.add_warning(
                    "MCP_REMOTE_TOKEN is not set; the remote server must have auth disabled",
                );
            }
        }

        validation
    }

    fn validate_auth(&self, validation: &mut ConfigValidation) {
        if let Some(raw) = &self.auth.invalid_mode {
            validation.add_error(format!(
                "MCP_AUTH_MODE '{}' is not one of: token, oidc, none",
                raw
            ));
            return;
        }

        match self.auth.mode {
            AuthMode::Token => {
                if self.auth.tokens.is_empty() {
                    validation.add_error("MCP_AUTH_TOKEN is required when MCP_AUTH_MODE=token");
                }
                if self.auth.allow_query_token {
                    validation.add_warning(
                        "Query-string tokens are accepted (MCP_ALLOW_QUERY_TOKEN); they may appear in access logs",
                    );
                }
            }
            AuthMode::Oidc => {
                match &self.auth.oidc_issuer {
                    None => validation.add_error("OIDC_ISSUER is required when MCP_AUTH_MODE=oidc"),
                    Some(issuer) if url::Url::parse(issuer).is_err() => {
                        validation.add_error(format!("OIDC_ISSUER '{}' is not a valid URL", issuer))
                    }
                    Some(_) => {}
                }
                if self.auth.oidc_audiences.is_empty() {
                    validation.add_warning(
                        "OIDC_AUDIENCE is not set; tokens for any audience of this issuer will be accepted",
                    );
                }
            }
            AuthMode::None => {
                validation.add_warning(
                    "Authentication is DISABLED (MCP_AUTH_MODE=none); only run behind a trusted proxy",
                );
            }
        }
    }
}

/// Configuration validation result
#[derive(Debug)]
pub struct ConfigValidation {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl Default for ConfigValidation {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigValidation {
    pub fn new() -> Self {
        Self {
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Format as a human-readable report
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        if !self.errors.is_empty() {
            lines.push("Errors:".to_string());
            for err in &self.errors {
                lines.push(format!("  - {}", err));
            }
        }

        if !self.warnings.is_empty() {
            lines.push("Warnings:".to_string());
            for warning in &self.warnings {
                lines.push(format!("  - {}", warning));
            }
        }

        lines.join("\n")
    }
}

/// Parse a boolean-ish environment value
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a LOG_LEVEL value (`error` through `trace`, any case)
pub fn parse_log_level(value: &str) -> Option<Level> {
    Level::from_str(value.trim()).ok()
}

/// Split a comma-separated list, dropping blanks
fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
