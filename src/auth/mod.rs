// src/auth/mod.rs
// Request authentication for the HTTP binding

pub mod oidc;
pub mod static_token;

use std::sync::Arc;

use axum::{
    Json,
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::config::{AuthConfig, AuthMode};
use crate::error::{DiagramError, Result};

pub use oidc::{OidcSettings, OidcVerifier};
pub use static_token::StaticTokenVerifier;

/// Query parameter accepted as a credential when enabled
pub const QUERY_TOKEN_PARAM: &str = "token";

/// Credentials extracted from one inbound request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestCredentials {
    pub bearer: Option<String>,
    pub query_token: Option<String>,
}

impl RequestCredentials {
    pub fn from_parts(headers: &HeaderMap, query: Option<&str>) -> Self {
        let bearer = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| {
                let (scheme, token) = v.trim().split_once(' ')?;
                scheme.eq_ignore_ascii_case("bearer").then(|| token.trim().to_string())
            })
            .filter(|t| !t.is_empty());

        let query_token = query.and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(k, _)| k == QUERY_TOKEN_PARAM)
                .map(|(_, v)| v.into_owned())
                .filter(|v| !v.is_empty())
        });

        Self {
            bearer,
            query_token,
        }
    }

    /// Bearer header first, then the query parameter when allowed
    pub fn select(&self, allow_query: bool) -> Option<&str> {
        self.bearer.as_deref().or_else(|| {
            if allow_query {
                self.query_token.as_deref()
            } else {
                None
            }
        })
    }
}

/// Outcome of a successful verification; recomputed per request
#[derive(Debug, Clone, Default)]
pub struct AuthIdentity {
    /// Verified token claims (OIDC only)
    pub claims: Option<Map<String, Value>>,
}

impl AuthIdentity {
    pub fn subject(&self) -> Option<&str> {
        self.claims.as_ref()?.get("sub")?.as_str()
    }
}

/// Denied request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRejection {
    pub status: StatusCode,
    pub reason: String,
}

impl AuthRejection {
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            reason: reason.into(),
        }
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        debug!(status = %self.status, reason = %self.reason, "Rejected request");
        let mut response = (self.status, Json(json!({ "error": self.reason }))).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert("www-authenticate", axum::http::HeaderValue::from_static("Bearer"));
        }
        response
    }
}

/// Authentication strategy, fixed at startup
pub enum AuthVerifier {
    StaticToken(StaticTokenVerifier),
    Oidc(OidcVerifier),
    /// Accepts everything; only for deployments behind a trusted proxy
    Disabled,
}

impl AuthVerifier {
    /// Build the configured strategy. OIDC performs discovery here and fails
    /// fast when the issuer cannot be reached.
    pub async fn from_config(config: &AuthConfig, client: &reqwest::Client) -> Result<Self> {
        match config.mode {
            AuthMode::Token => {
                let verifier = StaticTokenVerifier::new(config.tokens.clone(), config.allow_query_token)?;
                if config.allow_query_token {
                    warn!("Query-string tokens are accepted; they may be recorded in access logs");
                }
                Ok(AuthVerifier::StaticToken(verifier))
            }
            AuthMode::Oidc => {
                let issuer = config.oidc_issuer.clone().ok_or_else(|| {
                    DiagramError::Config("OIDC_ISSUER is required when MCP_AUTH_MODE=oidc".into())
                })?;
                let settings = OidcSettings {
                    issuer,
                    audiences: config.oidc_audiences.clone(),
                    jwks_url: config.oidc_jwks_url.clone(),
                    allow_query_token: config.allow_query_token,
                };
                Ok(AuthVerifier::Oidc(OidcVerifier::discover(settings, client.clone()).await?))
            }
            AuthMode::None => {
                warn!("Authentication is DISABLED; every request is accepted. Only run behind a trusted proxy.");
                Ok(AuthVerifier::Disabled)
            }
        }
    }

    pub fn mode(&self) -> AuthMode {
        match self {
            AuthVerifier::StaticToken(_) => AuthMode::Token,
            AuthVerifier::Oidc(_) => AuthMode::Oidc,
            AuthVerifier::Disabled => AuthMode::None,
        }
    }

    pub async fn verify(
        &self,
        credentials: &RequestCredentials,
    ) -> std::result::Result<AuthIdentity, AuthRejection> {
        match self {
            AuthVerifier::StaticToken(v) => v.verify(credentials),
            AuthVerifier::Oidc(v) => v.verify(credentials).await,
            AuthVerifier::Disabled => Ok(AuthIdentity::default()),
        }
    }
}

/// Middleware gating every route it wraps
pub async fn require_auth(
    State(verifier): State<Arc<AuthVerifier>>,
    mut request: Request,
    next: Next,
) -> Response {
    let credentials = RequestCredentials::from_parts(request.headers(), request.uri().query());
    match verifier.verify(&credentials).await {
        Ok(identity) => {
            debug!(
                subject = identity.subject().unwrap_or("-"),
                path = %request.uri().path(),
                "Request authenticated"
            );
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(rejection) => rejection.into_response(),
    }
}
