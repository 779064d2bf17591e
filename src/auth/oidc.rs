// src/auth/oidc.rs
// OIDC bearer-token verification against the issuer's published key set

use std::sync::{Mutex, RwLock};
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::{AuthIdentity, AuthRejection, RequestCredentials};
use crate::error::{DiagramError, Result};

/// Minimum spacing between key-set refetches triggered by unknown key ids
const DEFAULT_REFRESH_COOLDOWN: Duration = Duration::from_secs(30);

/// OIDC verifier configuration
#[derive(Debug, Clone)]
pub struct OidcSettings {
    pub issuer: String,
    pub audiences: Vec<String>,
    /// Skip discovery and use this key-set URL
    pub jwks_url: Option<String>,
    pub allow_query_token: bool,
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    issuer: Option<String>,
    jwks_uri: String,
}

/// Verifies JWTs signed by a single issuer
pub struct OidcVerifier {
    issuer: String,
    audiences: Vec<String>,
    jwks_url: String,
    allow_query_token: bool,
    client: reqwest::Client,
    keys: RwLock<JwkSet>,
    /// When the last refetch was started; guards the cooldown only
    last_refresh: Mutex<Instant>,
    refresh_cooldown: Duration,
}

impl OidcVerifier {
    /// Resolve the key-set location and load it. Any failure here is a
    /// configuration error.
    pub async fn discover(settings: OidcSettings, client: reqwest::Client) -> Result<Self> {
        let issuer_url = url::Url::parse(&settings.issuer).map_err(|e| {
            DiagramError::Config(format!("OIDC_ISSUER '{}' is not a valid URL: {}", settings.issuer, e))
        })?;
        if !matches!(issuer_url.scheme(), "http" | "https") {
            return Err(DiagramError::Config(format!(
                "OIDC_ISSUER '{}' must be an http(s) URL",
                settings.issuer
            )));
        }
        let issuer = settings.issuer.trim_end_matches('/').to_string();

        let jwks_url = match settings.jwks_url {
            Some(url) => url,
            None => discover_jwks_url(&client, &issuer).await?,
        };

        let set = fetch_jwks(&client, &jwks_url)
            .await
            .map_err(|e| DiagramError::Config(format!("Failed to load OIDC key set: {}", e)))?;

        if settings.audiences.is_empty() {
            warn!(
                issuer = %issuer,
                "OIDC_AUDIENCE is not set; tokens issued for ANY audience by this issuer will be accepted"
            );
        }
        info!(issuer = %issuer, jwks_url = %jwks_url, keys = set.keys.len(), "OIDC verifier ready");

        Ok(Self {
            issuer,
            audiences: settings.audiences,
            jwks_url,
            allow_query_token: settings.allow_query_token,
            client,
            keys: RwLock::new(set),
            last_refresh: Mutex::new(Instant::now()),
            refresh_cooldown: DEFAULT_REFRESH_COOLDOWN,
        })
    }

    pub fn with_refresh_cooldown(mut self, cooldown: Duration) -> Self {
        self.refresh_cooldown = cooldown;
        self
    }

    pub fn jwks_url(&self) -> &str {
        &self.jwks_url
    }

    pub async fn verify(&self, credentials: &RequestCredentials) -> std::result::Result<AuthIdentity, AuthRejection> {
        let token = credentials
            .select(self.allow_query_token)
            .ok_or_else(|| AuthRejection::unauthorized("missing bearer token"))?;
        let claims = self.verify_token(token).await?;
        Ok(AuthIdentity {
            claims: Some(claims),
        })
    }

    /// Check signature, issuer, audience and standard time claims
    pub async fn verify_token(&self, token: &str) -> std::result::Result<Map<String, Value>, AuthRejection> {
        let header = decode_header(token).map_err(|e| {
            debug!(error = %e, "Malformed JWT header");
            AuthRejection::unauthorized("malformed token")
        })?;

        let key = match self.find_key(header.kid.as_deref()) {
            Some(key) => key,
            None => {
                self.refresh_keys().await;
                self.find_key(header.kid.as_deref())
                    .ok_or_else(|| AuthRejection::unauthorized("unknown signing key"))?
            }
        };

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.issuer.clone(), format!("{}/", self.issuer)]);
        if self.audiences.is_empty() {
            validation.validate_aud = false;
        } else {
            validation.set_audience(&self.audiences);
        }
        validation.set_required_spec_claims(&["exp", "iss"]);

        decode::<Map<String, Value>>(token, &key, &validation)
            .map(|data| data.claims)
            .map_err(|e| {
                debug!(error = %e, "JWT rejected");
                AuthRejection::unauthorized(format!("invalid token: {}", e))
            })
    }

    fn find_key(&self, kid: Option<&str>) -> Option<DecodingKey> {
        let keys = self.keys.read().unwrap_or_else(|e| e.into_inner());
        let jwk = match kid {
            Some(kid) => keys.find(kid)?,
            // Without a key id only an unambiguous single-key set is usable
            None if keys.keys.len() == 1 => keys.keys.first()?,
            None => return None,
        };
        DecodingKey::from_jwk(jwk)
            .map_err(|e| warn!(error = %e, "Unusable key in OIDC key set"))
            .ok()
    }

    /// Claim the next refetch slot if the cooldown has passed
    fn claim_refresh(&self) -> bool {
        let mut last = self.last_refresh.lock().unwrap_or_else(|e| e.into_inner());
        if last.elapsed() < self.refresh_cooldown {
            return false;
        }
        *last = Instant::now();
        true
    }

    /// Refetch the key set. No lock is held while the request is in flight;
    /// other callers keep verifying against the current set.
    async fn refresh_keys(&self) {
        if !self.claim_refresh() {
            return;
        }
        match fetch_jwks(&self.client, &self.jwks_url).await {
            Ok(set) => {
                debug!(keys = set.keys.len(), "Refreshed OIDC key set");
                *self.keys.write().unwrap_or_else(|e| e.into_inner()) = set;
            }
            Err(e) => warn!(error = %e, "Failed to refresh OIDC key set"),
        }
    }
}

async fn discover_jwks_url(client: &reqwest::Client, issuer: &str) -> Result<String> {
    let url = format!("{}/.well-known/openid-configuration", issuer);
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| DiagramError::Config(format!("OIDC discovery at {} failed: {}", url, e)))?;
    if !response.status().is_success() {
        return Err(DiagramError::Config(format!(
            "OIDC discovery at {} returned {}",
            url,
            response.status()
        )));
    }
    let document: DiscoveryDocument = response
        .json()
        .await
        .map_err(|e| DiagramError::Config(format!("Malformed OIDC discovery document: {}", e)))?;

    if let Some(advertised) = &document.issuer
        && advertised.trim_end_matches('/') != issuer
    {
        warn!(configured = %issuer, advertised = %advertised, "OIDC issuer mismatch in discovery document");
    }
    Ok(document.jwks_uri)
}

async fn fetch_jwks(client: &reqwest::Client, url: &str) -> std::result::Result<JwkSet, String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| format!("request to {} failed: {}", url, e))?;
    if !response.status().is_success() {
        return Err(format!("{} returned {}", url, response.status()));
    }
    response
        .json::<JwkSet>()
        .await
        .map_err(|e| format!("malformed key set from {}: {}", url, e))
}
