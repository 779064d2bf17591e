// src/auth/static_token.rs
// Shared-secret bearer authentication

use super::{AuthIdentity, AuthRejection, RequestCredentials};
use crate::error::{DiagramError, Result};

/// Accepts requests presenting any of the configured secrets
pub struct StaticTokenVerifier {
    tokens: Vec<String>,
    allow_query_token: bool,
}

impl StaticTokenVerifier {
    pub fn new(tokens: Vec<String>, allow_query_token: bool) -> Result<Self> {
        let tokens: Vec<String> = tokens.into_iter().filter(|t| !t.is_empty()).collect();
        if tokens.is_empty() {
            return Err(DiagramError::Config(
                "MCP_AUTH_TOKEN is required when MCP_AUTH_MODE=token".into(),
            ));
        }
        Ok(Self {
            tokens,
            allow_query_token,
        })
    }

    pub fn verify(&self, credentials: &RequestCredentials) -> std::result::Result<AuthIdentity, AuthRejection> {
        let presented = credentials
            .select(self.allow_query_token)
            .ok_or_else(|| AuthRejection::unauthorized("missing bearer token"))?;

        // Check every secret so timing does not reveal which one matched
        let matched = self
            .tokens
            .iter()
            .fold(false, |acc, t| constant_time_eq(t.as_bytes(), presented.as_bytes()) | acc);

        if matched {
            Ok(AuthIdentity::default())
        } else {
            Err(AuthRejection::unauthorized("invalid token"))
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bearer(token: &str) -> RequestCredentials {
        RequestCredentials {
            bearer: Some(token.to_string()),
            query_token: None,
        }
    }

    fn query(token: &str) -> RequestCredentials {
        RequestCredentials {
            bearer: None,
            query_token: Some(token.to_string()),
        }
    }

    #[test]
    fn test_requires_at_least_one_token() {
        assert!(StaticTokenVerifier::new(vec![], true).is_err());
        assert!(StaticTokenVerifier::new(vec![String::new()], true).is_err());
    }

    #[test]
    fn test_any_configured_token_accepted() {
        let v = StaticTokenVerifier::new(vec!["alpha".into(), "beta".into()], false).unwrap();
        assert!(v.verify(&bearer("alpha")).is_ok());
        assert!(v.verify(&bearer("beta")).is_ok());
        assert!(v.verify(&bearer("gamma")).is_err());
        assert!(v.verify(&bearer("alph")).is_err());
    }

    #[test]
    fn test_missing_credentials_rejected() {
        let v = StaticTokenVerifier::new(vec!["alpha".into()], true).unwrap();
        let rejection = v.verify(&RequestCredentials::default()).unwrap_err();
        assert_eq!(rejection.status, axum::http::StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_query_token_toggle() {
        let allowed = StaticTokenVerifier::new(vec!["alpha".into()], true).unwrap();
        assert!(allowed.verify(&query("alpha")).is_ok());
        let denied = StaticTokenVerifier::new(vec!["alpha".into()], false).unwrap();
        assert!(denied.verify(&query("alpha")).is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }
}
