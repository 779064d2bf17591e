// src/transport/registry.rs
// Which transport kind owns each live session id

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Wire binding a session was established on
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum TransportKind {
    Streamable,
    LegacySse,
}

/// Per-request transport protocol violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportRejection {
    #[error("unknown session id")]
    UnknownSession,

    #[error("session belongs to the {actual} transport, not {expected}")]
    WrongTransport {
        expected: TransportKind,
        actual: TransportKind,
    },

    #[error("missing session id")]
    MissingSession,

    #[error("server is shutting down")]
    ShuttingDown,
}

impl IntoResponse for TransportRejection {
    fn into_response(self) -> Response {
        let status = match self {
            TransportRejection::ShuttingDown => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::BAD_REQUEST,
        };
        debug!(status = %status, reason = %self, "Transport request rejected");
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug)]
struct RegistryState {
    accepting: bool,
    sessions: HashMap<String, TransportKind>,
}

/// Shared record of live transport sessions across both HTTP bindings
#[derive(Debug)]
pub struct SessionRegistry {
    state: Mutex<RegistryState>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState {
                accepting: true,
                sessions: HashMap::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a new session; refused once shutdown has begun
    pub fn register(&self, id: &str, kind: TransportKind) -> Result<(), TransportRejection> {
        let mut state = self.lock();
        if !state.accepting {
            return Err(TransportRejection::ShuttingDown);
        }
        state.sessions.insert(id.to_string(), kind);
        debug!(session = %id, kind = %kind, "Transport session registered");
        Ok(())
    }

    pub fn remove(&self, id: &str) -> Option<TransportKind> {
        let removed = self.lock().sessions.remove(id);
        if removed.is_some() {
            debug!(session = %id, "Transport session released");
        }
        removed
    }

    pub fn kind_of(&self, id: &str) -> Option<TransportKind> {
        self.lock().sessions.get(id).copied()
    }

    /// Confirm `id` is live and bound to `expected`
    pub fn check(&self, id: &str, expected: TransportKind) -> Result<(), TransportRejection> {
        match self.kind_of(id) {
            None => Err(TransportRejection::UnknownSession),
            Some(actual) if actual != expected => Err(TransportRejection::WrongTransport { expected, actual }),
            Some(_) => Ok(()),
        }
    }

    /// Stop accepting registrations and hand back every live id
    pub fn close(&self) -> Vec<(String, TransportKind)> {
        let mut state = self.lock();
        state.accepting = false;
        state.sessions.drain().collect()
    }

    pub fn is_accepting(&self) -> bool {
        self.lock().accepting
    }

    pub fn len(&self) -> usize {
        self.lock().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
