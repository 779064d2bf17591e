// src/session.rs
// Last-generated-artifact store with lazy expiry

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::analyzer::{AspectRatio, Category, Resolution};

/// Default lifetime of a refinement session
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(3600);

/// The most recent successful generation for one logical caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Caller prompt; accumulates refinement blocks across a chain
    pub prompt: String,
    pub artifact: PathBuf,
    pub category: Category,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
    pub created_at: Instant,
}

/// Holds at most one live [`Session`] per session key.
///
/// Expired entries are evicted on read; there is no background sweep.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    entries: HashMap<String, Session>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(DEFAULT_SESSION_TTL)
    }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Live session for `key`, evicting it first if it has expired
    pub fn get(&mut self, key: &str) -> Option<&Session> {
        let expired = self
            .entries
            .get(key)
            .is_some_and(|s| s.created_at.elapsed() > self.ttl);
        if expired {
            debug!(session = %key, "Refinement session expired");
            self.clear(key);
        }
        self.entries.get(key)
    }

    /// Replace whatever session `key` held
    pub fn put(&mut self, key: &str, session: Session) {
        self.entries.insert(key.to_string(), session);
    }

    /// Forget `key`; a no-op when nothing is stored
    pub fn clear(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Number of stored entries, expired ones included until read
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
