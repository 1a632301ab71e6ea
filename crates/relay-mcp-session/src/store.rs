//! In-memory session store.
//!
//! All operations are safe under parallel callers via a read-write lock.
//! Expiry is lazy: a lookup that finds an entry older than `idle_ttl`
//! removes it and reports the session as absent. A server-side sweep task
//! may additionally call `expire_idle` periodically.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::session::{LifecycleState, Session, SessionConfig};

/// Errors from session store operations
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("Session not found: {0}")]
    NotFound(String),

    #[error("Session already exists: {0}")]
    AlreadyExists(String),
}

/// Thread-safe in-memory session store; the single owner of all sessions.
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
    config: SessionConfig,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            config,
        }
    }

    pub fn idle_ttl(&self) -> Duration {
        self.config.idle_ttl
    }

    /// Create a new session with a generated UUID v7 id.
    pub async fn create(&self) -> Session {
        let session = Session::new();
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        debug!(session_id = %session.id, "Created session");
        session
    }

    /// Create a session with a specific id. Tests only; production ids come
    /// from `create`.
    pub async fn create_with_id(
        &self,
        id: impl Into<String>,
    ) -> Result<Session, SessionStoreError> {
        let session = Session::with_id(id);
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.id) {
            return Err(SessionStoreError::AlreadyExists(session.id));
        }
        sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    /// Look up a session by id, touching `last_activity`.
    ///
    /// Entries older than the idle TTL are removed and treated as absent.
    pub async fn get(&self, id: &str) -> Option<Session> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(id) {
            Some(session) if session.is_expired(self.config.idle_ttl) => {
                debug!(session_id = %id, "Session expired on lookup");
                sessions.remove(id);
                None
            }
            Some(session) => {
                session.touch();
                Some(session.clone())
            }
            None => None,
        }
    }

    /// Whether a live (unexpired) session exists, without touching it.
    pub async fn contains(&self, id: &str) -> bool {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .map(|s| !s.is_expired(self.config.idle_ttl))
            .unwrap_or(false)
    }

    /// Set a state value on a session.
    pub async fn set_state(
        &self,
        id: &str,
        key: &str,
        value: Value,
    ) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionStoreError::NotFound(id.to_string()))?;
        session.set_data(key, value);
        session.touch();
        Ok(())
    }

    /// Get a state value from a session.
    pub async fn get_state(&self, id: &str, key: &str) -> Option<Value> {
        let sessions = self.sessions.read().await;
        sessions.get(id).and_then(|s| s.state.get(key).cloned())
    }

    /// Move a session through its lifecycle.
    pub async fn set_lifecycle(
        &self,
        id: &str,
        lifecycle: LifecycleState,
    ) -> Result<(), SessionStoreError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| SessionStoreError::NotFound(id.to_string()))?;
        debug!(session_id = %id, from = ?session.lifecycle, to = ?lifecycle, "Lifecycle transition");
        session.lifecycle = lifecycle;
        session.touch();
        Ok(())
    }

    pub async fn lifecycle(&self, id: &str) -> Option<LifecycleState> {
        let sessions = self.sessions.read().await;
        sessions.get(id).map(|s| s.lifecycle)
    }

    /// Terminate and remove a session. Returns whether it existed.
    pub async fn terminate(&self, id: &str) -> bool {
        let mut sessions = self.sessions.write().await;
        let existed = sessions.remove(id).is_some();
        if existed {
            debug!(session_id = %id, "Terminated session");
        }
        existed
    }

    /// Ids of all live sessions.
    pub async fn active_ids(&self) -> Vec<String> {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .filter(|s| !s.is_expired(self.config.idle_ttl))
            .map(|s| s.id.clone())
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Sweep out idle sessions; returns the removed ids.
    pub async fn expire_idle(&self) -> Vec<String> {
        let mut sessions = self.sessions.write().await;
        let expired: Vec<String> = sessions
            .values()
            .filter(|s| s.is_expired(self.config.idle_ttl))
            .map(|s| s.id.clone())
            .collect();
        for id in &expired {
            sessions.remove(id);
        }
        expired
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared store handle used across the HTTP layer.
pub type SharedSessionStore = Arc<InMemorySessionStore>;
