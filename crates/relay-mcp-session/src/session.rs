use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Per-session lifecycle state.
///
/// `tools/*`, `resources/*`, and `prompts/*` requests are permitted only in
/// `Initialized`; `initialize` only in `Uninitialized`;
/// `notifications/initialized` moves `Initializing` to `Initialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleState {
    #[default]
    Uninitialized,
    Initializing,
    Initialized,
    Terminated,
}

/// Configuration for session management
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Idle time after which a session is lazily expired on lookup
    pub idle_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(30 * 60),
        }
    }
}

/// A single session with its key/value state bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque server-generated identifier (UUID v7 for temporal ordering)
    pub id: String,
    /// Creation timestamp (Unix millis)
    pub created_at: u64,
    /// Last activity timestamp (Unix millis)
    pub last_activity: u64,
    /// Lifecycle state
    pub lifecycle: LifecycleState,
    /// Domain-specific key/value bag (negotiated protocolVersion, log level, ...)
    pub state: HashMap<String, Value>,
}

impl Session {
    pub fn new() -> Self {
        let now = now_millis();
        Self {
            id: Uuid::now_v7().to_string(),
            created_at: now,
            last_activity: now,
            lifecycle: LifecycleState::Uninitialized,
            state: HashMap::new(),
        }
    }

    /// Create a session with a specific id (tests and ephemeral stateless sessions)
    pub fn with_id(id: impl Into<String>) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            created_at: now,
            last_activity: now,
            lifecycle: LifecycleState::Uninitialized,
            state: HashMap::new(),
        }
    }

    /// Update the last-activity timestamp
    pub fn touch(&mut self) {
        self.last_activity = now_millis();
    }

    pub fn is_expired(&self, idle_ttl: Duration) -> bool {
        let now = now_millis();
        now.saturating_sub(self.last_activity) > idle_ttl.as_millis() as u64
    }

    /// Typed read from the state bag; absence and type mismatch both return `None`.
    pub fn get_data<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.state
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn set_data(&mut self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis() as u64
}
