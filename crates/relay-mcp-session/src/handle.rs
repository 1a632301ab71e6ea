//! Weak session handle given to request handlers.
//!
//! Handlers never own a session; they hold the id plus a store reference and
//! resolve on every access, so termination and expiry take effect
//! immediately.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use relay_mcp_json_rpc::{SessionState, SessionStateError};

use crate::store::InMemorySessionStore;

/// Store-backed implementation of the call context's session view.
pub struct SessionHandle {
    session_id: String,
    store: Arc<InMemorySessionStore>,
}

impl SessionHandle {
    pub fn new(session_id: impl Into<String>, store: Arc<InMemorySessionStore>) -> Self {
        Self {
            session_id: session_id.into(),
            store,
        }
    }

    pub fn store(&self) -> &Arc<InMemorySessionStore> {
        &self.store
    }
}

#[async_trait]
impl SessionState for SessionHandle {
    fn session_id(&self) -> &str {
        &self.session_id
    }

    async fn get_value(&self, key: &str) -> Option<Value> {
        self.store.get_state(&self.session_id, key).await
    }

    async fn set_value(&self, key: &str, value: Value) -> Result<(), SessionStateError> {
        self.store
            .set_state(&self.session_id, key, value)
            .await
            .map_err(|e| SessionStateError::Storage(e.to_string()))
    }
}
