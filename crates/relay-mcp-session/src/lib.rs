//! # Session Lifecycle and Storage
//!
//! Sessions are created on `initialize` (stateful mode) or per request
//! (stateless mode), touched on every successful access, and destroyed on
//! explicit DELETE, idle expiry, or process exit. The store is the single
//! owner; handlers and long-lived connections hold only the session id and
//! resolve it on use.

pub mod handle;
pub mod session;
pub mod store;

pub use handle::SessionHandle;
pub use session::{LifecycleState, Session, SessionConfig};
pub use store::{InMemorySessionStore, SessionStoreError, SharedSessionStore};

/// Result type for session storage operations
pub type Result<T> = std::result::Result<T, SessionStoreError>;
