//! SSE event id generation.
//!
//! Every event carries an id of the form `evt-{millis}-{counter}` where the
//! counter is per-responder. Ids are monotonically non-decreasing within one
//! responder and opaque to clients except for echoing back as
//! `Last-Event-ID` on reconnect.

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-responder monotonic event id source.
#[derive(Debug, Default)]
pub struct EventIdGenerator {
    counter: AtomicU64,
}

impl EventIdGenerator {
    pub fn new() -> Self {
        Self {
            counter: AtomicU64::new(0),
        }
    }

    /// Produce the next event id.
    pub fn next_id(&self) -> String {
        let counter = self.counter.fetch_add(1, Ordering::SeqCst);
        let millis = chrono::Utc::now().timestamp_millis();
        format!("evt-{}-{}", millis, counter)
    }

    /// How many ids have been handed out.
    pub fn issued(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}
