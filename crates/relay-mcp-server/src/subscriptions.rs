//! Resource subscription fan-out.
//!
//! Subscriptions are tracked by `(uri, subscriber-token)` so unsubscribe is
//! O(1). Each subscriber owns a bounded channel; `notify_update` pushes a
//! `notifications/resources/updated` event to every live channel and drops
//! the event for subscribers whose buffer is full (best-effort, no retry).

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use relay_mcp_json_rpc::JsonRpcNotification;
use relay_mcp_protocol::resource_updated_notification;

/// Bounded buffer size per subscriber.
const SUBSCRIBER_BUFFER: usize = 10;

/// Uri -> subscriber-token -> delivery channel.
#[derive(Default)]
pub struct SubscriptionManager {
    subscriptions: RwLock<HashMap<String, HashMap<String, mpsc::Sender<JsonRpcNotification>>>>,
}

impl SubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe a token (typically the session id) to a uri.
    ///
    /// Returns the receiving end of the subscriber's bounded channel; an
    /// existing subscription for the same `(uri, token)` is replaced and its
    /// old channel closed.
    pub async fn subscribe(
        &self,
        uri: &str,
        token: &str,
    ) -> mpsc::Receiver<JsonRpcNotification> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let mut subscriptions = self.subscriptions.write().await;
        subscriptions
            .entry(uri.to_string())
            .or_default()
            .insert(token.to_string(), tx);
        debug!(uri = %uri, token = %token, "Resource subscription added");
        rx
    }

    /// Remove one subscription. Returns whether it existed; callers report
    /// success either way.
    pub async fn unsubscribe(&self, uri: &str, token: &str) -> bool {
        let mut subscriptions = self.subscriptions.write().await;
        let removed = subscriptions
            .get_mut(uri)
            .map(|subscribers| subscribers.remove(token).is_some())
            .unwrap_or(false);
        if let Some(subscribers) = subscriptions.get(uri) {
            if subscribers.is_empty() {
                subscriptions.remove(uri);
            }
        }
        if removed {
            debug!(uri = %uri, token = %token, "Resource subscription removed");
        }
        removed
    }

    /// Drop every subscription held by a token (session teardown).
    pub async fn remove_token(&self, token: &str) {
        let mut subscriptions = self.subscriptions.write().await;
        subscriptions.retain(|_, subscribers| {
            subscribers.remove(token);
            !subscribers.is_empty()
        });
    }

    /// Emit `notifications/resources/updated` to every live subscriber of a
    /// uri. Full buffers drop the event; closed channels are pruned.
    pub async fn notify_update(&self, uri: &str) -> usize {
        let notification = resource_updated_notification(uri);
        let mut delivered = 0;

        let mut subscriptions = self.subscriptions.write().await;
        if let Some(subscribers) = subscriptions.get_mut(uri) {
            subscribers.retain(|token, tx| match tx.try_send(notification.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(uri = %uri, token = %token,
                          "Subscriber buffer full, dropping resource update");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(uri = %uri, token = %token, "Pruning closed subscriber channel");
                    false
                }
            });
            if subscribers.is_empty() {
                subscriptions.remove(uri);
            }
        }
        delivered
    }

    pub async fn subscriber_count(&self, uri: &str) -> usize {
        self.subscriptions
            .read()
            .await
            .get(uri)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}
