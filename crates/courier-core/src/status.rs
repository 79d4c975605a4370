//! Best-effort status broadcasting.
//!
//! The StatusBus fans session lifecycle and dispatch progress records out to
//! every connected observer (WebSocket clients, tests). Delivery is fire and
//! forget: an observer that falls behind lags and skips events instead of
//! blocking the publisher, and a dropped observer prunes itself.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Events buffered per observer before a slow observer starts lagging.
const DEFAULT_CAPACITY: usize = 1024;

/// An open, keyed notification record.
///
/// Payload shapes are append-only; observers must tolerate unknown keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Topic identifier (e.g. "session:status", "dispatch:progress").
    pub topic: String,

    /// Free-form JSON payload.
    pub payload: serde_json::Value,
}

/// Publish-subscribe registry for status events.
///
/// Wraps a tokio broadcast channel: every observer receives every event
/// published after it subscribed, in publish order.
pub struct StatusBus {
    sender: broadcast::Sender<StatusEvent>,
}

impl StatusBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// The capacity bounds how far an observer may fall behind before it
    /// starts missing events.
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to every current observer.
    ///
    /// Returns the number of observers reached; 0 when nobody is listening.
    pub fn publish<T: Serialize>(&self, topic: &str, payload: &T) -> usize {
        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => {
                log::warn!("failed to serialize status payload for {topic}: {err}");
                return 0;
            }
        };

        let event = StatusEvent {
            topic: topic.to_string(),
            payload,
        };
        self.sender.send(event).unwrap_or(0)
    }

    /// Register an observer. Past events are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.sender.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================
