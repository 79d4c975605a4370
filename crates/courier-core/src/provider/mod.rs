//! Messaging provider abstraction.
//!
//! The session manager drives one provider client per session: the client
//! owns the authenticated connection and raises lifecycle events back over a
//! per-session channel handed out at connect time. Real transports live
//! outside this crate; the [`local`] module ships an in-process simulator
//! used by the daemon and by tests.

pub mod local;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Lifecycle events a provider client may raise after [`ProviderClient::initialize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// A pairing credential was issued; the operator must complete linkage.
    LinkageToken { token: String },

    /// The session is authenticated and can send messages.
    Ready,

    /// The provider dropped the session.
    Disconnected,
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("session is not connected")]
    NotConnected,

    #[error("provider rejected the message: {0}")]
    Rejected(String),
}

/// One authenticated connection instance to the messaging provider.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Begin the asynchronous connection. Lifecycle progress is reported
    /// through the event channel, not through the return value; an error
    /// here only means the attempt could not even start.
    async fn initialize(&self) -> Result<(), ProviderError>;

    /// Deliver `body` to `address` (canonical chat-address form).
    async fn send_message(&self, address: &str, body: &str) -> Result<(), ProviderError>;

    /// Release client-side resources. Best-effort; callers bound the wait.
    async fn destroy(&self);
}

/// Builds provider clients bound to a session id.
pub trait ProviderFactory: Send + Sync {
    /// Create a client whose credential material lives under `auth_dir`,
    /// plus the channel its lifecycle events arrive on.
    fn connect(
        &self,
        session_id: &str,
        auth_dir: &Path,
    ) -> (Arc<dyn ProviderClient>, mpsc::UnboundedReceiver<ProviderEvent>);
}
