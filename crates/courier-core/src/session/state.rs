//! Per-session state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a provider session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    /// Client allocated, provider initialization in flight.
    Starting,

    /// A linkage token is issued and waiting for the operator to pair.
    AwaitingLinkage,

    /// Authenticated and able to send.
    Connected,

    /// The provider dropped the session.
    Disconnected,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SessionState::Starting => "starting",
            SessionState::AwaitingLinkage => "awaitingLinkage",
            SessionState::Connected => "connected",
            SessionState::Disconnected => "disconnected",
        };
        write!(f, "{name}")
    }
}

/// Caller-facing view of a session. The linkage token itself is only handed
/// out through the dedicated lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: String,
    pub state: SessionState,
    pub has_linkage_token: bool,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),

    #[error("no linkage token issued for session: {0}")]
    NoLinkageToken(String),

    #[error("invalid session id: {0:?}")]
    InvalidId(String),
}
