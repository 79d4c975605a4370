//! Session lifecycle coordination.
//!
//! The manager owns the map of session id to live session entry. Lifecycle
//! events raised by each session's provider client arrive on a dedicated
//! channel and are applied by a per-session task, so transition handling
//! never contends with dispatch lookups beyond the map lock itself.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::paths;
use crate::provider::{ProviderClient, ProviderEvent, ProviderFactory};
use crate::status::StatusBus;

use super::state::{SessionError, SessionSnapshot, SessionState};

/// Topic for session lifecycle events on the status bus.
pub const SESSION_STATUS_TOPIC: &str = "session:status";

/// Upper bound on waiting for a provider client to tear itself down.
const DESTROY_TIMEOUT: Duration = Duration::from_secs(5);

struct SessionEntry {
    state: SessionState,
    linkage_token: Option<String>,
    client: Arc<dyn ProviderClient>,
    event_task: JoinHandle<()>,
}

impl SessionEntry {
    fn snapshot(&self, id: &str) -> SessionSnapshot {
        SessionSnapshot {
            id: id.to_string(),
            state: self.state,
            has_linkage_token: self.linkage_token.is_some(),
        }
    }
}

type SessionMap = Mutex<HashMap<String, SessionEntry>>;

/// Owns every live session and drives their state machines.
pub struct SessionManager {
    sessions: Arc<SessionMap>,
    provider: Arc<dyn ProviderFactory>,
    bus: Arc<StatusBus>,
    data_dir: PathBuf,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn ProviderFactory>, bus: Arc<StatusBus>, data_dir: PathBuf) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(HashMap::new())),
            provider,
            bus,
            data_dir,
        }
    }

    /// Create a session, or return the existing one unchanged.
    ///
    /// Returns immediately: provider initialization and the transitions it
    /// causes happen asynchronously, surfaced through the status bus. A
    /// repeated create is a no-op that does not touch the provider client.
    pub fn create(&self, id: &str) -> Result<SessionSnapshot, SessionError> {
        validate_session_id(id)?;

        let mut sessions = self.sessions.lock().unwrap();
        if let Some(entry) = sessions.get(id) {
            return Ok(entry.snapshot(id));
        }

        let auth_dir = paths::auth_dir(&self.data_dir, id);
        let (client, events) = self.provider.connect(id, &auth_dir);

        let event_task = tokio::spawn(run_event_loop(
            Arc::clone(&self.sessions),
            Arc::clone(&self.bus),
            id.to_string(),
            events,
        ));

        let entry = SessionEntry {
            state: SessionState::Starting,
            linkage_token: None,
            client: Arc::clone(&client),
            event_task,
        };
        let snapshot = entry.snapshot(id);
        sessions.insert(id.to_string(), entry);
        drop(sessions);

        log::info!("session {id} created, initializing provider client");
        let id = id.to_string();
        tokio::spawn(async move {
            // Initialization failure is only observable as the absence of a
            // connected transition; callers poll or time out.
            if let Err(err) = client.initialize().await {
                log::warn!("provider initialization failed for session {id}: {err}");
            }
        });

        Ok(snapshot)
    }

    pub fn get(&self, id: &str) -> Option<SessionSnapshot> {
        let sessions = self.sessions.lock().unwrap();
        sessions.get(id).map(|entry| entry.snapshot(id))
    }

    pub fn list_all(&self) -> Vec<SessionSnapshot> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .iter()
            .map(|(id, entry)| entry.snapshot(id))
            .collect()
    }

    /// Current linkage token, when one is issued.
    pub fn linkage_token(&self, id: &str) -> Result<String, SessionError> {
        let sessions = self.sessions.lock().unwrap();
        let entry = sessions
            .get(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        entry
            .linkage_token
            .clone()
            .ok_or_else(|| SessionError::NoLinkageToken(id.to_string()))
    }

    pub fn state(&self, id: &str) -> Result<SessionState, SessionError> {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .get(id)
            .map(|entry| entry.state)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Provider handle for a session, if it exists. The dispatch engine
    /// resolves this fresh before every send attempt.
    pub fn client(&self, id: &str) -> Option<Arc<dyn ProviderClient>> {
        let sessions = self.sessions.lock().unwrap();
        sessions.get(id).map(|entry| Arc::clone(&entry.client))
    }

    /// Tear a session down: stop its event loop, ask the provider client to
    /// release its resources (bounded wait), and delete its on-disk
    /// artifacts.
    ///
    /// An in-flight dispatch against the session is not interrupted; its
    /// remaining send attempts fail individually.
    pub async fn destroy(&self, id: &str) -> Result<(), SessionError> {
        let entry = {
            let mut sessions = self.sessions.lock().unwrap();
            sessions
                .remove(id)
                .ok_or_else(|| SessionError::NotFound(id.to_string()))?
        };
        entry.event_task.abort();

        if tokio::time::timeout(DESTROY_TIMEOUT, entry.client.destroy())
            .await
            .is_err()
        {
            log::warn!("provider client for session {id} did not shut down in time");
        }
        paths::remove_session_artifacts(&self.data_dir, id);
        log::info!("session {id} destroyed");
        Ok(())
    }
}

async fn run_event_loop(
    sessions: Arc<SessionMap>,
    bus: Arc<StatusBus>,
    id: String,
    mut events: mpsc::UnboundedReceiver<ProviderEvent>,
) {
    while let Some(event) = events.recv().await {
        apply_event(&sessions, &bus, &id, event);
    }
    log::debug!("provider event channel closed for session {id}");
}

/// Apply one provider event and publish the resulting status.
///
/// Transitions are unconditional: the provider is the source of truth, so a
/// connected session that receives a fresh linkage token drops back to
/// awaiting linkage (re-authentication flow).
fn apply_event(sessions: &SessionMap, bus: &StatusBus, id: &str, event: ProviderEvent) {
    let payload = {
        let mut sessions = sessions.lock().unwrap();
        let Some(entry) = sessions.get_mut(id) else {
            log::debug!("dropping provider event for destroyed session {id}");
            return;
        };

        match event {
            ProviderEvent::LinkageToken { token } => {
                entry.state = SessionState::AwaitingLinkage;
                entry.linkage_token = Some(token);
            }
            ProviderEvent::Ready => {
                entry.state = SessionState::Connected;
                entry.linkage_token = None;
            }
            ProviderEvent::Disconnected => {
                entry.state = SessionState::Disconnected;
                entry.linkage_token = None;
            }
        }
        log::info!("session {id} is now {}", entry.state);

        match &entry.linkage_token {
            Some(token) => json!({
                "sessionId": id,
                "state": entry.state,
                "linkageToken": token,
            }),
            None => json!({ "sessionId": id, "state": entry.state }),
        }
    };
    bus.publish(SESSION_STATUS_TOPIC, &payload);
}

/// Session ids key on-disk artifact directories, so they must be a single
/// normal path component.
fn validate_session_id(id: &str) -> Result<(), SessionError> {
    let mut components = Path::new(id).components();
    match components.next() {
        Some(Component::Normal(_)) if components.next().is_none() => Ok(()),
        _ => Err(SessionError::InvalidId(id.to_string())),
    }
}

// ============================================================================
// TESTS
// ============================================================================
