//! In-process simulated provider.
//!
//! Stands in for a real messaging transport during development and in tests:
//! lifecycle events can be injected per session, outbound messages are
//! recorded, and sends can be made to fail on demand. In `auto_linking` mode
//! `initialize` issues a fresh linkage token and connects immediately, which
//! is enough to exercise the whole control surface end to end.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{ProviderClient, ProviderError, ProviderEvent, ProviderFactory};

#[derive(Default)]
struct LinkState {
    connected: bool,
    destroyed: bool,
    init_calls: usize,
    fail_reason: Option<String>,
    fail_addresses: HashMap<String, String>,
    sent: Vec<(String, String)>,
}

struct LocalEntry {
    state: Arc<Mutex<LinkState>>,
    events: mpsc::UnboundedSender<ProviderEvent>,
}

/// Factory plus control handle for simulated sessions.
#[derive(Default)]
pub struct LocalProvider {
    entries: Mutex<HashMap<String, LocalEntry>>,
    auto_link: bool,
}

impl LocalProvider {
    /// Manual mode: nothing happens until events are injected with [`emit`].
    ///
    /// [`emit`]: LocalProvider::emit
    pub fn new() -> Self {
        Self::default()
    }

    /// Demo mode: `initialize` issues a token and links immediately.
    pub fn auto_linking() -> Self {
        Self {
            auto_link: true,
            ..Self::default()
        }
    }

    /// Inject a lifecycle event for `session_id`, mirroring it into the
    /// client's simulated link so send behavior matches the announced state.
    pub fn emit(&self, session_id: &str, event: ProviderEvent) {
        let entries = self.entries.lock().unwrap();
        let Some(entry) = entries.get(session_id) else {
            return;
        };

        {
            let mut state = entry.state.lock().unwrap();
            state.connected = matches!(event, ProviderEvent::Ready);
        }
        let _ = entry.events.send(event);
    }

    /// Make every subsequent send for `session_id` fail with `reason`.
    pub fn fail_sends(&self, session_id: &str, reason: &str) {
        if let Some(entry) = self.entries.lock().unwrap().get(session_id) {
            entry.state.lock().unwrap().fail_reason = Some(reason.to_string());
        }
    }

    /// Make sends to one canonical `address` fail with `reason`.
    pub fn fail_sends_to(&self, session_id: &str, address: &str, reason: &str) {
        if let Some(entry) = self.entries.lock().unwrap().get(session_id) {
            entry
                .state
                .lock()
                .unwrap()
                .fail_addresses
                .insert(address.to_string(), reason.to_string());
        }
    }

    /// Messages recorded for `session_id`, as (address, body) pairs.
    pub fn sent_messages(&self, session_id: &str) -> Vec<(String, String)> {
        self.entries
            .lock()
            .unwrap()
            .get(session_id)
            .map(|entry| entry.state.lock().unwrap().sent.clone())
            .unwrap_or_default()
    }

    /// Whether the client for `session_id` has been destroyed.
    pub fn destroyed(&self, session_id: &str) -> bool {
        self.entries
            .lock()
            .unwrap()
            .get(session_id)
            .map(|entry| entry.state.lock().unwrap().destroyed)
            .unwrap_or(false)
    }

    /// How many times `initialize` ran for `session_id`.
    pub fn initialize_count(&self, session_id: &str) -> usize {
        self.entries
            .lock()
            .unwrap()
            .get(session_id)
            .map(|entry| entry.state.lock().unwrap().init_calls)
            .unwrap_or(0)
    }
}

impl ProviderFactory for LocalProvider {
    fn connect(
        &self,
        session_id: &str,
        _auth_dir: &Path,
    ) -> (Arc<dyn ProviderClient>, mpsc::UnboundedReceiver<ProviderEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let state = Arc::new(Mutex::new(LinkState::default()));

        self.entries.lock().unwrap().insert(
            session_id.to_string(),
            LocalEntry {
                state: Arc::clone(&state),
                events: events.clone(),
            },
        );

        let client = Arc::new(LocalClient {
            state,
            events,
            auto_link: self.auto_link,
        });
        (client, receiver)
    }
}

struct LocalClient {
    state: Arc<Mutex<LinkState>>,
    events: mpsc::UnboundedSender<ProviderEvent>,
    auto_link: bool,
}

#[async_trait]
impl ProviderClient for LocalClient {
    async fn initialize(&self) -> Result<(), ProviderError> {
        self.state.lock().unwrap().init_calls += 1;

        if self.auto_link {
            let token = Uuid::new_v4().to_string();
            let _ = self.events.send(ProviderEvent::LinkageToken { token });
            self.state.lock().unwrap().connected = true;
            let _ = self.events.send(ProviderEvent::Ready);
        }
        Ok(())
    }

    async fn send_message(&self, address: &str, body: &str) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        if state.destroyed || !state.connected {
            return Err(ProviderError::NotConnected);
        }
        if let Some(reason) = &state.fail_reason {
            return Err(ProviderError::Rejected(reason.clone()));
        }
        if let Some(reason) = state.fail_addresses.get(address) {
            return Err(ProviderError::Rejected(reason.clone()));
        }

        state.sent.push((address.to_string(), body.to_string()));
        Ok(())
    }

    async fn destroy(&self) {
        let mut state = self.state.lock().unwrap();
        state.destroyed = true;
        state.connected = false;
    }
}
