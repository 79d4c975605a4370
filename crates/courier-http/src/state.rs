//! Shared state handed to every HTTP handler.

use std::sync::Arc;

use courier_core::dispatch::Dispatcher;
use courier_core::leads::LeadStore;
use courier_core::session::SessionManager;
use courier_core::status::StatusBus;

/// All core services the handlers touch.
#[derive(Clone)]
pub struct SharedState {
    pub sessions: Arc<SessionManager>,
    pub dispatcher: Arc<Dispatcher>,
    pub leads: Arc<LeadStore>,
    pub bus: Arc<StatusBus>,
}
