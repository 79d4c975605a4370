//! HTTP surface for Courier.
//!
//! REST control API plus a WebSocket event stream, consumed by the operator
//! front-end. CORS is wide open and authentication is deliberately absent:
//! this serves a trusted-network operator tool.

mod routes;
mod state;
mod websocket;

pub use state::SharedState;

use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;

/// Build the full application router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route(
            "/api/sessions",
            get(routes::list_sessions).post(routes::create_session),
        )
        .route("/api/sessions/{id}", delete(routes::destroy_session))
        .route("/api/sessions/{id}/token", get(routes::linkage_token))
        .route("/api/sessions/{id}/state", get(routes::session_state))
        .route("/api/dispatch", post(routes::dispatch))
        .route("/api/leads", get(routes::list_leads).post(routes::create_lead))
        .route(
            "/api/leads/{id}",
            put(routes::update_lead).delete(routes::delete_lead),
        )
        .route("/api/leads/{id}/stage", post(routes::move_lead_stage))
        .route("/api/leads/{id}/history", get(routes::lead_history))
        .route("/api/leads/{id}/message", post(routes::message_lead))
        .route("/ws/events", get(websocket::ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// TESTS
// ============================================================================
