//! REST handlers for the control API.
//!
//! Success responses carry the resource JSON directly; failures carry
//! `{"error": message}` with a matching status code.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use courier_core::dispatch::PacingPolicy;
use courier_core::leads::{FunnelStage, LeadError, LeadUpdate};
use courier_core::session::SessionError;

use super::SharedState;

type Reply = (StatusCode, Json<Value>);

fn ok<T: serde::Serialize>(value: T) -> Reply {
    (
        StatusCode::OK,
        Json(serde_json::to_value(value).unwrap_or_default()),
    )
}

fn error(status: StatusCode, message: impl std::fmt::Display) -> Reply {
    (status, Json(json!({ "error": message.to_string() })))
}

fn session_error(err: SessionError) -> Reply {
    let status = match err {
        SessionError::NotFound(_) | SessionError::NoLinkageToken(_) => StatusCode::NOT_FOUND,
        SessionError::InvalidId(_) => StatusCode::BAD_REQUEST,
    };
    error(status, err)
}

fn lead_error(err: LeadError) -> Reply {
    let status = match err {
        LeadError::NotFound(_) => StatusCode::NOT_FOUND,
        LeadError::MissingFields => StatusCode::BAD_REQUEST,
    };
    error(status, err)
}

// ============================================================================
// SESSIONS
// ============================================================================

pub async fn list_sessions(State(state): State<SharedState>) -> Reply {
    ok(state.sessions.list_all())
}

#[derive(Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub id: String,
}

pub async fn create_session(
    State(state): State<SharedState>,
    Json(request): Json<CreateSessionRequest>,
) -> Reply {
    match state.sessions.create(&request.id) {
        Ok(snapshot) => ok(snapshot),
        Err(err) => session_error(err),
    }
}

pub async fn destroy_session(
    Path(id): Path<String>,
    State(state): State<SharedState>,
) -> Reply {
    match state.sessions.destroy(&id).await {
        Ok(()) => ok(json!({ "ok": true })),
        Err(err) => session_error(err),
    }
}

pub async fn linkage_token(Path(id): Path<String>, State(state): State<SharedState>) -> Reply {
    match state.sessions.linkage_token(&id) {
        Ok(token) => ok(json!({ "token": token })),
        Err(err) => session_error(err),
    }
}

pub async fn session_state(Path(id): Path<String>, State(state): State<SharedState>) -> Reply {
    match state.sessions.state(&id) {
        Ok(session_state) => ok(json!({ "state": session_state })),
        Err(err) => session_error(err),
    }
}

// ============================================================================
// DISPATCH
// ============================================================================

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub pacing: PacingPolicy,
}

pub async fn dispatch(
    State(state): State<SharedState>,
    Json(request): Json<DispatchRequest>,
) -> Reply {
    match state
        .dispatcher
        .dispatch(
            &request.session_id,
            &request.targets,
            &request.message,
            request.pacing,
        )
        .await
    {
        Ok(report) => ok(report),
        Err(err) => error(StatusCode::BAD_REQUEST, err),
    }
}

// ============================================================================
// LEADS
// ============================================================================

pub async fn list_leads(State(state): State<SharedState>) -> Reply {
    ok(state.leads.list())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub notes: String,
}

pub async fn create_lead(
    State(state): State<SharedState>,
    Json(request): Json<CreateLeadRequest>,
) -> Reply {
    match state
        .leads
        .create(&request.name, &request.phone, &request.notes)
    {
        Ok(lead) => ok(lead),
        Err(err) => lead_error(err),
    }
}

pub async fn update_lead(
    Path(id): Path<u64>,
    State(state): State<SharedState>,
    Json(update): Json<LeadUpdate>,
) -> Reply {
    match state.leads.update(id, update) {
        Ok(lead) => ok(lead),
        Err(err) => lead_error(err),
    }
}

pub async fn delete_lead(Path(id): Path<u64>, State(state): State<SharedState>) -> Reply {
    match state.leads.remove(id) {
        Ok(()) => ok(json!({ "ok": true })),
        Err(err) => lead_error(err),
    }
}

#[derive(Deserialize)]
pub struct MoveStageRequest {
    pub stage: FunnelStage,
}

pub async fn move_lead_stage(
    Path(id): Path<u64>,
    State(state): State<SharedState>,
    Json(request): Json<MoveStageRequest>,
) -> Reply {
    match state.leads.move_stage(id, request.stage) {
        Ok(lead) => ok(lead),
        Err(err) => lead_error(err),
    }
}

pub async fn lead_history(Path(id): Path<u64>, State(state): State<SharedState>) -> Reply {
    match state.leads.history(id) {
        Ok(history) => ok(history),
        Err(err) => lead_error(err),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageLeadRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub message: String,
}

/// Single-target dispatch to one lead, recorded in its history on success.
pub async fn message_lead(
    Path(id): Path<u64>,
    State(state): State<SharedState>,
    Json(request): Json<MessageLeadRequest>,
) -> Reply {
    let lead = match state.leads.get(id) {
        Ok(lead) => lead,
        Err(err) => return lead_error(err),
    };

    let report = match state
        .dispatcher
        .dispatch(
            &request.session_id,
            &[lead.phone.clone()],
            &request.message,
            PacingPolicy::default(),
        )
        .await
    {
        Ok(report) => report,
        Err(err) => return error(StatusCode::BAD_REQUEST, err),
    };

    if let Some(failure) = report.failed.first() {
        return error(StatusCode::BAD_GATEWAY, &failure.error);
    }
    if let Err(err) = state.leads.record_dispatch(id, &request.message) {
        return lead_error(err);
    }
    ok(json!({ "ok": true }))
}
