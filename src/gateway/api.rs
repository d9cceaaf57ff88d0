//! REST handlers for sessions, chat turns, health and metrics.
//!
//! Errors are returned as `{"error": ...}` with 404 for unknown sessions,
//! 400 for invalid input and 502 when the agent fails a turn.

use super::AppState;
use crate::agent::{TurnRequest, TurnState};
use crate::observability::ObserverMetric;
use crate::sessions::SessionError;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use std::time::Instant;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

fn session_error_response(e: &SessionError) -> Response {
    let status = match e {
        SessionError::NotFound(_) => StatusCode::NOT_FOUND,
        SessionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
    };
    error_response(status, e.to_string())
}

// ── Query parameters ─────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub active: Option<bool>,
    pub limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<usize>,
}

const DEFAULT_HISTORY_LIMIT: usize = 10;

// ── Sessions ─────────────────────────────────────────────────────

/// POST /api/sessions
pub async fn handle_create_session(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.sessions().create_session();
    (StatusCode::CREATED, Json(session))
}

/// GET /api/sessions — all sessions, or `?active=true[&limit=N]` for live ones only
pub async fn handle_list_sessions(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> impl IntoResponse {
    let sessions = state.sessions();
    let listed = if params.active.unwrap_or(false) {
        sessions.list_active_sessions(params.limit.unwrap_or_else(|| sessions.default_list_limit()))
    } else {
        let mut all = sessions.list_sessions();
        if let Some(limit) = params.limit {
            all.truncate(limit);
        }
        all
    };

    Json(serde_json::json!({
        "count": listed.len(),
        "sessions": listed,
    }))
}

/// DELETE /api/sessions
pub async fn handle_delete_all_sessions(State(state): State<AppState>) -> impl IntoResponse {
    let removed = state.sessions().delete_all_sessions();
    Json(serde_json::json!({ "removed": removed }))
}

/// GET /api/sessions/stats
pub async fn handle_session_stats(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.sessions().stats())
}

/// POST /api/sessions/cleanup
pub async fn handle_cleanup_sessions(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.sessions().cleanup_expired())
}

/// GET /api/sessions/{id}
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match state.sessions().get_session(&id) {
        Ok(session) => Json(session).into_response(),
        Err(e) => session_error_response(&e),
    }
}

/// GET /api/sessions/{id}/history?limit=N
pub async fn handle_session_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<HistoryQuery>,
) -> Response {
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    match state.sessions().history(&id, limit) {
        Ok(messages) => Json(serde_json::json!({
            "session_id": id,
            "messages": messages,
        }))
        .into_response(),
        Err(e) => session_error_response(&e),
    }
}

/// DELETE /api/sessions/{id}
pub async fn handle_delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let existed = state.sessions().delete_session(&id);
    Json(serde_json::json!({ "existed": existed }))
}

// ── Chat ─────────────────────────────────────────────────────────

/// POST /api/chat — run one turn
pub async fn handle_chat(
    State(state): State<AppState>,
    Json(request): Json<TurnRequest>,
) -> Response {
    let started = Instant::now();
    let result = state.chat.process_turn(request).await;
    state
        .observer
        .record_metric(&ObserverMetric::RequestLatency(started.elapsed()));

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => return session_error_response(&e),
    };

    match (outcome.state, outcome.reply) {
        (TurnState::Complete, Some(reply)) => Json(serde_json::json!({
            "response": reply.content,
            "session_id": outcome.session_id,
            "message_id": reply.id,
            "timestamp": reply.created_at,
            "created": outcome.created,
            "city": outcome.city,
            "used_location": outcome.used_location,
            "weather": outcome.weather,
            "air_quality": outcome.air_quality,
        }))
        .into_response(),
        _ => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({
                "error": outcome.failure.unwrap_or_else(|| "agent failed".into()),
                "state": TurnState::Failed,
                "session_id": outcome.session_id,
                "created": outcome.created,
            })),
        )
            .into_response(),
    }
}

// ── Health & metrics ────────────────────────────────────────────

/// GET /api/health
pub async fn handle_health(State(state): State<AppState>) -> impl IntoResponse {
    let weather_configured = state.chat.has_weather_source();
    let healthy = state.llm_key_configured && weather_configured;
    let stats = state.sessions().stats();

    Json(serde_json::json!({
        "status": if healthy { "healthy" } else { "degraded" },
        "service": "skycast",
        "agent": state.chat.agent_name(),
        "model": state.model,
        "llm_key_configured": state.llm_key_configured,
        "weather_configured": weather_configured,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "sessions": stats,
    }))
}

/// GET /metrics — Prometheus text exposition
pub async fn handle_metrics(State(state): State<AppState>) -> Response {
    // Refresh session gauges before rendering.
    state.sessions().stats();
    match state.observer.render() {
        Some(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        None => error_response(StatusCode::NOT_FOUND, "metrics backend is not enabled"),
    }
}
