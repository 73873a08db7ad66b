//! REST API handlers.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use tracing::warn;

use wakegate_access::AccessError;
use wakegate_gate::ConnectAttempt;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(Serialize)]
struct ApiResponse<T: Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

fn access_error_response(e: &AccessError) -> axum::response::Response {
    let status = match e {
        AccessError::NotOperator(_) => StatusCode::FORBIDDEN,
        AccessError::UnknownPlayer(_) => StatusCode::NOT_FOUND,
        AccessError::InvalidUuid(_) => StatusCode::BAD_REQUEST,
        AccessError::Io { .. } | AccessError::Parse { .. } | AccessError::Encode(_) => {
            warn!(error = %e, "allow-list update failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    error_response(&e.to_string(), status).into_response()
}

// ── Proxy events ───────────────────────────────────────────────

/// Verdict for a connection attempt.
#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Join/disconnect body.
#[derive(Debug, Deserialize)]
pub struct PlayerEvent {
    pub player: String,
    pub server: String,
}

/// POST /api/v1/events/connect
pub async fn connect(
    State(state): State<ApiState>,
    Json(attempt): Json<ConnectAttempt>,
) -> impl IntoResponse {
    let verdict = state.gate.on_connection_attempt(&attempt).await;
    ApiResponse::ok(ConnectResponse {
        allowed: verdict.is_allowed(),
        message: verdict.message().map(str::to_string),
    })
}

/// POST /api/v1/events/join
pub async fn join(State(state): State<ApiState>, Json(event): Json<PlayerEvent>) -> impl IntoResponse {
    state.gate.on_join(&event.player, &event.server).await;
    ApiResponse::ok("recorded")
}

/// POST /api/v1/events/disconnect
pub async fn disconnect(
    State(state): State<ApiState>,
    Json(event): Json<PlayerEvent>,
) -> impl IntoResponse {
    state.gate.on_disconnect(&event.player, &event.server).await;
    ApiResponse::ok("recorded")
}

// ── Lifecycle ──────────────────────────────────────────────────

/// GET /api/v1/lifecycle
pub async fn lifecycle(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.gate.lifecycle().snapshot().await)
}

// ── Allow-list ─────────────────────────────────────────────────

/// Add request body. `operator` is the acting player's UUID.
#[derive(Debug, Deserialize)]
pub struct AddRequest {
    pub operator: String,
    pub uuid: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct OperatorQuery {
    pub operator: String,
}

/// GET /api/v1/whitelist
pub async fn list_whitelist(State(state): State<ApiState>) -> impl IntoResponse {
    ApiResponse::ok(state.allow_list.list())
}

/// POST /api/v1/whitelist
pub async fn add_to_whitelist(
    State(state): State<ApiState>,
    Json(req): Json<AddRequest>,
) -> impl IntoResponse {
    match state.allow_list.add(&req.operator, &req.uuid, &req.name) {
        Ok(entry) => (StatusCode::CREATED, ApiResponse::ok(entry)).into_response(),
        Err(e) => access_error_response(&e),
    }
}

/// DELETE /api/v1/whitelist/{name}?operator=
pub async fn remove_from_whitelist(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<OperatorQuery>,
) -> impl IntoResponse {
    match state.allow_list.remove_by_name(&query.operator, &name) {
        Ok(entry) => ApiResponse::ok(entry).into_response(),
        Err(e) => access_error_response(&e),
    }
}
