use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::de::DeserializeOwned;

use crate::engine::{ClaimRequest, Engine, NewSlot, SlotListFilter, SlotPatch};
use crate::identity::Caller;

use super::AppState;
use super::error::{ApiError, ApiResult};
use super::response::{DataResponse, DeniedCount, HealthResponse};

fn engine_for(state: &AppState, caller: &Caller) -> ApiResult<Arc<Engine>> {
    Ok(state.leagues.get_or_create(&caller.league_id)?)
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> ApiResult<T> {
    body.map(|Json(v)| v)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// Optional JSON body: empty means `T::default()`.
fn optional_body<T: DeserializeOwned + Default>(bytes: &Bytes) -> ApiResult<T> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(bytes).map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))
}

// ── Slots ────────────────────────────────────────────────

/// POST /slots
pub async fn create_slot(
    caller: Caller,
    State(state): State<AppState>,
    body: Result<Json<NewSlot>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let input = json_body(body)?;
    let engine = engine_for(&state, &caller)?;
    let slot = engine.create_slot(&caller, input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: slot })))
}

/// GET /slots?division&status&dateFrom&dateTo
pub async fn list_slots(
    caller: Caller,
    State(state): State<AppState>,
    query: Result<Query<SlotListFilter>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(filter) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let engine = engine_for(&state, &caller)?;
    let slots = engine.list_slots(&filter).await?;
    tracing::debug!(count = slots.len(), "listed slots");
    Ok(Json(DataResponse { data: slots }))
}

/// PATCH /slots/{division}/{slotId}
pub async fn patch_slot(
    caller: Caller,
    State(state): State<AppState>,
    Path((division, slot_id)): Path<(String, String)>,
    body: Result<Json<SlotPatch>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let patch = json_body(body)?;
    let engine = engine_for(&state, &caller)?;
    let slot = engine.patch_slot(&caller, &division, &slot_id, patch).await?;
    Ok(Json(DataResponse { data: slot }))
}

/// PATCH /slots/{division}/{slotId}/cancel
pub async fn cancel_slot(
    caller: Caller,
    State(state): State<AppState>,
    Path((division, slot_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let engine = engine_for(&state, &caller)?;
    let slot = engine.cancel_slot(&caller, &division, &slot_id).await?;
    Ok(Json(DataResponse { data: slot }))
}

// ── Claims ───────────────────────────────────────────────

/// POST /slots/{division}/{slotId}/requests
pub async fn claim_slot(
    caller: Caller,
    State(state): State<AppState>,
    Path((division, slot_id)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let request: ClaimRequest = optional_body(&body)?;
    let engine = engine_for(&state, &caller)?;
    let result = engine.claim_slot(&caller, &division, &slot_id, request).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: result })))
}

/// GET /slots/{division}/{slotId}/requests
pub async fn list_claims(
    caller: Caller,
    State(state): State<AppState>,
    Path((division, slot_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let engine = engine_for(&state, &caller)?;
    let claims = engine.list_claims(&division, &slot_id).await?;
    Ok(Json(DataResponse { data: claims }))
}

/// PATCH /slots/{division}/{slotId}/requests/{requestId}/approve
pub async fn approve_claim(
    caller: Caller,
    State(state): State<AppState>,
    Path((division, slot_id, request_id)): Path<(String, String, String)>,
) -> ApiResult<impl IntoResponse> {
    let engine = engine_for(&state, &caller)?;
    let result = engine
        .approve_claim(&caller, &division, &slot_id, &request_id)
        .await?;
    Ok(Json(DataResponse { data: result }))
}

/// PATCH /slots/{division}/{slotId}/requests/deny-pending
pub async fn deny_pending(
    caller: Caller,
    State(state): State<AppState>,
    Path((division, slot_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let engine = engine_for(&state, &caller)?;
    let denied = engine
        .deny_pending_claims(&caller, &division, &slot_id)
        .await?;
    Ok(Json(DataResponse {
        data: DeniedCount { denied },
    }))
}

// ── Health ───────────────────────────────────────────────

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        leagues: state.leagues.len(),
    })
}
