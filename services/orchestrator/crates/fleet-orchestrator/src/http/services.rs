use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use fleet_common::api::{
    BridgeDeployResponse, BridgeStatusResponse, IssueKeyRequest, IssueKeyResponse,
    SmokeTestRequest, SmokeTestResponse,
};

use crate::domain::OrchestratorError;
use crate::http::{ApiError, AppState};

pub async fn issue_key(
    State(state): State<AppState>,
    payload: Result<Json<IssueKeyRequest>, JsonRejection>,
) -> Result<Json<IssueKeyResponse>, ApiError> {
    let Json(request) = payload?;
    let response = state
        .ctx
        .gateway
        .issue_key(&request.user_id, request.max_budget)
        .await?;
    Ok(Json(response))
}

/// The body is optional; an empty request runs the default prompt.
pub async fn smoke_test(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SmokeTestResponse>, ApiError> {
    let request: SmokeTestRequest = if body.iter().all(u8::is_ascii_whitespace) {
        SmokeTestRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| OrchestratorError::Validation(format!("invalid JSON body: {e}")))?
    };
    let response = state
        .ctx
        .gateway
        .smoke_test(request.message.as_deref(), request.model.as_deref())
        .await?;
    Ok(Json(response))
}

pub async fn deploy_bridge(
    State(state): State<AppState>,
) -> Result<Json<BridgeDeployResponse>, ApiError> {
    Ok(Json(state.ctx.bridge.deploy().await?))
}

pub async fn bridge_status(
    State(state): State<AppState>,
) -> Result<Json<BridgeStatusResponse>, ApiError> {
    Ok(Json(state.ctx.bridge.status().await?))
}
