use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use fleet_common::api::{AgentStatusReport, LifecycleResponse, ProvisionRequest, ProvisionResponse};

use crate::http::{ApiError, AppState};

pub async fn provision(
    State(state): State<AppState>,
    payload: Result<Json<ProvisionRequest>, JsonRejection>,
) -> Result<Json<ProvisionResponse>, ApiError> {
    let Json(request) = payload?;
    Ok(Json(state.ctx.provisioner.provision(request).await?))
}

pub async fn deprovision(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<LifecycleResponse>, ApiError> {
    Ok(Json(state.ctx.reconciler.deprovision(&agent_id).await?))
}

pub async fn pause(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<LifecycleResponse>, ApiError> {
    Ok(Json(state.ctx.reconciler.pause(&agent_id).await?))
}

pub async fn resume(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<LifecycleResponse>, ApiError> {
    Ok(Json(state.ctx.reconciler.resume(&agent_id).await?))
}

pub async fn status(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> Result<Json<AgentStatusReport>, ApiError> {
    Ok(Json(state.ctx.reconciler.status(&agent_id).await?))
}
