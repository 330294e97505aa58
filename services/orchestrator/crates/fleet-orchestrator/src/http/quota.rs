use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use fleet_common::api::{
    CreditCheckRequest, CreditCheckResponse, DeductRequest, DeductResponse, RateCheckRequest,
    RateCheckResponse, SetBalanceRequest, SetBalanceResponse,
};

use crate::http::{ApiError, AppState};

pub async fn check_credits(
    State(state): State<AppState>,
    payload: Result<Json<CreditCheckRequest>, JsonRejection>,
) -> Result<Json<CreditCheckResponse>, ApiError> {
    let Json(request) = payload?;
    let response = state
        .ctx
        .ledger
        .check(&request.user_id, request.estimated_cost)
        .await?;
    Ok(Json(response))
}

/// Deduction goes through usage settlement so an exhausted balance can pause
/// the agent that spent it.
pub async fn deduct_credits(
    State(state): State<AppState>,
    payload: Result<Json<DeductRequest>, JsonRejection>,
) -> Result<Json<DeductResponse>, ApiError> {
    let Json(request) = payload?;
    let response = state
        .ctx
        .usage
        .settle(
            &request.user_id,
            request.cost_cents,
            request.agent_id.as_deref(),
        )
        .await?;
    Ok(Json(response))
}

pub async fn set_credits(
    State(state): State<AppState>,
    payload: Result<Json<SetBalanceRequest>, JsonRejection>,
) -> Result<Json<SetBalanceResponse>, ApiError> {
    let Json(request) = payload?;
    let response = state
        .ctx
        .ledger
        .set(&request.user_id, request.balance_cents)
        .await?;
    Ok(Json(response))
}

pub async fn check_rate_limit(
    State(state): State<AppState>,
    payload: Result<Json<RateCheckRequest>, JsonRejection>,
) -> Result<Json<RateCheckResponse>, ApiError> {
    let Json(request) = payload?;
    let response = state
        .ctx
        .limiter
        .check(&request.user_id, request.tokens)
        .await?;
    Ok(Json(response))
}
