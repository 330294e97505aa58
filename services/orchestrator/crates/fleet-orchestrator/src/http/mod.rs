//! HTTP surface: axum router, bearer gate, typed JSON payloads.

mod agents;
pub mod auth;
pub mod error;
mod quota;
mod services;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware;
use axum::routing::{get, post};
use fleet_common::api::HealthResponse;
use tower_http::trace::TraceLayer;

use crate::app::AppContext;

pub use error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<AppContext>,
    pub secret_digest: [u8; 32],
}

/// Build the router. Everything except `/health` sits behind the bearer gate.
pub fn router(ctx: Arc<AppContext>, api_secret: &str) -> Router {
    let state = AppState {
        ctx,
        secret_digest: auth::digest(api_secret),
    };

    let api = Router::new()
        .route("/api/virtual-keys", post(services::issue_key))
        .route("/api/agents/provision", post(agents::provision))
        .route("/api/agents/{agent_id}/deprovision", post(agents::deprovision))
        .route("/api/agents/{agent_id}/pause", post(agents::pause))
        .route("/api/agents/{agent_id}/resume", post(agents::resume))
        .route("/api/agents/{agent_id}/status", get(agents::status))
        .route("/api/credits/check", post(quota::check_credits))
        .route("/api/credits/deduct", post(quota::deduct_credits))
        .route("/api/credits/set", post(quota::set_credits))
        .route("/api/rate-limit/check", post(quota::check_rate_limit))
        .route("/api/gateway/smoke-test", post(services::smoke_test))
        .route(
            "/api/services/messaging-bridge/deploy",
            post(services::deploy_bridge),
        )
        .route(
            "/api/services/messaging-bridge/status",
            get(services::bridge_status),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer,
        ));

    Router::new()
        .route("/health", get(health))
        .merge(api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let report = state.ctx.health.report().await;
    let status = if report.status == "healthy" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
