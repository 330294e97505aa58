//! Bearer-token gate applied before dispatch. Services never see credentials.

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use fleet_common::api::ErrorBody;
use sha2::{Digest, Sha256};

use crate::http::AppState;

/// SHA-256 of a secret. Comparing fixed-length digests keeps the check
/// independent of where the first differing byte is.
#[must_use]
pub fn digest(secret: &str) -> [u8; 32] {
    Sha256::digest(secret.as_bytes()).into()
}

fn bearer(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

pub async fn require_bearer(State(state): State<AppState>, request: Request, next: Next) -> Response {
    match bearer(&request) {
        Some(token) if digest(token) == state.secret_digest => next.run(request).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody {
                error: "Unauthorized".to_string(),
                upstream_status: None,
                details: None,
            }),
        )
            .into_response(),
    }
}
