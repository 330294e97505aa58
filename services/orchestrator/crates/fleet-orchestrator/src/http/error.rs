use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use fleet_common::api::ErrorBody;

use crate::domain::OrchestratorError;

/// `OrchestratorError` rendered as an HTTP response with a JSON body.
#[derive(Debug)]
pub struct ApiError(pub OrchestratorError);

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(OrchestratorError::Validation(rejection.body_text()))
    }
}

#[must_use]
pub fn status_of(err: &OrchestratorError) -> StatusCode {
    match err {
        OrchestratorError::Validation(_) => StatusCode::BAD_REQUEST,
        OrchestratorError::AgentNotFound(_) | OrchestratorError::NotFound(_) => {
            StatusCode::NOT_FOUND
        }
        OrchestratorError::InvalidState(_) => StatusCode::CONFLICT,
        OrchestratorError::UpstreamGateway { .. } => StatusCode::BAD_GATEWAY,
        OrchestratorError::Runtime(_)
        | OrchestratorError::Store(_)
        | OrchestratorError::Workspace(_)
        | OrchestratorError::GatewayTransport(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = status_of(&self.0);
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "request failed");
        }
        let body = match self.0 {
            OrchestratorError::UpstreamGateway { status, body } => ErrorBody {
                error: format!("LLM gateway returned {status}"),
                upstream_status: Some(status),
                details: Some(body),
            },
            other => ErrorBody {
                error: other.to_string(),
                upstream_status: None,
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}
