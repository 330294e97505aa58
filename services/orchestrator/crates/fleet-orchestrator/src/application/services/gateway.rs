//! Credential issuance and connectivity smoke test against the LLM gateway.

use std::sync::Arc;

use fleet_common::api::{
    DEFAULT_SMOKE_TEST_MESSAGE, DEFAULT_SMOKE_TEST_MODEL, IssueKeyResponse, SmokeTestResponse,
};

use crate::application::ports::LlmGateway;
use crate::domain::OrchestratorError;
use crate::domain::agent::validate_user_id;

pub struct GatewayService {
    gateway: Arc<dyn LlmGateway>,
    default_budget: f64,
}

impl GatewayService {
    #[must_use]
    pub fn new(gateway: Arc<dyn LlmGateway>, default_budget: f64) -> Self {
        Self {
            gateway,
            default_budget,
        }
    }

    pub async fn issue_key(
        &self,
        user_id: &str,
        max_budget: Option<f64>,
    ) -> Result<IssueKeyResponse, OrchestratorError> {
        validate_user_id(user_id)?;
        let max_budget = max_budget.unwrap_or(self.default_budget);
        if !max_budget.is_finite() || max_budget <= 0.0 {
            return Err(OrchestratorError::Validation(
                "max_budget must be a positive number".to_string(),
            ));
        }

        let virtual_key = self.gateway.issue_key(user_id, max_budget).await?;
        tracing::info!(%user_id, max_budget, "virtual key issued");
        Ok(IssueKeyResponse {
            virtual_key,
            user_id: user_id.to_string(),
            max_budget,
        })
    }

    pub async fn smoke_test(
        &self,
        message: Option<&str>,
        model: Option<&str>,
    ) -> Result<SmokeTestResponse, OrchestratorError> {
        let message = message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_SMOKE_TEST_MESSAGE);
        let model = model
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(DEFAULT_SMOKE_TEST_MODEL);
        Ok(self.gateway.smoke_test(message, model).await?)
    }
}
