//! Hourly per-user token budget.
//!
//! The window expiry is reset to a full hour on every allowed check, so it
//! is a rolling hold-open timer rather than a fixed or sliding window. Denied
//! checks leave both the counter and the expiry untouched.

use std::sync::Arc;
use std::time::Duration;

use fleet_common::api::RateCheckResponse;

use crate::application::ports::RateWindowStore;
use crate::domain::OrchestratorError;
use crate::domain::agent::validate_user_id;

pub struct RateLimiter {
    store: Arc<dyn RateWindowStore>,
    budget: u64,
    window: Duration,
}

impl RateLimiter {
    #[must_use]
    pub fn new(store: Arc<dyn RateWindowStore>, budget: u64, window: Duration) -> Self {
        Self {
            store,
            budget,
            window,
        }
    }

    #[must_use]
    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub async fn check(
        &self,
        user_id: &str,
        tokens: u64,
    ) -> Result<RateCheckResponse, OrchestratorError> {
        validate_user_id(user_id)?;
        let decision = self
            .store
            .try_consume(user_id, tokens, self.budget, self.window)
            .await?;

        if !decision.allowed {
            tracing::info!(
                %user_id,
                tokens,
                current = decision.current_tokens,
                limit = self.budget,
                "rate limit exceeded"
            );
        }
        Ok(RateCheckResponse {
            allowed: decision.allowed,
            current_tokens: decision.current_tokens,
            requested_tokens: tokens,
            limit: self.budget,
            message: (!decision.allowed).then(|| "Hourly token limit exceeded".to_string()),
        })
    }
}
