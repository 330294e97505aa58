//! Usage settlement: deduct a reported cost and pause the agent that
//! incurred it once the user's balance is exhausted.

use std::sync::Arc;

use fleet_common::api::DeductResponse;

use crate::application::services::credits::CreditLedger;
use crate::application::services::lifecycle::Reconciler;
use crate::domain::OrchestratorError;

pub struct UsageSettlement {
    ledger: Arc<CreditLedger>,
    reconciler: Arc<Reconciler>,
}

impl UsageSettlement {
    #[must_use]
    pub fn new(ledger: Arc<CreditLedger>, reconciler: Arc<Reconciler>) -> Self {
        Self { ledger, reconciler }
    }

    /// The deduction always stands; pausing is best effort.
    pub async fn settle(
        &self,
        user_id: &str,
        cost_cents: i64,
        agent_id: Option<&str>,
    ) -> Result<DeductResponse, OrchestratorError> {
        let new_balance_cents = self.ledger.deduct(user_id, cost_cents).await?;

        let agent_paused = match agent_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(agent_id) if new_balance_cents <= 0 => {
                self.pause_exhausted(user_id, agent_id).await
            }
            _ => false,
        };

        Ok(DeductResponse {
            new_balance_cents,
            deducted_cents: cost_cents,
            agent_paused,
        })
    }

    async fn pause_exhausted(&self, user_id: &str, agent_id: &str) -> bool {
        match self.reconciler.record(agent_id).await {
            Ok(record) if record.user_id == user_id => {}
            Ok(_) => {
                tracing::warn!(%user_id, %agent_id, "agent belongs to another user, not pausing");
                return false;
            }
            Err(err) => {
                tracing::warn!(%user_id, %agent_id, error = %err, "cannot resolve agent to pause");
                return false;
            }
        }

        match self.reconciler.pause(agent_id).await {
            Ok(_) => {
                tracing::info!(%user_id, %agent_id, "balance exhausted, agent paused");
                true
            }
            Err(err) => {
                tracing::warn!(%user_id, %agent_id, error = %err, "failed to pause agent");
                false
            }
        }
    }
}
