//! Credit ledger over the cached per-user balance.
//!
//! The authoritative balance lives in an external billing store; this cache
//! fails open: a user with no cached balance is always allowed.

use std::sync::Arc;

use fleet_common::api::{CreditCheckResponse, SetBalanceResponse};

use crate::application::ports::CreditStore;
use crate::domain::OrchestratorError;
use crate::domain::agent::validate_user_id;
use crate::domain::quota::{dollars_to_cents, is_affordable, validate_deduction};

pub struct CreditLedger {
    store: Arc<dyn CreditStore>,
}

impl CreditLedger {
    #[must_use]
    pub fn new(store: Arc<dyn CreditStore>) -> Self {
        Self { store }
    }

    /// Can the user afford `estimated_cost` (USD)?
    pub async fn check(
        &self,
        user_id: &str,
        estimated_cost: f64,
    ) -> Result<CreditCheckResponse, OrchestratorError> {
        validate_user_id(user_id)?;
        let estimated_cents = dollars_to_cents(estimated_cost)?;

        let Some(balance) = self.store.balance(user_id).await? else {
            tracing::debug!(%user_id, "no cached balance, allowing");
            return Ok(CreditCheckResponse {
                allowed: true,
                balance_cents: None,
                estimated_cents,
                message: Some("No cached balance".to_string()),
            });
        };

        let allowed = is_affordable(balance, estimated_cents);
        if !allowed {
            tracing::info!(%user_id, balance, estimated_cents, "credit check denied");
        }
        Ok(CreditCheckResponse {
            allowed,
            balance_cents: Some(balance),
            estimated_cents,
            message: (!allowed).then(|| "Insufficient credits".to_string()),
        })
    }

    /// Atomically subtract `cost_cents`. The balance may go negative.
    pub async fn deduct(&self, user_id: &str, cost_cents: i64) -> Result<i64, OrchestratorError> {
        validate_user_id(user_id)?;
        validate_deduction(cost_cents)?;
        let balance = self.store.decrement(user_id, cost_cents).await?;
        tracing::info!(%user_id, cost_cents, balance, "credits deducted");
        Ok(balance)
    }

    /// Overwrite the cached balance with the authoritative value.
    pub async fn set(
        &self,
        user_id: &str,
        balance_cents: i64,
    ) -> Result<SetBalanceResponse, OrchestratorError> {
        validate_user_id(user_id)?;
        self.store.set_balance(user_id, balance_cents).await?;
        tracing::info!(%user_id, balance_cents, "balance synced");
        Ok(SetBalanceResponse {
            user_id: user_id.to_string(),
            balance_cents,
        })
    }
}
