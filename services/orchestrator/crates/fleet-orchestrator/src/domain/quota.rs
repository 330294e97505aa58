//! Pure quota arithmetic shared by the credit ledger and the rate limiter.

use crate::domain::error::OrchestratorError;

/// Convert a USD amount to whole cents, rounding down.
///
/// Negative, non-finite and out-of-range amounts are rejected.
#[allow(clippy::cast_possible_truncation)]
pub fn dollars_to_cents(amount: f64) -> Result<i64, OrchestratorError> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(OrchestratorError::Validation(
            "estimated_cost must be a non-negative number".to_string(),
        ));
    }
    let cents = (amount * 100.0).floor();
    // i64::MAX is not exactly representable; stay well below it.
    if cents >= 9.0e18 {
        return Err(OrchestratorError::Validation(
            "estimated_cost is too large".to_string(),
        ));
    }
    Ok(cents as i64)
}

/// A cached balance covers a cost when it is at least as large.
#[must_use]
pub fn is_affordable(balance_cents: i64, cost_cents: i64) -> bool {
    balance_cents >= cost_cents
}

/// Would adding `tokens` to the window push it past `limit`?
#[must_use]
pub fn exceeds_budget(current: u64, tokens: u64, limit: u64) -> bool {
    current.saturating_add(tokens) > limit
}

pub fn validate_deduction(cost_cents: i64) -> Result<(), OrchestratorError> {
    if cost_cents < 0 {
        return Err(OrchestratorError::Validation(
            "cost_cents must not be negative; use set to credit a balance".to_string(),
        ));
    }
    Ok(())
}
