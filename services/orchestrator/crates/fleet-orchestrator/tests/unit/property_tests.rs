//! Property-based tests for the quota arithmetic and resource naming.
//!
//! Uses `proptest` to verify invariants across many random inputs. The async
//! use cases are driven on a current-thread runtime built per case.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fleet_orchestrator::application::ports::CreditStore;
use fleet_orchestrator::application::services::credits::CreditLedger;
use fleet_orchestrator::application::services::rate_limit::RateLimiter;
use fleet_orchestrator::domain::agent::resource_names;
use fleet_orchestrator::domain::quota::dollars_to_cents;
use fleet_orchestrator::infra::memory::MemoryStore;
use proptest::prelude::*;

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime")
        .block_on(future)
}

// ============================================================================
// Credit ledger
// ============================================================================

proptest! {
    /// A user with no cached balance is allowed whatever the estimate.
    #[test]
    fn prop_missing_balance_always_allows(
        user in "[a-z0-9_-]{1,32}",
        cost in 0.0f64..1.0e6,
    ) {
        let store = Arc::new(MemoryStore::new());
        let ledger = CreditLedger::new(store);
        let check = block_on(ledger.check(&user, cost)).expect("check");
        prop_assert!(check.allowed);
        prop_assert_eq!(check.balance_cents, None);
    }

    /// The final balance is the starting balance minus every deduction, with
    /// no clamping at zero.
    #[test]
    fn prop_deductions_sum_exactly(
        start in -10_000i64..10_000,
        costs in prop::collection::vec(0i64..5_000, 0..20),
    ) {
        let store = Arc::new(MemoryStore::new());
        let ledger = CreditLedger::new(store.clone());
        let last = block_on(async {
            ledger.set("u1", start).await.expect("set");
            let mut last = start;
            for cost in &costs {
                last = ledger.deduct("u1", *cost).await.expect("deduct");
            }
            last
        });
        let expected = start - costs.iter().sum::<i64>();
        prop_assert_eq!(last, expected);
        prop_assert_eq!(block_on(store.balance("u1")).expect("balance"), Some(expected));
    }

    /// Dollar amounts convert to whole cents, never rounding up.
    #[test]
    fn prop_cents_never_exceed_dollars(amount in 0.0f64..1.0e9) {
        let cents = dollars_to_cents(amount).expect("convert");
        prop_assert!(cents >= 0);
        #[allow(clippy::cast_precision_loss)]
        let back = cents as f64;
        prop_assert!(back <= amount * 100.0);
    }
}

// ============================================================================
// Rate limiter
// ============================================================================

proptest! {
    /// The window never exceeds the budget, counts exactly the allowed
    /// requests, and a denial leaves it untouched.
    #[test]
    fn prop_window_counts_only_allowed_requests(
        requests in prop::collection::vec(0u64..120_000, 1..30),
    ) {
        let store = Arc::new(MemoryStore::new());
        let limiter = RateLimiter::new(store.clone(), 200_000, Duration::from_secs(3600));
        let mut allowed_total = 0u64;

        for tokens in requests {
            let before = store.window_tokens("u1");
            let check = block_on(limiter.check("u1", tokens)).expect("check");
            let after = store.window_tokens("u1");

            if check.allowed {
                allowed_total += tokens;
                prop_assert_eq!(after, before + tokens);
            } else {
                prop_assert_eq!(after, before);
                prop_assert!(before + tokens > 200_000);
            }
            prop_assert_eq!(check.current_tokens, after);
            prop_assert!(after <= 200_000);
        }
        prop_assert_eq!(store.window_tokens("u1"), allowed_total);
    }
}

// ============================================================================
// Resource naming
// ============================================================================

proptest! {
    /// Names depend only on the first eight characters of the id.
    #[test]
    fn prop_resource_names_are_stable(
        prefix in "[a-f0-9]{8}",
        tail_a in "[a-f0-9-]{0,28}",
        tail_b in "[a-f0-9-]{0,28}",
    ) {
        let a = resource_names(&format!("{prefix}{tail_a}"));
        let b = resource_names(&format!("{prefix}{tail_b}"));
        prop_assert_eq!(&a.container, &format!("agent_{prefix}"));
        prop_assert_eq!(&a.network, &format!("agent_net_{prefix}"));
        prop_assert_eq!(a.container, b.container);
        prop_assert_eq!(a.network, b.network);
    }
}
