//! In-process implementation of every store port.
//!
//! Selected with `FLEET_STORE_BACKEND=memory` for single-node development;
//! state is lost on restart. One mutex guards all maps, which gives each
//! read-modify-write the same atomicity the Valkey scripts provide.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use fleet_common::{AgentRecord, AgentStatus};
use tokio::time::Instant;

use crate::application::ports::{
    AgentRegistry, CreditStore, HealthProbe, RateWindowStore, WindowDecision,
};
use crate::domain::StoreError;
use crate::domain::quota::exceeds_budget;

#[derive(Debug, Clone, Copy)]
struct Window {
    tokens: u64,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct State {
    agents: HashMap<String, AgentRecord>,
    credits: HashMap<String, i64>,
    windows: HashMap<String, Window>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // Every critical section is a plain map update, so a poisoned guard
        // still holds consistent data.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live token count for a user's window (0 when absent or expired).
    #[must_use]
    pub fn window_tokens(&self, user_id: &str) -> u64 {
        let now = Instant::now();
        self.lock()
            .windows
            .get(user_id)
            .filter(|w| w.expires_at > now)
            .map_or(0, |w| w.tokens)
    }
}

#[async_trait]
impl AgentRegistry for MemoryStore {
    async fn put(&self, record: &AgentRecord) -> Result<(), StoreError> {
        self.lock()
            .agents
            .insert(record.agent_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, agent_id: &str) -> Result<Option<AgentRecord>, StoreError> {
        Ok(self.lock().agents.get(agent_id).cloned())
    }

    async fn set_status(&self, agent_id: &str, status: AgentStatus) -> Result<bool, StoreError> {
        let mut state = self.lock();
        let Some(record) = state.agents.get_mut(agent_id) else {
            return Ok(false);
        };
        record.status = status;
        Ok(true)
    }
}

#[async_trait]
impl CreditStore for MemoryStore {
    async fn balance(&self, user_id: &str) -> Result<Option<i64>, StoreError> {
        Ok(self.lock().credits.get(user_id).copied())
    }

    async fn decrement(&self, user_id: &str, cents: i64) -> Result<i64, StoreError> {
        let mut state = self.lock();
        let balance = state.credits.entry(user_id.to_string()).or_insert(0);
        *balance = balance.checked_sub(cents).ok_or_else(|| StoreError::Corrupt {
            key: user_id.to_string(),
            reason: "balance out of range".to_string(),
        })?;
        Ok(*balance)
    }

    async fn set_balance(&self, user_id: &str, cents: i64) -> Result<(), StoreError> {
        self.lock().credits.insert(user_id.to_string(), cents);
        Ok(())
    }
}

#[async_trait]
impl RateWindowStore for MemoryStore {
    async fn try_consume(
        &self,
        user_id: &str,
        tokens: u64,
        budget: u64,
        window: Duration,
    ) -> Result<WindowDecision, StoreError> {
        let now = Instant::now();
        let mut state = self.lock();
        // Expired windows go the way Valkey's TTL removes them.
        state.windows.retain(|_, w| w.expires_at > now);
        let current = state
            .windows
            .get(user_id)
            .filter(|w| w.expires_at > now)
            .map_or(0, |w| w.tokens);

        if exceeds_budget(current, tokens, budget) {
            return Ok(WindowDecision {
                allowed: false,
                current_tokens: current,
            });
        }

        let updated = current + tokens;
        state.windows.insert(
            user_id.to_string(),
            Window {
                tokens: updated,
                expires_at: now + window,
            },
        );
        Ok(WindowDecision {
            allowed: true,
            current_tokens: updated,
        })
    }
}

#[async_trait]
impl HealthProbe for MemoryStore {
    fn component(&self) -> &'static str {
        "store"
    }

    async fn probe(&self) -> bool {
        true
    }
}
