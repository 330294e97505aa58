//! Typed request and response payloads for every orchestrator operation.
//!
//! Required identifiers deserialize with `#[serde(default)]` so that a missing
//! field reaches validation (and is reported as such) instead of failing in
//! the JSON extractor.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{AgentRecord, AgentStatus, RuntimeState};

/// Default estimated cost (USD) for a credit check.
pub const DEFAULT_ESTIMATED_COST: f64 = 0.01;

/// Default display name of a provisioned agent.
pub const DEFAULT_DISPLAY_NAME: &str = "My Agent";

/// Default smoke-test prompt.
pub const DEFAULT_SMOKE_TEST_MESSAGE: &str = "Hello! Please respond with a brief greeting.";

/// Default smoke-test model alias.
pub const DEFAULT_SMOKE_TEST_MODEL: &str = "agent-primary";

fn default_estimated_cost() -> f64 {
    DEFAULT_ESTIMATED_COST
}

// ===================================================================
// Agents
// ===================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvisionRequest {
    /// Owning user. Required.
    #[serde(default)]
    pub user_id: String,
    /// Generated (UUID v4) when omitted.
    #[serde(default)]
    pub agent_id: Option<String>,
    /// Behavior specification document, written verbatim. Defaults to empty.
    #[serde(default, alias = "soul_md")]
    pub behavior_spec: String,
    /// Scoped gateway credential. A fresh one is issued when omitted.
    #[serde(default, alias = "virtual_key")]
    pub gateway_key: Option<String>,
    /// Defaults to [`DEFAULT_DISPLAY_NAME`].
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionResponse {
    pub agent_id: String,
    pub container_id: String,
    pub container_name: String,
    pub network_id: String,
    pub network_name: String,
    pub status: AgentStatus,
}

impl From<&AgentRecord> for ProvisionResponse {
    fn from(record: &AgentRecord) -> Self {
        Self {
            agent_id: record.agent_id.clone(),
            container_id: record.container_id.clone(),
            container_name: record.container_name.clone(),
            network_id: record.network_id.clone(),
            network_name: record.network_name.clone(),
            status: record.status,
        }
    }
}

/// Result of deprovision, pause and resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleResponse {
    pub agent_id: String,
    pub status: AgentStatus,
}

/// Registry view and live runtime view of one agent. The two may disagree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatusReport {
    pub agent_id: String,
    pub runtime_status: RuntimeState,
    pub registry_status: AgentStatus,
    pub user_id: String,
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

// ===================================================================
// Gateway credentials and smoke test
// ===================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IssueKeyRequest {
    #[serde(default)]
    pub user_id: String,
    /// USD. Defaults to the configured key budget.
    #[serde(default)]
    pub max_budget: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueKeyResponse {
    pub virtual_key: String,
    pub user_id: String,
    pub max_budget: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmokeTestRequest {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmokeTestResponse {
    pub model: String,
    pub response: String,
    pub usage: serde_json::Value,
}

// ===================================================================
// Credits
// ===================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreditCheckRequest {
    #[serde(default)]
    pub user_id: String,
    /// USD. Defaults to [`DEFAULT_ESTIMATED_COST`].
    #[serde(default = "default_estimated_cost")]
    pub estimated_cost: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditCheckResponse {
    pub allowed: bool,
    /// `None` when no balance is cached for the user (unmetered).
    pub balance_cents: Option<i64>,
    pub estimated_cents: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeductRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub cost_cents: i64,
    /// Agent that incurred the cost; paused when the balance is exhausted.
    #[serde(default)]
    pub agent_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeductResponse {
    pub new_balance_cents: i64,
    pub deducted_cents: i64,
    pub agent_paused: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetBalanceRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub balance_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetBalanceResponse {
    pub user_id: String,
    pub balance_cents: i64,
}

// ===================================================================
// Rate limit
// ===================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateCheckRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub tokens: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateCheckResponse {
    pub allowed: bool,
    /// Window count after this check (unchanged when denied).
    pub current_tokens: u64,
    pub requested_tokens: u64,
    pub limit: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ===================================================================
// Messaging bridge
// ===================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeDeployResponse {
    pub container_id: String,
    pub container_name: String,
    pub port: u16,
    pub already_running: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeStatusResponse {
    pub running: bool,
    /// Runtime state name, or `"not_deployed"`.
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
}

// ===================================================================
// Health and errors
// ===================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `"healthy"` or `"degraded"`.
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Component name to `"connected"` / `"disconnected"`.
    pub services: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
