//! Port trait definitions for the application layer.
//!
//! Ports are the capabilities infrastructure must provide. Services hold them
//! as `Arc<dyn Port>` so one set of clients, opened at startup, is shared by
//! every in-flight request. This file imports only from `crate::domain` and
//! `fleet_common`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use fleet_common::api::SmokeTestResponse;
use fleet_common::contract::labels;
use fleet_common::{AgentRecord, AgentStatus, RuntimeState, WorkspaceConfig};

use crate::domain::{GatewayError, RuntimeError, StoreError, WorkspaceError};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Runtime-assigned identity of a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRef {
    pub id: String,
    pub name: String,
    /// Labels as reported by the runtime; empty when built from a record.
    pub labels: HashMap<String, String>,
}

impl NetworkRef {
    /// Identifier to address the network by: the id when known, else the name.
    #[must_use]
    pub fn target(&self) -> &str {
        if self.id.is_empty() { &self.name } else { &self.id }
    }

    /// Agent the network was created for.
    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.labels.get(labels::AGENT_ID).map(String::as_str)
    }
}

/// Runtime-assigned identity of a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerRef {
    pub id: String,
    pub name: String,
    pub labels: HashMap<String, String>,
}

impl ContainerRef {
    #[must_use]
    pub fn target(&self) -> &str {
        if self.id.is_empty() { &self.name } else { &self.id }
    }

    #[must_use]
    pub fn owner(&self) -> Option<&str> {
        self.labels.get(labels::AGENT_ID).map(String::as_str)
    }
}

/// Host directory mounted into a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindMount {
    pub host_path: PathBuf,
    pub container_path: String,
    pub read_only: bool,
}

/// Container port published on the same host port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishedPort {
    pub container_port: u16,
    pub host_port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    Never,
    /// Restart after crashes and host reboots until explicitly stopped.
    UnlessStopped,
}

/// Everything needed to launch one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    /// Deterministic name; creation under an existing name resolves to that
    /// container.
    pub name: String,
    pub image: String,
    /// Empty means the image's default command.
    pub command: Vec<String>,
    pub env: Vec<(String, String)>,
    pub binds: Vec<BindMount>,
    /// Network joined at creation time.
    pub network: Option<String>,
    pub ports: Vec<PublishedPort>,
    pub labels: HashMap<String, String>,
    pub restart: RestartPolicy,
}

/// Outcome of an atomic rate-window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowDecision {
    pub allowed: bool,
    /// Window count after the check (unchanged when denied).
    pub current_tokens: u64,
}

// ── Container Runtime ─────────────────────────────────────────────────────────

/// Capability interface over the host's container and network primitives.
///
/// Creation is idempotent: when the named resource already exists the
/// adapter resolves to it instead of failing. `status` reports
/// [`RuntimeState::NotFound`] for a missing container; every other operation
/// reports [`RuntimeError::NotFound`].
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn create_network(
        &self,
        name: &str,
        labels: &HashMap<String, String>,
    ) -> Result<NetworkRef, RuntimeError>;
    async fn get_network(&self, name: &str) -> Result<NetworkRef, RuntimeError>;
    async fn remove_network(&self, network: &NetworkRef) -> Result<(), RuntimeError>;

    /// Create (or resolve) the named container and make sure it is started.
    async fn run_container(&self, spec: &ContainerSpec) -> Result<ContainerRef, RuntimeError>;
    async fn get_container(&self, name: &str) -> Result<ContainerRef, RuntimeError>;
    /// Stop with a bounded grace period; stopping a stopped container succeeds.
    async fn stop(&self, container: &ContainerRef, grace: Duration) -> Result<(), RuntimeError>;
    async fn remove(&self, container: &ContainerRef) -> Result<(), RuntimeError>;
    async fn pause(&self, container: &ContainerRef) -> Result<(), RuntimeError>;
    async fn unpause(&self, container: &ContainerRef) -> Result<(), RuntimeError>;
    /// Attaching an already-attached container succeeds.
    async fn attach_network(
        &self,
        container: &ContainerRef,
        network: &NetworkRef,
    ) -> Result<(), RuntimeError>;
    async fn status(&self, container: &ContainerRef) -> Result<RuntimeState, RuntimeError>;
}

// ── Key-Value Stores ──────────────────────────────────────────────────────────

/// Durable record of each agent, one entry per `agent_id`.
#[async_trait]
pub trait AgentRegistry: Send + Sync {
    /// Write every field of the record.
    async fn put(&self, record: &AgentRecord) -> Result<(), StoreError>;
    async fn get(&self, agent_id: &str) -> Result<Option<AgentRecord>, StoreError>;
    /// Update only the status field. Returns `false` when no record exists.
    async fn set_status(&self, agent_id: &str, status: AgentStatus) -> Result<bool, StoreError>;
}

/// Per-user cached balance in cents.
#[async_trait]
pub trait CreditStore: Send + Sync {
    /// `None` when nothing is cached for the user.
    async fn balance(&self, user_id: &str) -> Result<Option<i64>, StoreError>;
    /// Atomic decrement; an absent balance starts from zero.
    async fn decrement(&self, user_id: &str, cents: i64) -> Result<i64, StoreError>;
    async fn set_balance(&self, user_id: &str, cents: i64) -> Result<(), StoreError>;
}

/// Per-user hourly token counter.
#[async_trait]
pub trait RateWindowStore: Send + Sync {
    /// Atomically: deny when `current + tokens > budget`, otherwise add
    /// `tokens` and reset the window expiry to `window` from now.
    async fn try_consume(
        &self,
        user_id: &str,
        tokens: u64,
        budget: u64,
        window: Duration,
    ) -> Result<WindowDecision, StoreError>;
}

// ── Workspaces ────────────────────────────────────────────────────────────────

#[async_trait]
pub trait WorkspaceStore: Send + Sync {
    /// Create the agent's directory and write the behavior specification and
    /// configuration snapshot. Returns the host path to bind-mount.
    async fn materialize(
        &self,
        agent_id: &str,
        behavior_spec: &str,
        config: &WorkspaceConfig,
    ) -> Result<PathBuf, WorkspaceError>;
}

// ── LLM Gateway ───────────────────────────────────────────────────────────────

#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Issue a scoped per-user credential with a spend budget (USD).
    async fn issue_key(&self, user_id: &str, max_budget: f64) -> Result<String, GatewayError>;
    async fn smoke_test(&self, message: &str, model: &str)
    -> Result<SmokeTestResponse, GatewayError>;
    /// Base URL agents use to reach the gateway.
    fn base_url(&self) -> &str;
}

// ── Health ────────────────────────────────────────────────────────────────────

/// Reachability check for one external dependency.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    fn component(&self) -> &'static str;
    async fn probe(&self) -> bool;
}
