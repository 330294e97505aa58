//! Lifecycle reconciler: deprovision, pause, resume, status.
//!
//! Each operation reads the registry record first, acts on the runtime, and
//! only then records the new status. Absent sub-resources during teardown and
//! containers already in the target state are treated as success, so
//! duplicate or overlapping calls converge.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use fleet_common::api::{AgentStatusReport, LifecycleResponse};
use fleet_common::{AgentRecord, AgentStatus, RuntimeState};

use crate::application::ports::{AgentRegistry, ContainerRef, ContainerRuntime, NetworkRef};
use crate::domain::agent::validate_agent_id;
use crate::domain::{OrchestratorError, RuntimeError};

pub struct Reconciler {
    runtime: Arc<dyn ContainerRuntime>,
    registry: Arc<dyn AgentRegistry>,
    stop_grace: Duration,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        registry: Arc<dyn AgentRegistry>,
        stop_grace: Duration,
    ) -> Self {
        Self {
            runtime,
            registry,
            stop_grace,
        }
    }

    /// Registry record of an agent.
    ///
    /// # Errors
    ///
    /// `Validation` for a malformed id, `AgentNotFound` when unregistered.
    pub async fn record(&self, agent_id: &str) -> Result<AgentRecord, OrchestratorError> {
        validate_agent_id(agent_id)?;
        self.registry
            .get(agent_id)
            .await?
            .ok_or_else(|| OrchestratorError::AgentNotFound(agent_id.to_string()))
    }

    /// Stop and remove the container, remove the agent network, mark the
    /// record `stopped`. The record itself is kept.
    pub async fn deprovision(&self, agent_id: &str) -> Result<LifecycleResponse, OrchestratorError> {
        let record = self.record(agent_id).await?;
        let container = container_of(&record);

        absorb_missing(
            self.runtime.stop(&container, self.stop_grace).await,
            agent_id,
            "stop container",
        )?;
        absorb_missing(self.runtime.remove(&container).await, agent_id, "remove container")?;
        absorb_missing(
            self.runtime.remove_network(&network_of(&record)).await,
            agent_id,
            "remove network",
        )?;

        self.commit(agent_id, AgentStatus::Stopped).await?;
        tracing::info!(%agent_id, "agent deprovisioned");
        Ok(LifecycleResponse {
            agent_id: agent_id.to_string(),
            status: AgentStatus::Stopped,
        })
    }

    /// Suspend the agent's process without removing anything.
    pub async fn pause(&self, agent_id: &str) -> Result<LifecycleResponse, OrchestratorError> {
        let record = self.live_record(agent_id).await?;
        let container = container_of(&record);

        match self.runtime.status(&container).await? {
            RuntimeState::Paused => {
                tracing::info!(%agent_id, "container already paused");
            }
            RuntimeState::NotFound => return Err(missing_container(&record)),
            _ => self.runtime.pause(&container).await?,
        }

        self.commit(agent_id, AgentStatus::Paused).await?;
        tracing::info!(%agent_id, "agent paused");
        Ok(LifecycleResponse {
            agent_id: agent_id.to_string(),
            status: AgentStatus::Paused,
        })
    }

    pub async fn resume(&self, agent_id: &str) -> Result<LifecycleResponse, OrchestratorError> {
        let record = self.live_record(agent_id).await?;
        let container = container_of(&record);

        match self.runtime.status(&container).await? {
            RuntimeState::Running => {
                tracing::info!(%agent_id, "container already running");
            }
            RuntimeState::NotFound => return Err(missing_container(&record)),
            _ => self.runtime.unpause(&container).await?,
        }

        self.commit(agent_id, AgentStatus::Running).await?;
        tracing::info!(%agent_id, "agent resumed");
        Ok(LifecycleResponse {
            agent_id: agent_id.to_string(),
            status: AgentStatus::Running,
        })
    }

    /// Live runtime state next to the recorded status. Drift between the two
    /// is reported, not repaired.
    pub async fn status(&self, agent_id: &str) -> Result<AgentStatusReport, OrchestratorError> {
        let record = self.record(agent_id).await?;
        let runtime_status = self.runtime.status(&container_of(&record)).await?;
        if runtime_status == RuntimeState::NotFound && !record.status.is_terminal() {
            tracing::warn!(
                %agent_id,
                registry_status = %record.status,
                "container missing for live agent"
            );
        }
        Ok(AgentStatusReport {
            agent_id: record.agent_id,
            runtime_status,
            registry_status: record.status,
            user_id: record.user_id,
            display_name: record.display_name,
            created_at: record.created_at,
        })
    }

    async fn live_record(&self, agent_id: &str) -> Result<AgentRecord, OrchestratorError> {
        let record = self.record(agent_id).await?;
        if record.status.is_terminal() {
            return Err(OrchestratorError::InvalidState(format!(
                "agent {agent_id} is stopped"
            )));
        }
        Ok(record)
    }

    async fn commit(&self, agent_id: &str, status: AgentStatus) -> Result<(), OrchestratorError> {
        if self.registry.set_status(agent_id, status).await? {
            Ok(())
        } else {
            Err(OrchestratorError::AgentNotFound(agent_id.to_string()))
        }
    }
}

fn container_of(record: &AgentRecord) -> ContainerRef {
    ContainerRef {
        id: record.container_id.clone(),
        name: record.container_name.clone(),
        labels: HashMap::new(),
    }
}

fn network_of(record: &AgentRecord) -> NetworkRef {
    NetworkRef {
        id: record.network_id.clone(),
        name: record.network_name.clone(),
        labels: HashMap::new(),
    }
}

fn missing_container(record: &AgentRecord) -> OrchestratorError {
    OrchestratorError::NotFound(format!("container {}", record.container_name))
}

/// Teardown step whose target may already be gone.
fn absorb_missing(
    result: Result<(), RuntimeError>,
    agent_id: &str,
    step: &str,
) -> Result<(), OrchestratorError> {
    match result {
        Err(RuntimeError::NotFound(what)) => {
            tracing::warn!(%agent_id, %what, "{step}: already absent");
            Ok(())
        }
        other => other.map_err(Into::into),
    }
}
