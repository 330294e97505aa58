//! Provisioning workflow: network, workspace, container, backend attachment,
//! registry commit.
//!
//! Every step is idempotent under a retry with the same `agent_id`. Nothing is
//! rolled back on failure; a retry reuses whatever the failed attempt left
//! behind through the runtime's idempotent-create contract, and only after the
//! resource's owner label confirms it belongs to this agent.

use std::sync::Arc;

use chrono::Utc;
use fleet_common::api::{ProvisionRequest, ProvisionResponse};
use fleet_common::contract::{AGENT_MOUNT, env};
use fleet_common::{AgentRecord, AgentStatus, WorkspaceConfig};

use crate::application::ports::{
    AgentRegistry, BindMount, ContainerRef, ContainerRuntime, ContainerSpec, LlmGateway,
    RestartPolicy, WorkspaceStore,
};
use crate::domain::agent::{
    ResourceNames, agent_labels, ensure_owned, resolve_agent_id, resolve_display_name,
    resource_names, validate_user_id,
};
use crate::domain::{OrchestratorError, RuntimeError};

/// Static inputs of every agent launch.
#[derive(Debug, Clone)]
pub struct ProvisionSettings {
    pub image: String,
    pub command: Vec<String>,
    /// Shared network through which agents reach the gateway.
    pub backend_network: String,
    /// Budget (USD) of credentials issued on the agent's behalf.
    pub key_budget: f64,
}

pub struct Provisioner {
    runtime: Arc<dyn ContainerRuntime>,
    registry: Arc<dyn AgentRegistry>,
    workspaces: Arc<dyn WorkspaceStore>,
    gateway: Arc<dyn LlmGateway>,
    settings: ProvisionSettings,
}

impl Provisioner {
    #[must_use]
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        registry: Arc<dyn AgentRegistry>,
        workspaces: Arc<dyn WorkspaceStore>,
        gateway: Arc<dyn LlmGateway>,
        settings: ProvisionSettings,
    ) -> Self {
        Self {
            runtime,
            registry,
            workspaces,
            gateway,
            settings,
        }
    }

    /// Provision an agent end to end.
    ///
    /// An id whose record is already `running` or `paused` returns that
    /// record untouched; a `stopped` id is never reused.
    ///
    /// # Errors
    ///
    /// `Validation` before any side effect; otherwise the failure of the first
    /// step that failed.
    pub async fn provision(
        &self,
        request: ProvisionRequest,
    ) -> Result<ProvisionResponse, OrchestratorError> {
        let user_id = request.user_id.trim().to_string();
        validate_user_id(&user_id)?;
        let agent_id = resolve_agent_id(request.agent_id.as_deref())?;

        if let Some(existing) = self.registry.get(&agent_id).await? {
            return Self::reuse(existing, &user_id);
        }

        let names = resource_names(&agent_id);
        let leftover = self.leftover_container(&names, &agent_id).await?;
        let display_name = resolve_display_name(request.display_name);
        let labels = agent_labels(&agent_id, &user_id);

        // The master key never reaches an agent: without a caller-supplied
        // credential, a scoped one is issued first. A container left by an
        // earlier attempt already holds its credential, so nothing is issued.
        let supplied = request.gateway_key.filter(|key| !key.trim().is_empty());
        let gateway_key = match (supplied, &leftover) {
            (Some(key), _) => Some(key),
            (None, Some(_)) => None,
            (None, None) => Some(
                self.gateway
                    .issue_key(&user_id, self.settings.key_budget)
                    .await?,
            ),
        };

        let network = self.runtime.create_network(&names.network, &labels).await?;
        ensure_owned(
            &format!("network {}", network.name),
            network.owner(),
            &agent_id,
        )?;
        tracing::info!(%agent_id, network = %network.name, "agent network ready");

        let created_at = Utc::now();
        let snapshot = WorkspaceConfig {
            agent_id: agent_id.clone(),
            user_id: user_id.clone(),
            display_name: display_name.clone(),
            gateway_base_url: self.gateway.base_url().to_string(),
            created_at,
        };
        let workspace = self
            .workspaces
            .materialize(&agent_id, &request.behavior_spec, &snapshot)
            .await?;

        let mut container_env = vec![
            (env::AGENT_ID.to_string(), agent_id.clone()),
            (env::USER_ID.to_string(), user_id.clone()),
            (
                env::GATEWAY_BASE_URL.to_string(),
                self.gateway.base_url().to_string(),
            ),
        ];
        if let Some(key) = &gateway_key {
            container_env.push((env::GATEWAY_API_KEY.to_string(), key.clone()));
            container_env.push((env::ASSISTANT_API_KEY.to_string(), key.clone()));
        }
        let spec = ContainerSpec {
            name: names.container.clone(),
            image: self.settings.image.clone(),
            command: self.settings.command.clone(),
            env: container_env,
            binds: vec![BindMount {
                host_path: workspace,
                container_path: AGENT_MOUNT.to_string(),
                read_only: false,
            }],
            network: Some(network.name.clone()),
            ports: Vec::new(),
            labels,
            restart: RestartPolicy::UnlessStopped,
        };
        let container = self.runtime.run_container(&spec).await?;
        ensure_owned(
            &format!("container {}", container.name),
            container.owner(),
            &agent_id,
        )?;
        if let Some(previous) =
            leftover.filter(|prev| gateway_key.is_none() && prev.id != container.id)
        {
            return self.discard_replacement(&container, &previous).await;
        }
        tracing::info!(%agent_id, container = %container.name, "agent container running");

        let backend_name = &self.settings.backend_network;
        let backend = self
            .runtime
            .get_network(backend_name)
            .await
            .map_err(|err| match err {
                RuntimeError::NotFound(_) => OrchestratorError::Runtime(format!(
                    "backend network '{backend_name}' does not exist"
                )),
                other => other.into(),
            })?;
        self.runtime.attach_network(&container, &backend).await?;

        let record = AgentRecord {
            agent_id: agent_id.clone(),
            user_id,
            display_name,
            container_id: container.id,
            container_name: container.name,
            network_id: network.id,
            network_name: network.name,
            status: AgentStatus::Running,
            created_at,
        };
        self.registry.put(&record).await?;

        tracing::info!(%agent_id, user_id = %record.user_id, "agent provisioned");
        Ok(ProvisionResponse::from(&record))
    }

    /// Container an earlier failed attempt for this agent left behind.
    async fn leftover_container(
        &self,
        names: &ResourceNames,
        agent_id: &str,
    ) -> Result<Option<ContainerRef>, OrchestratorError> {
        match self.runtime.get_network(&names.network).await {
            Ok(network) => ensure_owned(
                &format!("network {}", network.name),
                network.owner(),
                agent_id,
            )?,
            Err(RuntimeError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }
        match self.runtime.get_container(&names.container).await {
            Ok(container) => {
                ensure_owned(
                    &format!("container {}", container.name),
                    container.owner(),
                    agent_id,
                )?;
                tracing::info!(
                    %agent_id,
                    container = %container.name,
                    "resuming partial provisioning"
                );
                Ok(Some(container))
            }
            Err(RuntimeError::NotFound(_)) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// The leftover container vanished between inspection and launch, so the
    /// new one was created without a credential. Remove it; the next attempt
    /// finds no container and issues a key.
    async fn discard_replacement(
        &self,
        container: &ContainerRef,
        previous: &ContainerRef,
    ) -> Result<ProvisionResponse, OrchestratorError> {
        tracing::warn!(
            container = %container.name,
            previous = %previous.id,
            "container replaced during provisioning"
        );
        if let Err(err) = self.runtime.remove(container).await {
            tracing::warn!(
                container = %container.name,
                error = %err,
                "failed to remove replacement"
            );
        }
        Err(OrchestratorError::Runtime(format!(
            "container {} was replaced during provisioning; retry",
            container.name
        )))
    }

    fn reuse(existing: AgentRecord, user_id: &str) -> Result<ProvisionResponse, OrchestratorError> {
        if existing.user_id != user_id {
            return Err(OrchestratorError::Validation(format!(
                "agent_id '{}' is already assigned to another user",
                existing.agent_id
            )));
        }
        if existing.status.is_terminal() {
            return Err(OrchestratorError::Validation(format!(
                "agent_id '{}' was deprovisioned and cannot be reused",
                existing.agent_id
            )));
        }
        tracing::info!(
            agent_id = %existing.agent_id,
            status = %existing.status,
            "agent already provisioned"
        );
        Ok(ProvisionResponse::from(&existing))
    }
}
