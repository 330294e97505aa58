//! Messaging-bridge deployment.
//!
//! The bridge shares the container runtime with agents but has no registry
//! entry and no quota coupling.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use fleet_common::RuntimeState;
use fleet_common::api::{BridgeDeployResponse, BridgeStatusResponse};
use fleet_common::contract::{bridge, labels};

use crate::application::ports::{
    BindMount, ContainerRuntime, ContainerSpec, PublishedPort, RestartPolicy,
};
use crate::domain::{OrchestratorError, RuntimeError};

#[derive(Debug, Clone)]
pub struct BridgeSettings {
    pub image: String,
    pub port: u16,
    pub sessions_dir: PathBuf,
    pub backend_network: String,
}

pub struct BridgeDeployer {
    runtime: Arc<dyn ContainerRuntime>,
    settings: BridgeSettings,
}

impl BridgeDeployer {
    #[must_use]
    pub fn new(runtime: Arc<dyn ContainerRuntime>, settings: BridgeSettings) -> Self {
        Self { runtime, settings }
    }

    /// Reuse a running bridge, otherwise replace whatever is left of it.
    pub async fn deploy(&self) -> Result<BridgeDeployResponse, OrchestratorError> {
        match self.runtime.get_container(bridge::CONTAINER_NAME).await {
            Ok(existing) => match self.runtime.status(&existing).await? {
                RuntimeState::Running => {
                    return Ok(BridgeDeployResponse {
                        container_id: existing.id,
                        container_name: existing.name,
                        port: self.settings.port,
                        already_running: true,
                    });
                }
                RuntimeState::NotFound => {}
                state => {
                    tracing::info!(%state, "replacing stale messaging bridge");
                    match self.runtime.remove(&existing).await {
                        Ok(()) | Err(RuntimeError::NotFound(_)) => {}
                        Err(err) => return Err(err.into()),
                    }
                }
            },
            Err(RuntimeError::NotFound(_)) => {}
            Err(err) => return Err(err.into()),
        }

        let port = self.settings.port;
        let spec = ContainerSpec {
            name: bridge::CONTAINER_NAME.to_string(),
            image: self.settings.image.clone(),
            command: Vec::new(),
            env: vec![(bridge::PORT_ENV.to_string(), port.to_string())],
            binds: vec![BindMount {
                host_path: self.settings.sessions_dir.clone(),
                container_path: bridge::SESSIONS_MOUNT.to_string(),
                read_only: false,
            }],
            network: None,
            ports: vec![PublishedPort {
                container_port: port,
                host_port: port,
            }],
            labels: HashMap::from([(labels::ROLE.to_string(), "messaging-bridge".to_string())]),
            restart: RestartPolicy::UnlessStopped,
        };
        let container = self.runtime.run_container(&spec).await?;

        // The bridge still serves on its published port without the backend.
        let backend = &self.settings.backend_network;
        match self.runtime.get_network(backend).await {
            Ok(network) => {
                if let Err(err) = self.runtime.attach_network(&container, &network).await {
                    tracing::warn!(error = %err, %backend, "bridge not attached to backend");
                }
            }
            Err(err) => tracing::warn!(error = %err, %backend, "backend network unavailable"),
        }

        tracing::info!(container = %container.name, port, "messaging bridge deployed");
        Ok(BridgeDeployResponse {
            container_id: container.id,
            container_name: container.name,
            port,
            already_running: false,
        })
    }

    pub async fn status(&self) -> Result<BridgeStatusResponse, OrchestratorError> {
        let container = match self.runtime.get_container(bridge::CONTAINER_NAME).await {
            Ok(container) => container,
            Err(RuntimeError::NotFound(_)) => return Ok(not_deployed()),
            Err(err) => return Err(err.into()),
        };
        let state = self.runtime.status(&container).await?;
        if state == RuntimeState::NotFound {
            return Ok(not_deployed());
        }
        Ok(BridgeStatusResponse {
            running: state == RuntimeState::Running,
            status: state.as_str().to_string(),
            container_id: Some(container.id),
        })
    }
}

fn not_deployed() -> BridgeStatusResponse {
    BridgeStatusResponse {
        running: false,
        status: "not_deployed".to_string(),
        container_id: None,
    }
}
