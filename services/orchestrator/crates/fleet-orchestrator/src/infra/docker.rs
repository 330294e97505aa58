//! Container runtime adapter backed by the local Docker daemon (bollard).

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bollard::Docker;
use bollard::container::{
    Config, CreateContainerOptions, InspectContainerOptions, RemoveContainerOptions,
    StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::models::{
    ContainerStateStatusEnum, EndpointSettings, HostConfig, PortBinding,
    RestartPolicy as DockerRestartPolicy, RestartPolicyNameEnum,
};
use bollard::network::{ConnectNetworkOptions, CreateNetworkOptions, InspectNetworkOptions};
use fleet_common::RuntimeState;

use crate::application::ports::{
    ContainerRef, ContainerRuntime, ContainerSpec, HealthProbe, NetworkRef, RestartPolicy,
};
use crate::domain::RuntimeError;

#[derive(Clone)]
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    /// Connect using `DOCKER_HOST` or the platform default socket and verify
    /// the daemon answers.
    pub async fn connect() -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().context("failed to connect to Docker daemon")?;
        docker.ping().await.context("Docker startup ping failed")?;
        tracing::info!("Docker connection ready");
        Ok(Self { docker })
    }

    async fn inspect_state(&self, target: &str) -> Result<RuntimeState, RuntimeError> {
        let info = self
            .docker
            .inspect_container(target, None::<InspectContainerOptions>)
            .await
            .map_err(|err| classify(err, &format!("container {target}")))?;
        Ok(info
            .state
            .and_then(|state| state.status)
            .map_or(RuntimeState::Unknown, map_state))
    }
}

/// Map a daemon error onto the adapter taxonomy.
fn classify(err: BollardError, what: &str) -> RuntimeError {
    match err {
        BollardError::DockerResponseServerError {
            status_code: 404, ..
        } => RuntimeError::NotFound(what.to_string()),
        BollardError::DockerResponseServerError {
            status_code,
            message,
        } if status_code == 409 || message.contains("already exists") => {
            RuntimeError::Conflict(message)
        }
        other => RuntimeError::Transport(other.to_string()),
    }
}

/// 304: the container is already in the requested state.
fn is_not_modified(err: &BollardError) -> bool {
    matches!(
        err,
        BollardError::DockerResponseServerError {
            status_code: 304,
            ..
        }
    )
}

fn map_state(status: ContainerStateStatusEnum) -> RuntimeState {
    match status {
        ContainerStateStatusEnum::CREATED => RuntimeState::Created,
        ContainerStateStatusEnum::RUNNING => RuntimeState::Running,
        ContainerStateStatusEnum::PAUSED => RuntimeState::Paused,
        ContainerStateStatusEnum::RESTARTING => RuntimeState::Restarting,
        ContainerStateStatusEnum::REMOVING => RuntimeState::Removing,
        ContainerStateStatusEnum::EXITED => RuntimeState::Exited,
        ContainerStateStatusEnum::DEAD => RuntimeState::Dead,
        ContainerStateStatusEnum::EMPTY => RuntimeState::Unknown,
    }
}

fn container_config(spec: &ContainerSpec) -> Config<String> {
    let binds: Vec<String> = spec
        .binds
        .iter()
        .map(|bind| {
            let mode = if bind.read_only { "ro" } else { "rw" };
            format!(
                "{}:{}:{mode}",
                bind.host_path.display(),
                bind.container_path
            )
        })
        .collect();

    let exposed_ports: HashMap<String, HashMap<(), ()>> = spec
        .ports
        .iter()
        .map(|port| (format!("{}/tcp", port.container_port), HashMap::new()))
        .collect();
    let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = spec
        .ports
        .iter()
        .map(|port| {
            (
                format!("{}/tcp", port.container_port),
                Some(vec![PortBinding {
                    host_ip: None,
                    host_port: Some(port.host_port.to_string()),
                }]),
            )
        })
        .collect();

    let restart_policy = match spec.restart {
        RestartPolicy::Never => RestartPolicyNameEnum::NO,
        RestartPolicy::UnlessStopped => RestartPolicyNameEnum::UNLESS_STOPPED,
    };

    let host_config = HostConfig {
        binds: (!binds.is_empty()).then_some(binds),
        network_mode: spec.network.clone(),
        port_bindings: (!port_bindings.is_empty()).then_some(port_bindings),
        restart_policy: Some(DockerRestartPolicy {
            name: Some(restart_policy),
            maximum_retry_count: None,
        }),
        ..Default::default()
    };

    Config {
        image: Some(spec.image.clone()),
        cmd: (!spec.command.is_empty()).then(|| spec.command.clone()),
        env: Some(
            spec.env
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect(),
        ),
        labels: Some(spec.labels.clone()),
        exposed_ports: (!exposed_ports.is_empty()).then_some(exposed_ports),
        host_config: Some(host_config),
        ..Default::default()
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn create_network(
        &self,
        name: &str,
        labels: &HashMap<String, String>,
    ) -> Result<NetworkRef, RuntimeError> {
        let options = CreateNetworkOptions {
            name: name.to_string(),
            check_duplicate: true,
            driver: "bridge".to_string(),
            labels: labels.clone(),
            ..Default::default()
        };
        match self.docker.create_network(options).await {
            Ok(_) => tracing::debug!(network = %name, "network created"),
            Err(err) => match classify(err, &format!("network {name}")) {
                RuntimeError::Conflict(_) => {
                    tracing::info!(network = %name, "network exists, reusing");
                }
                other => return Err(other),
            },
        }
        self.get_network(name).await
    }

    async fn get_network(&self, name: &str) -> Result<NetworkRef, RuntimeError> {
        let network = self
            .docker
            .inspect_network(name, None::<InspectNetworkOptions<String>>)
            .await
            .map_err(|err| classify(err, &format!("network {name}")))?;
        Ok(NetworkRef {
            id: network.id.unwrap_or_default(),
            name: network.name.unwrap_or_else(|| name.to_string()),
            labels: network.labels.unwrap_or_default(),
        })
    }

    async fn remove_network(&self, network: &NetworkRef) -> Result<(), RuntimeError> {
        self.docker
            .remove_network(network.target())
            .await
            .map_err(|err| classify(err, &format!("network {}", network.name)))
    }

    async fn run_container(&self, spec: &ContainerSpec) -> Result<ContainerRef, RuntimeError> {
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };
        let container = match self
            .docker
            .create_container(Some(options), container_config(spec))
            .await
        {
            Ok(response) => ContainerRef {
                id: response.id,
                name: spec.name.clone(),
                labels: spec.labels.clone(),
            },
            Err(err) => match classify(err, &format!("container {}", spec.name)) {
                RuntimeError::Conflict(_) => {
                    tracing::info!(container = %spec.name, "container exists, reusing");
                    self.get_container(&spec.name).await?
                }
                other => return Err(other),
            },
        };

        match self
            .docker
            .start_container::<String>(&container.id, None)
            .await
        {
            Ok(()) => Ok(container),
            Err(err) if is_not_modified(&err) => Ok(container),
            Err(err) => Err(classify(err, &format!("container {}", spec.name))),
        }
    }

    async fn get_container(&self, name: &str) -> Result<ContainerRef, RuntimeError> {
        let info = self
            .docker
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
            .map_err(|err| classify(err, &format!("container {name}")))?;
        Ok(ContainerRef {
            id: info.id.unwrap_or_default(),
            name: info
                .name
                .map_or_else(|| name.to_string(), |n| n.trim_start_matches('/').to_string()),
            labels: info
                .config
                .and_then(|config| config.labels)
                .unwrap_or_default(),
        })
    }

    async fn stop(&self, container: &ContainerRef, grace: Duration) -> Result<(), RuntimeError> {
        let t = i64::try_from(grace.as_secs()).unwrap_or(i64::MAX);
        match self
            .docker
            .stop_container(container.target(), Some(StopContainerOptions { t }))
            .await
        {
            Ok(()) => Ok(()),
            Err(err) if is_not_modified(&err) => Ok(()),
            Err(err) => Err(classify(err, &format!("container {}", container.name))),
        }
    }

    async fn remove(&self, container: &ContainerRef) -> Result<(), RuntimeError> {
        self.docker
            .remove_container(
                container.target(),
                Some(RemoveContainerOptions {
                    force: true,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|err| classify(err, &format!("container {}", container.name)))
    }

    async fn pause(&self, container: &ContainerRef) -> Result<(), RuntimeError> {
        self.docker
            .pause_container(container.target())
            .await
            .map_err(|err| classify(err, &format!("container {}", container.name)))
    }

    async fn unpause(&self, container: &ContainerRef) -> Result<(), RuntimeError> {
        self.docker
            .unpause_container(container.target())
            .await
            .map_err(|err| classify(err, &format!("container {}", container.name)))
    }

    async fn attach_network(
        &self,
        container: &ContainerRef,
        network: &NetworkRef,
    ) -> Result<(), RuntimeError> {
        let options = ConnectNetworkOptions {
            container: container.target().to_string(),
            endpoint_config: EndpointSettings::default(),
        };
        match self.docker.connect_network(network.target(), options).await {
            Ok(()) => Ok(()),
            // Older daemons answer 403 instead of 409 for an existing endpoint.
            Err(BollardError::DockerResponseServerError { message, .. })
                if message.contains("already exists") =>
            {
                tracing::debug!(
                    container = %container.name,
                    network = %network.name,
                    "already attached"
                );
                Ok(())
            }
            Err(err) => match classify(err, &format!("network {}", network.name)) {
                RuntimeError::Conflict(_) => Ok(()),
                other => Err(other),
            },
        }
    }

    async fn status(&self, container: &ContainerRef) -> Result<RuntimeState, RuntimeError> {
        match self.inspect_state(container.target()).await {
            Err(RuntimeError::NotFound(_)) => Ok(RuntimeState::NotFound),
            other => other,
        }
    }
}

#[async_trait]
impl HealthProbe for DockerRuntime {
    fn component(&self) -> &'static str {
        "container_runtime"
    }

    async fn probe(&self) -> bool {
        self.docker.ping().await.is_ok()
    }
}
