//! Shared hand-written fakes for the orchestrator ports.
//!
//! `FakeRuntime` models just enough of a container daemon to check the
//! idempotency contracts: named resources, state transitions, and one-shot
//! failure injection per operation.

#![allow(clippy::expect_used, clippy::unwrap_used, dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fleet_common::api::SmokeTestResponse;
use fleet_common::{RuntimeState, WorkspaceConfig};
use fleet_orchestrator::app::{AppContext, AppSettings, Backends};
use fleet_orchestrator::application::ports::{
    ContainerRef, ContainerRuntime, ContainerSpec, HealthProbe, LlmGateway, NetworkRef,
    WorkspaceStore,
};
use fleet_orchestrator::application::services::bridge::BridgeSettings;
use fleet_orchestrator::application::services::provision::ProvisionSettings;
use fleet_orchestrator::domain::{GatewayError, RuntimeError, WorkspaceError};
use fleet_orchestrator::infra::memory::MemoryStore;

pub const BACKEND_NETWORK: &str = "fleet_backend";
pub const GATEWAY_URL: &str = "http://litellm:4000";

// ── Container runtime ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub name: String,
    pub state: RuntimeState,
    pub spec: ContainerSpec,
}

impl FakeContainer {
    fn to_ref(&self) -> ContainerRef {
        ContainerRef {
            id: self.id.clone(),
            name: self.name.clone(),
            labels: self.spec.labels.clone(),
        }
    }
}

#[derive(Debug, Default)]
struct RuntimeInner {
    networks: HashMap<String, NetworkRef>,
    containers: HashMap<String, FakeContainer>,
    attachments: HashSet<(String, String)>,
    next_id: u64,
    network_creates: usize,
    container_creates: usize,
    calls: Vec<&'static str>,
    failures: HashMap<&'static str, RuntimeError>,
    drop_before_run: bool,
}

impl RuntimeInner {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:012x}", self.next_id)
    }

    fn container_name(&self, container: &ContainerRef) -> Option<String> {
        self.containers
            .values()
            .find(|c| c.id == container.id || c.name == container.name)
            .map(|c| c.name.clone())
    }

    fn network_name(&self, network: &NetworkRef) -> Option<String> {
        self.networks
            .values()
            .find(|n| n.id == network.id || n.name == network.name)
            .map(|n| n.name.clone())
    }

    /// Record the call and fire an injected failure, if any.
    fn enter(&mut self, op: &'static str) -> Result<(), RuntimeError> {
        self.calls.push(op);
        match self.failures.remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct FakeRuntime {
    inner: Mutex<RuntimeInner>,
}

impl FakeRuntime {
    /// Runtime with the shared backend network already present.
    pub fn new() -> Self {
        let runtime = Self::default();
        runtime.add_network(BACKEND_NETWORK);
        runtime
    }

    pub fn add_network(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id("net");
        inner.networks.insert(
            name.to_string(),
            NetworkRef {
                id,
                name: name.to_string(),
                labels: HashMap::new(),
            },
        );
    }

    pub fn add_container(&self, name: &str, state: RuntimeState) -> ContainerRef {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id("ctr");
        let spec = ContainerSpec {
            name: name.to_string(),
            image: "preexisting".to_string(),
            command: Vec::new(),
            env: Vec::new(),
            binds: Vec::new(),
            network: None,
            ports: Vec::new(),
            labels: HashMap::new(),
            restart: fleet_orchestrator::application::ports::RestartPolicy::Never,
        };
        inner.containers.insert(
            name.to_string(),
            FakeContainer {
                id: id.clone(),
                name: name.to_string(),
                state,
                spec,
            },
        );
        ContainerRef {
            id,
            name: name.to_string(),
            labels: HashMap::new(),
        }
    }

    /// Make the next call to `op` fail with `err`.
    pub fn fail_once(&self, op: &'static str, err: RuntimeError) {
        self.inner.lock().unwrap().failures.insert(op, err);
    }

    /// Delete the named container right before the next `run_container`, as if
    /// it were removed between inspection and launch.
    pub fn drop_before_next_run(&self) {
        self.inner.lock().unwrap().drop_before_run = true;
    }

    /// Change a container's state behind the orchestrator's back.
    pub fn set_state(&self, name: &str, state: RuntimeState) {
        if let Some(c) = self.inner.lock().unwrap().containers.get_mut(name) {
            c.state = state;
        }
    }

    /// Delete a container behind the orchestrator's back.
    pub fn vanish_container(&self, name: &str) {
        self.inner.lock().unwrap().containers.remove(name);
    }

    pub fn vanish_network(&self, name: &str) {
        self.inner.lock().unwrap().networks.remove(name);
    }

    pub fn container(&self, name: &str) -> Option<FakeContainer> {
        self.inner.lock().unwrap().containers.get(name).cloned()
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.inner.lock().unwrap().networks.contains_key(name)
    }

    pub fn is_attached(&self, container: &str, network: &str) -> bool {
        self.inner
            .lock()
            .unwrap()
            .attachments
            .contains(&(container.to_string(), network.to_string()))
    }

    pub fn container_count(&self) -> usize {
        self.inner.lock().unwrap().containers.len()
    }

    pub fn network_count(&self) -> usize {
        self.inner.lock().unwrap().networks.len()
    }

    pub fn container_creates(&self) -> usize {
        self.inner.lock().unwrap().container_creates
    }

    pub fn network_creates(&self) -> usize {
        self.inner.lock().unwrap().network_creates
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.calls().iter().filter(|c| **c == op).count()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn create_network(
        &self,
        name: &str,
        labels: &HashMap<String, String>,
    ) -> Result<NetworkRef, RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("create_network")?;
        if let Some(existing) = inner.networks.get(name) {
            return Ok(existing.clone());
        }
        let network = NetworkRef {
            id: inner.next_id("net"),
            name: name.to_string(),
            labels: labels.clone(),
        };
        inner.network_creates += 1;
        inner.networks.insert(name.to_string(), network.clone());
        Ok(network)
    }

    async fn get_network(&self, name: &str) -> Result<NetworkRef, RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("get_network")?;
        inner
            .networks
            .get(name)
            .cloned()
            .ok_or_else(|| RuntimeError::NotFound(format!("network {name}")))
    }

    async fn remove_network(&self, network: &NetworkRef) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("remove_network")?;
        let name = inner
            .network_name(network)
            .ok_or_else(|| RuntimeError::NotFound(format!("network {}", network.name)))?;
        inner.networks.remove(&name);
        inner.attachments.retain(|(_, n)| *n != name);
        Ok(())
    }

    async fn run_container(&self, spec: &ContainerSpec) -> Result<ContainerRef, RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("run_container")?;
        if std::mem::take(&mut inner.drop_before_run) {
            inner.containers.remove(&spec.name);
        }
        if let Some(network) = &spec.network {
            if !inner.networks.contains_key(network) {
                return Err(RuntimeError::NotFound(format!("network {network}")));
            }
        }

        if let Some(existing) = inner.containers.get_mut(&spec.name) {
            if existing.state != RuntimeState::Paused {
                existing.state = RuntimeState::Running;
            }
            return Ok(existing.to_ref());
        }

        let id = inner.next_id("ctr");
        inner.container_creates += 1;
        inner.containers.insert(
            spec.name.clone(),
            FakeContainer {
                id: id.clone(),
                name: spec.name.clone(),
                state: RuntimeState::Running,
                spec: spec.clone(),
            },
        );
        if let Some(network) = &spec.network {
            inner
                .attachments
                .insert((spec.name.clone(), network.clone()));
        }
        Ok(ContainerRef {
            id,
            name: spec.name.clone(),
            labels: spec.labels.clone(),
        })
    }

    async fn get_container(&self, name: &str) -> Result<ContainerRef, RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("get_container")?;
        inner
            .containers
            .get(name)
            .map(FakeContainer::to_ref)
            .ok_or_else(|| RuntimeError::NotFound(format!("container {name}")))
    }

    async fn stop(&self, container: &ContainerRef, _grace: Duration) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("stop")?;
        let name = inner
            .container_name(container)
            .ok_or_else(|| RuntimeError::NotFound(format!("container {}", container.name)))?;
        if let Some(c) = inner.containers.get_mut(&name) {
            c.state = RuntimeState::Exited;
        }
        Ok(())
    }

    async fn remove(&self, container: &ContainerRef) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("remove")?;
        let name = inner
            .container_name(container)
            .ok_or_else(|| RuntimeError::NotFound(format!("container {}", container.name)))?;
        inner.containers.remove(&name);
        inner.attachments.retain(|(c, _)| *c != name);
        Ok(())
    }

    async fn pause(&self, container: &ContainerRef) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("pause")?;
        let name = inner
            .container_name(container)
            .ok_or_else(|| RuntimeError::NotFound(format!("container {}", container.name)))?;
        let c = inner.containers.get_mut(&name).unwrap();
        match c.state {
            RuntimeState::Running => {
                c.state = RuntimeState::Paused;
                Ok(())
            }
            RuntimeState::Paused => Err(RuntimeError::Conflict(format!(
                "Container {name} is already paused"
            ))),
            _ => Err(RuntimeError::Conflict(format!(
                "Container {name} is not running"
            ))),
        }
    }

    async fn unpause(&self, container: &ContainerRef) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("unpause")?;
        let name = inner
            .container_name(container)
            .ok_or_else(|| RuntimeError::NotFound(format!("container {}", container.name)))?;
        let c = inner.containers.get_mut(&name).unwrap();
        if c.state == RuntimeState::Paused {
            c.state = RuntimeState::Running;
            Ok(())
        } else {
            Err(RuntimeError::Conflict(format!(
                "Container {name} is not paused"
            )))
        }
    }

    async fn attach_network(
        &self,
        container: &ContainerRef,
        network: &NetworkRef,
    ) -> Result<(), RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("attach_network")?;
        let container_name = inner
            .container_name(container)
            .ok_or_else(|| RuntimeError::NotFound(format!("container {}", container.name)))?;
        let network_name = inner
            .network_name(network)
            .ok_or_else(|| RuntimeError::NotFound(format!("network {}", network.name)))?;
        inner.attachments.insert((container_name, network_name));
        Ok(())
    }

    async fn status(&self, container: &ContainerRef) -> Result<RuntimeState, RuntimeError> {
        let mut inner = self.inner.lock().unwrap();
        inner.enter("status")?;
        let state = inner
            .containers
            .values()
            .find(|c| c.id == container.id || c.name == container.name)
            .map_or(RuntimeState::NotFound, |c| c.state);
        Ok(state)
    }
}

#[async_trait]
impl HealthProbe for FakeRuntime {
    fn component(&self) -> &'static str {
        "container_runtime"
    }

    async fn probe(&self) -> bool {
        !self.inner.lock().unwrap().failures.contains_key("probe")
    }
}

// ── Workspaces ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Materialized {
    pub agent_id: String,
    pub behavior_spec: String,
    pub config: WorkspaceConfig,
}

#[derive(Debug, Default)]
pub struct FakeWorkspaces {
    written: Mutex<Vec<Materialized>>,
    fail_next: Mutex<Option<WorkspaceError>>,
}

impl FakeWorkspaces {
    pub fn path_for(agent_id: &str) -> PathBuf {
        PathBuf::from("/srv/fleet/agents").join(agent_id)
    }

    pub fn fail_once(&self, err: WorkspaceError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    pub fn written(&self) -> Vec<Materialized> {
        self.written.lock().unwrap().clone()
    }
}

#[async_trait]
impl WorkspaceStore for FakeWorkspaces {
    async fn materialize(
        &self,
        agent_id: &str,
        behavior_spec: &str,
        config: &WorkspaceConfig,
    ) -> Result<PathBuf, WorkspaceError> {
        if let Some(err) = self.fail_next.lock().unwrap().take() {
            return Err(err);
        }
        self.written.lock().unwrap().push(Materialized {
            agent_id: agent_id.to_string(),
            behavior_spec: behavior_spec.to_string(),
            config: config.clone(),
        });
        Ok(Self::path_for(agent_id))
    }
}

// ── Gateway ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct FakeGateway {
    issued: Mutex<Vec<(String, f64)>>,
    fail_next: Mutex<Option<GatewayError>>,
}

impl FakeGateway {
    pub fn fail_once(&self, err: GatewayError) {
        *self.fail_next.lock().unwrap() = Some(err);
    }

    pub fn issued(&self) -> Vec<(String, f64)> {
        self.issued.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmGateway for FakeGateway {
    async fn issue_key(&self, user_id: &str, max_budget: f64) -> Result<String, GatewayError> {
        if let Some(err) = self.fail_next.lock().unwrap().take() {
            return Err(err);
        }
        let mut issued = self.issued.lock().unwrap();
        issued.push((user_id.to_string(), max_budget));
        Ok(format!("sk-scoped-{user_id}-{}", issued.len()))
    }

    async fn smoke_test(
        &self,
        message: &str,
        model: &str,
    ) -> Result<SmokeTestResponse, GatewayError> {
        if let Some(err) = self.fail_next.lock().unwrap().take() {
            return Err(err);
        }
        Ok(SmokeTestResponse {
            model: model.to_string(),
            response: format!("echo: {message}"),
            usage: serde_json::json!({"total_tokens": 12}),
        })
    }

    fn base_url(&self) -> &str {
        GATEWAY_URL
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

pub fn settings() -> AppSettings {
    AppSettings {
        provision: ProvisionSettings {
            image: "python:3.12-slim".to_string(),
            command: vec!["sleep".to_string(), "infinity".to_string()],
            backend_network: BACKEND_NETWORK.to_string(),
            key_budget: 25.0,
        },
        bridge: BridgeSettings {
            image: "fleet/messaging-bridge:latest".to_string(),
            port: 3001,
            sessions_dir: PathBuf::from("/srv/fleet/bridge-sessions"),
            backend_network: BACKEND_NETWORK.to_string(),
        },
        stop_grace: Duration::from_secs(10),
        hourly_token_budget: 200_000,
        rate_window: Duration::from_secs(3600),
        default_key_budget: 25.0,
    }
}

/// Every fake plus the context wired over them.
pub struct Harness {
    pub runtime: Arc<FakeRuntime>,
    pub store: Arc<MemoryStore>,
    pub workspaces: Arc<FakeWorkspaces>,
    pub gateway: Arc<FakeGateway>,
    pub ctx: Arc<AppContext>,
}

impl Harness {
    pub fn new() -> Self {
        let runtime = Arc::new(FakeRuntime::new());
        let store = Arc::new(MemoryStore::new());
        let workspaces = Arc::new(FakeWorkspaces::default());
        let gateway = Arc::new(FakeGateway::default());

        let backends = Backends {
            runtime: runtime.clone(),
            registry: store.clone(),
            credits: store.clone(),
            rates: store.clone(),
            workspaces: workspaces.clone(),
            gateway: gateway.clone(),
            probes: vec![runtime.clone(), store.clone()],
        };
        let ctx = Arc::new(AppContext::new(backends, settings()));

        Self {
            runtime,
            store,
            workspaces,
            gateway,
            ctx,
        }
    }
}
