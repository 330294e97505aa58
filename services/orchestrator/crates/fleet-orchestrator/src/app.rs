//! Composition root: shared clients in, wired services out.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::application::ports::{
    AgentRegistry, ContainerRuntime, CreditStore, HealthProbe, LlmGateway, RateWindowStore,
    WorkspaceStore,
};
use crate::application::services::bridge::{BridgeDeployer, BridgeSettings};
use crate::application::services::credits::CreditLedger;
use crate::application::services::gateway::GatewayService;
use crate::application::services::health::HealthService;
use crate::application::services::lifecycle::Reconciler;
use crate::application::services::provision::{ProvisionSettings, Provisioner};
use crate::application::services::rate_limit::RateLimiter;
use crate::application::services::usage::UsageSettlement;
use crate::config::{OrchestratorConfig, StoreBackend};
use crate::infra::docker::DockerRuntime;
use crate::infra::gateway::HttpGateway;
use crate::infra::memory::MemoryStore;
use crate::infra::valkey::ValkeyStore;
use crate::infra::workspace_fs::FsWorkspaces;

/// Handles to every external dependency, opened once per process.
#[derive(Clone)]
pub struct Backends {
    pub runtime: Arc<dyn ContainerRuntime>,
    pub registry: Arc<dyn AgentRegistry>,
    pub credits: Arc<dyn CreditStore>,
    pub rates: Arc<dyn RateWindowStore>,
    pub workspaces: Arc<dyn WorkspaceStore>,
    pub gateway: Arc<dyn LlmGateway>,
    pub probes: Vec<Arc<dyn HealthProbe>>,
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub provision: ProvisionSettings,
    pub bridge: BridgeSettings,
    pub stop_grace: Duration,
    pub hourly_token_budget: u64,
    pub rate_window: Duration,
    pub default_key_budget: f64,
}

/// Every use case, built over one set of backends.
pub struct AppContext {
    pub provisioner: Provisioner,
    pub reconciler: Arc<Reconciler>,
    pub ledger: Arc<CreditLedger>,
    pub limiter: RateLimiter,
    pub usage: UsageSettlement,
    pub gateway: GatewayService,
    pub bridge: BridgeDeployer,
    pub health: HealthService,
}

impl AppContext {
    #[must_use]
    pub fn new(backends: Backends, settings: AppSettings) -> Self {
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&backends.runtime),
            Arc::clone(&backends.registry),
            settings.stop_grace,
        ));
        let ledger = Arc::new(CreditLedger::new(backends.credits));

        Self {
            provisioner: Provisioner::new(
                Arc::clone(&backends.runtime),
                backends.registry,
                backends.workspaces,
                Arc::clone(&backends.gateway),
                settings.provision,
            ),
            usage: UsageSettlement::new(Arc::clone(&ledger), Arc::clone(&reconciler)),
            reconciler,
            ledger,
            limiter: RateLimiter::new(
                backends.rates,
                settings.hourly_token_budget,
                settings.rate_window,
            ),
            gateway: GatewayService::new(backends.gateway, settings.default_key_budget),
            bridge: BridgeDeployer::new(backends.runtime, settings.bridge),
            health: HealthService::new(backends.probes),
        }
    }
}

/// Live connections plus the handles that need an explicit close.
pub struct Connected {
    pub backends: Backends,
    pub valkey: Option<ValkeyStore>,
}

/// One backend serving every store port.
struct StoreHandles {
    registry: Arc<dyn AgentRegistry>,
    credits: Arc<dyn CreditStore>,
    rates: Arc<dyn RateWindowStore>,
    probe: Arc<dyn HealthProbe>,
}

impl StoreHandles {
    fn shared<S>(store: Arc<S>) -> Self
    where
        S: AgentRegistry + CreditStore + RateWindowStore + HealthProbe + 'static,
    {
        Self {
            registry: store.clone(),
            credits: store.clone(),
            rates: store.clone(),
            probe: store,
        }
    }
}

/// Open and verify every client named by the configuration.
pub async fn connect(config: &OrchestratorConfig) -> Result<Connected> {
    let docker = Arc::new(
        DockerRuntime::connect()
            .await
            .context("container runtime unavailable")?,
    );
    let gateway = Arc::new(HttpGateway::new(config.gateway_settings()?)?);
    let workspaces = Arc::new(FsWorkspaces::new(&config.agents_dir));

    let (stores, valkey) = match config.store_backend {
        StoreBackend::Valkey => {
            let store = ValkeyStore::connect(&config.valkey_settings()?)
                .await
                .context("failed to initialise Valkey connection")?;
            (StoreHandles::shared(Arc::new(store.clone())), Some(store))
        }
        StoreBackend::Memory => {
            tracing::warn!("using in-memory store; state is lost on restart");
            (StoreHandles::shared(Arc::new(MemoryStore::new())), None)
        }
    };
    let runtime_probe: Arc<dyn HealthProbe> = docker.clone();

    Ok(Connected {
        backends: Backends {
            runtime: docker,
            registry: stores.registry,
            credits: stores.credits,
            rates: stores.rates,
            workspaces,
            gateway,
            probes: vec![runtime_probe, stores.probe],
        },
        valkey,
    })
}
