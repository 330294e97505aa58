//! Environment configuration, loaded once at startup via `envy`.
//!
//! Each field maps to `FLEET_<FIELD>`:
//!   - `FLEET_LISTEN_ADDR`              (default `0.0.0.0:5000`)
//!   - `FLEET_API_SECRET` / `FLEET_API_SECRET_FILE` (one required)
//!   - `FLEET_STORE_BACKEND`            (`valkey` | `memory`, default `valkey`)
//!   - `FLEET_VALKEY_URL`               (default `redis://valkey:6379`)
//!   - `FLEET_VALKEY_USER`, `FLEET_VALKEY_PASS_FILE` (optional ACL auth)
//!   - `FLEET_VALKEY_CA`, `FLEET_VALKEY_CLIENT_CERT`, `FLEET_VALKEY_CLIENT_KEY`
//!     (optional mTLS, all three or none)
//!   - `FLEET_GATEWAY_URL`              (default `http://litellm:4000`)
//!   - `FLEET_GATEWAY_MASTER_KEY` / `FLEET_GATEWAY_MASTER_KEY_FILE` (one required)
//!   - `FLEET_GATEWAY_TIMEOUT_SECS`     (default `60`)
//!   - `FLEET_GATEWAY_MODELS`           (default `agent-primary,agent-light`)
//!   - `FLEET_DEFAULT_KEY_BUDGET`       (default `25.0`, USD)
//!   - `FLEET_AGENTS_DIR`               (default `/opt/fleet/agents`)
//!   - `FLEET_AGENT_IMAGE`              (default `python:3.12-slim`)
//!   - `FLEET_AGENT_COMMAND`            (default `sleep infinity`)
//!   - `FLEET_BACKEND_NETWORK`          (default `fleet_backend`)
//!   - `FLEET_STOP_GRACE_SECS`          (default `10`)
//!   - `FLEET_HOURLY_TOKEN_BUDGET`      (default `200000`)
//!   - `FLEET_BRIDGE_IMAGE`             (default `fleet/messaging-bridge:latest`)
//!   - `FLEET_BRIDGE_PORT`              (default `3001`)
//!   - `FLEET_BRIDGE_SESSIONS_DIR`      (default `/opt/fleet/bridge-sessions`)

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use fleet_common::redis_keys::ttl;
use serde::Deserialize;

use crate::app::AppSettings;
use crate::application::services::bridge::BridgeSettings;
use crate::application::services::provision::ProvisionSettings;
use crate::infra::gateway::GatewaySettings;
use crate::infra::valkey::{TlsFiles, ValkeySettings};

pub const ENV_PREFIX: &str = "FLEET_";

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Valkey,
    /// In-process maps; state is lost on restart.
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    pub api_secret: Option<String>,
    pub api_secret_file: Option<PathBuf>,

    #[serde(default = "default_store_backend")]
    pub store_backend: StoreBackend,

    #[serde(default = "default_valkey_url")]
    pub valkey_url: String,
    pub valkey_user: Option<String>,
    pub valkey_pass_file: Option<PathBuf>,
    pub valkey_ca: Option<PathBuf>,
    pub valkey_client_cert: Option<PathBuf>,
    pub valkey_client_key: Option<PathBuf>,

    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,
    pub gateway_master_key: Option<String>,
    pub gateway_master_key_file: Option<PathBuf>,
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,
    #[serde(default = "default_gateway_models")]
    pub gateway_models: Vec<String>,
    #[serde(default = "default_key_budget")]
    pub default_key_budget: f64,

    #[serde(default = "default_agents_dir")]
    pub agents_dir: PathBuf,
    #[serde(default = "default_agent_image")]
    pub agent_image: String,
    #[serde(default = "default_agent_command")]
    pub agent_command: String,
    #[serde(default = "default_backend_network")]
    pub backend_network: String,
    #[serde(default = "default_stop_grace_secs")]
    pub stop_grace_secs: u64,
    #[serde(default = "default_hourly_token_budget")]
    pub hourly_token_budget: u64,

    #[serde(default = "default_bridge_image")]
    pub bridge_image: String,
    #[serde(default = "default_bridge_port")]
    pub bridge_port: u16,
    #[serde(default = "default_bridge_sessions_dir")]
    pub bridge_sessions_dir: PathBuf,
}

fn default_listen_addr() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Valkey
}

fn default_valkey_url() -> String {
    "redis://valkey:6379".to_string()
}

fn default_gateway_url() -> String {
    "http://litellm:4000".to_string()
}

fn default_gateway_timeout_secs() -> u64 {
    60
}

fn default_gateway_models() -> Vec<String> {
    vec!["agent-primary".to_string(), "agent-light".to_string()]
}

fn default_key_budget() -> f64 {
    25.0
}

fn default_agents_dir() -> PathBuf {
    PathBuf::from("/opt/fleet/agents")
}

fn default_agent_image() -> String {
    "python:3.12-slim".to_string()
}

fn default_agent_command() -> String {
    "sleep infinity".to_string()
}

fn default_backend_network() -> String {
    "fleet_backend".to_string()
}

fn default_stop_grace_secs() -> u64 {
    10
}

fn default_hourly_token_budget() -> u64 {
    200_000
}

fn default_bridge_image() -> String {
    "fleet/messaging-bridge:latest".to_string()
}

fn default_bridge_port() -> u16 {
    3001
}

fn default_bridge_sessions_dir() -> PathBuf {
    PathBuf::from("/opt/fleet/bridge-sessions")
}

/// Read a Docker-secret style file, trimming the trailing newline.
fn read_secret(path: &Path) -> Result<String> {
    let value = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read secret from {}", path.display()))?
        .trim()
        .to_string();
    anyhow::ensure!(!value.is_empty(), "secret file {} is empty", path.display());
    Ok(value)
}

fn inline_or_file(inline: Option<&String>, file: Option<&PathBuf>, what: &str) -> Result<String> {
    match (inline.map(|s| s.trim()).filter(|s| !s.is_empty()), file) {
        (Some(value), _) => Ok(value.to_string()),
        (None, Some(path)) => read_secret(path),
        (None, None) => anyhow::bail!(
            "{what} is required: set {ENV_PREFIX}{} or {ENV_PREFIX}{}_FILE",
            what.to_uppercase(),
            what.to_uppercase()
        ),
    }
}

impl OrchestratorConfig {
    /// Load from the process environment and validate.
    pub fn from_env() -> Result<Self> {
        let config: Self = envy::prefixed(ENV_PREFIX)
            .from_env()
            .context("failed to load config from FLEET_* env vars")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from explicit key/value pairs (full `FLEET_*` names) and validate.
    pub fn from_pairs<I, K, V>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let config: Self = envy::prefixed(ENV_PREFIX)
            .from_iter(pairs.into_iter().map(|(k, v)| (k.into(), v.into())))
            .context("failed to load config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.listen_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("invalid listen address {}", self.listen_addr))?;
        anyhow::ensure!(
            self.api_secret.is_some() || self.api_secret_file.is_some(),
            "api_secret is required: set FLEET_API_SECRET or FLEET_API_SECRET_FILE"
        );
        anyhow::ensure!(
            self.gateway_master_key.is_some() || self.gateway_master_key_file.is_some(),
            "gateway_master_key is required: set FLEET_GATEWAY_MASTER_KEY or \
             FLEET_GATEWAY_MASTER_KEY_FILE"
        );

        let tls_parts = [
            self.valkey_ca.is_some(),
            self.valkey_client_cert.is_some(),
            self.valkey_client_key.is_some(),
        ];
        anyhow::ensure!(
            tls_parts.iter().all(|p| *p) || tls_parts.iter().all(|p| !*p),
            "FLEET_VALKEY_CA, FLEET_VALKEY_CLIENT_CERT and FLEET_VALKEY_CLIENT_KEY \
             must be set together"
        );

        anyhow::ensure!(self.gateway_timeout_secs > 0, "gateway timeout must be positive");
        anyhow::ensure!(
            self.default_key_budget.is_finite() && self.default_key_budget > 0.0,
            "default key budget must be positive"
        );
        anyhow::ensure!(self.stop_grace_secs > 0, "stop grace period must be positive");
        anyhow::ensure!(
            self.hourly_token_budget > 0,
            "hourly token budget must be positive"
        );
        anyhow::ensure!(
            !self.agent_command.trim().is_empty(),
            "agent command must not be empty"
        );
        anyhow::ensure!(
            !self.gateway_models.is_empty(),
            "at least one gateway model is required"
        );
        Ok(())
    }

    pub fn api_secret(&self) -> Result<String> {
        inline_or_file(
            self.api_secret.as_ref(),
            self.api_secret_file.as_ref(),
            "api_secret",
        )
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("invalid listen address {}", self.listen_addr))
    }

    pub fn valkey_settings(&self) -> Result<ValkeySettings> {
        let password = self
            .valkey_pass_file
            .as_deref()
            .map(read_secret)
            .transpose()?;
        let tls = match (
            &self.valkey_ca,
            &self.valkey_client_cert,
            &self.valkey_client_key,
        ) {
            (Some(ca), Some(cert), Some(key)) => Some(TlsFiles {
                ca: ca.clone(),
                client_cert: cert.clone(),
                client_key: key.clone(),
            }),
            _ => None,
        };
        Ok(ValkeySettings {
            url: self.valkey_url.clone(),
            user: self.valkey_user.clone(),
            password,
            tls,
        })
    }

    pub fn gateway_settings(&self) -> Result<GatewaySettings> {
        Ok(GatewaySettings {
            base_url: self.gateway_url.clone(),
            master_key: inline_or_file(
                self.gateway_master_key.as_ref(),
                self.gateway_master_key_file.as_ref(),
                "gateway_master_key",
            )?,
            timeout: Duration::from_secs(self.gateway_timeout_secs),
            models: self.gateway_models.clone(),
        })
    }

    #[must_use]
    pub fn app_settings(&self) -> AppSettings {
        AppSettings {
            provision: ProvisionSettings {
                image: self.agent_image.clone(),
                command: self
                    .agent_command
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
                backend_network: self.backend_network.clone(),
                key_budget: self.default_key_budget,
            },
            bridge: BridgeSettings {
                image: self.bridge_image.clone(),
                port: self.bridge_port,
                sessions_dir: self.bridge_sessions_dir.clone(),
                backend_network: self.backend_network.clone(),
            },
            stop_grace: Duration::from_secs(self.stop_grace_secs),
            hourly_token_budget: self.hourly_token_budget,
            rate_window: Duration::from_secs(ttl::RATE_WINDOW_SECS),
            default_key_budget: self.default_key_budget,
        }
    }
}
