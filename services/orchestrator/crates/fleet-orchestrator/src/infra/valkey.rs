//! Valkey-backed agent registry, credit cache and rate windows (fred client,
//! optional ACL auth and mTLS via rustls).

use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fred::prelude::*;
use fred::types::config::{TlsConfig, TlsConnector, TlsHostMapping};
use fleet_common::{AgentRecord, AgentStatus, agent_key, credits_key, rate_key};

use crate::application::ports::{
    AgentRegistry, CreditStore, HealthProbe, RateWindowStore, WindowDecision,
};
use crate::domain::StoreError;

/// Update the status field only when the record exists, so a racing
/// teardown never resurrects a partial hash.
const SET_STATUS_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
  redis.call('HSET', KEYS[1], 'status', ARGV[1])
  return 1
end
return 0
";

/// Check, increment and expiry refresh as one atomic unit.
/// ARGV: tokens, limit, window seconds. Returns {allowed, count}.
const RATE_WINDOW_SCRIPT: &str = r"
local current = tonumber(redis.call('GET', KEYS[1]) or '0')
local tokens = tonumber(ARGV[1])
if current + tokens > tonumber(ARGV[2]) then
  return {0, current}
end
local updated = redis.call('INCRBY', KEYS[1], tokens)
redis.call('EXPIRE', KEYS[1], ARGV[3])
return {1, updated}
";

/// Client certificate material for mTLS.
#[derive(Debug, Clone)]
pub struct TlsFiles {
    pub ca: PathBuf,
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ValkeySettings {
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub tls: Option<TlsFiles>,
}

#[derive(Clone)]
pub struct ValkeyStore {
    client: Client,
}

impl ValkeyStore {
    /// Connect and verify connectivity with `PING`.
    pub async fn connect(settings: &ValkeySettings) -> Result<Self> {
        let mut config = Config::from_url(&settings.url)
            .with_context(|| format!("invalid Valkey URL {}", settings.url))?;
        if let Some(files) = &settings.tls {
            config.tls = Some(TlsConfig {
                connector: TlsConnector::Rustls(Arc::new(rustls_config(files)?).into()),
                hostnames: TlsHostMapping::None,
            });
        }
        if let Some(user) = &settings.user {
            config.username = Some(user.clone());
        }
        if let Some(password) = &settings.password {
            config.password = Some(password.clone());
        }

        let client = Builder::from_config(config)
            .with_connection_config(|conn_config| {
                conn_config.connection_timeout = Duration::from_secs(5);
                conn_config.internal_command_timeout = Duration::from_secs(10);
            })
            .set_policy(ReconnectPolicy::new_exponential(0, 100, 5000, 5))
            .build()?;
        client.init().await.context("Valkey connection failed")?;
        client
            .ping::<String>(None)
            .await
            .context("Valkey startup PING failed")?;

        tracing::info!(
            url = %settings.url,
            tls = settings.tls.is_some(),
            acl = settings.user.is_some(),
            "Valkey connection ready"
        );
        Ok(Self { client })
    }

    /// Send `QUIT` and drop the connection.
    pub async fn close(&self) {
        if let Err(err) = self.client.quit().await {
            tracing::warn!(error = %err, "Valkey QUIT failed");
        }
    }
}

fn rustls_config(files: &TlsFiles) -> Result<rustls::ClientConfig> {
    let mut root_store = rustls::RootCertStore::empty();
    for cert in read_certs(&files.ca)? {
        root_store
            .add(cert)
            .context("failed to add CA cert to root store")?;
    }
    let client_certs = read_certs(&files.client_cert)?;

    let key_file = File::open(&files.client_key)
        .with_context(|| format!("failed to open client key: {}", files.client_key.display()))?;
    let client_key = rustls_pemfile::private_key(&mut BufReader::new(key_file))
        .context("failed to parse client key")?
        .context("no private key found in file")?;

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_client_auth_cert(client_certs, client_key)
        .context("failed to build TLS config with client auth")
}

fn read_certs(path: &Path) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>> {
    let file =
        File::open(path).with_context(|| format!("failed to open cert: {}", path.display()))?;
    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("failed to parse cert: {}", path.display()))
}

fn backend(err: &Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[async_trait]
impl AgentRegistry for ValkeyStore {
    async fn put(&self, record: &AgentRecord) -> Result<(), StoreError> {
        self.client
            .hset::<(), _, _>(agent_key(&record.agent_id), record.to_fields())
            .await
            .map_err(|e| backend(&e))
    }

    async fn get(&self, agent_id: &str) -> Result<Option<AgentRecord>, StoreError> {
        let key = agent_key(agent_id);
        let fields: HashMap<String, String> =
            self.client.hgetall(&key).await.map_err(|e| backend(&e))?;
        if fields.is_empty() {
            return Ok(None);
        }
        AgentRecord::from_fields(&fields)
            .map(Some)
            .map_err(|err| StoreError::Corrupt {
                key,
                reason: err.to_string(),
            })
    }

    async fn set_status(&self, agent_id: &str, status: AgentStatus) -> Result<bool, StoreError> {
        let updated: i64 = self
            .client
            .eval(
                SET_STATUS_SCRIPT,
                vec![agent_key(agent_id)],
                vec![status.as_str().to_string()],
            )
            .await
            .map_err(|e| backend(&e))?;
        Ok(updated == 1)
    }
}

#[async_trait]
impl CreditStore for ValkeyStore {
    async fn balance(&self, user_id: &str) -> Result<Option<i64>, StoreError> {
        self.client
            .get::<Option<i64>, _>(credits_key(user_id))
            .await
            .map_err(|e| backend(&e))
    }

    async fn decrement(&self, user_id: &str, cents: i64) -> Result<i64, StoreError> {
        self.client
            .decr_by::<i64, _>(credits_key(user_id), cents)
            .await
            .map_err(|e| backend(&e))
    }

    async fn set_balance(&self, user_id: &str, cents: i64) -> Result<(), StoreError> {
        self.client
            .set::<(), _, _>(credits_key(user_id), cents, None, None, false)
            .await
            .map_err(|e| backend(&e))
    }
}

#[async_trait]
impl RateWindowStore for ValkeyStore {
    async fn try_consume(
        &self,
        user_id: &str,
        tokens: u64,
        budget: u64,
        window: Duration,
    ) -> Result<WindowDecision, StoreError> {
        let key = rate_key(user_id);
        let reply: Vec<i64> = self
            .client
            .eval(
                RATE_WINDOW_SCRIPT,
                vec![key.clone()],
                vec![
                    tokens.to_string(),
                    budget.to_string(),
                    window.as_secs().max(1).to_string(),
                ],
            )
            .await
            .map_err(|e| backend(&e))?;
        window_decision(key, &reply)
    }
}

/// Decode the `{allowed, count}` reply of [`RATE_WINDOW_SCRIPT`].
fn window_decision(key: String, reply: &[i64]) -> Result<WindowDecision, StoreError> {
    match reply {
        [allowed @ (0 | 1), count] => Ok(WindowDecision {
            allowed: *allowed == 1,
            current_tokens: u64::try_from(*count).unwrap_or(0),
        }),
        other => Err(StoreError::Corrupt {
            key,
            reason: format!("unexpected rate script reply {other:?}"),
        }),
    }
}

#[async_trait]
impl HealthProbe for ValkeyStore {
    fn component(&self) -> &'static str {
        "store"
    }

    async fn probe(&self) -> bool {
        self.client.ping::<String>(None).await.is_ok()
    }
}
