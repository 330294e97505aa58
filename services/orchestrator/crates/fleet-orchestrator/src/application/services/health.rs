use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use fleet_common::api::HealthResponse;
use futures::future::join_all;

use crate::application::ports::HealthProbe;

/// Aggregates dependency probes into one report.
pub struct HealthService {
    probes: Vec<Arc<dyn HealthProbe>>,
}

impl HealthService {
    #[must_use]
    pub fn new(probes: Vec<Arc<dyn HealthProbe>>) -> Self {
        Self { probes }
    }

    /// Probe every dependency concurrently. `healthy` only when all answer.
    pub async fn report(&self) -> HealthResponse {
        let results = join_all(self.probes.iter().map(|probe| async move {
            (probe.component(), probe.probe().await)
        }))
        .await;

        let healthy = results.iter().all(|(_, up)| *up);
        let services: BTreeMap<String, String> = results
            .into_iter()
            .map(|(name, up)| {
                let state = if up { "connected" } else { "disconnected" };
                (name.to_string(), state.to_string())
            })
            .collect();

        HealthResponse {
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            timestamp: Utc::now(),
            services,
        }
    }
}
