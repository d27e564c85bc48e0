//! # Health Tracker
//!
//! Liveness probing with a freshness window. Probe results are cached per
//! endpoint URL; a result older than the TTL is treated as unknown and the
//! endpoint is probed again on the next refresh.
//!
//! Probes are defined by the status codes that count as proof of life. For
//! transcription servers that is a `422`: the probe posts an empty body and
//! the validation error shows the server is accepting work. Anything else,
//! including `2xx`, a timeout, or a refused connection, is unhealthy.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use futures::future::join_all;
use reqwest::{Client, Method, StatusCode};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::registry::Endpoint;

pub const TRANSCRIPTION_PROBE_PATH: &str = "/v1/audio/transcriptions";

/// # Health Probe
///
/// What request to send and which statuses mean "alive".
#[derive(Debug, Clone)]
pub struct HealthProbe {
    pub method: Method,
    pub path: String,
    /// Attach the endpoint's bearer key
    pub send_credentials: bool,
    pub expected: Vec<StatusCode>,
}

impl HealthProbe {
    /// Empty POST to the transcription route; a `422` proves the server is up.
    pub fn transcription() -> Self {
        Self {
            method: Method::POST,
            path: TRANSCRIPTION_PROBE_PATH.to_string(),
            send_credentials: false,
            expected: vec![StatusCode::UNPROCESSABLE_ENTITY],
        }
    }

    /// Authenticated model listing; only a `200` counts.
    pub fn models_listing() -> Self {
        Self {
            method: Method::GET,
            path: crate::registry::discovery::MODELS_PATH.to_string(),
            send_credentials: true,
            expected: vec![StatusCode::OK],
        }
    }

    pub fn accepts(&self, status: StatusCode) -> bool {
        self.expected.contains(&status)
    }
}

/// Result of the last completed probe for one endpoint
#[derive(Debug, Clone, Copy)]
pub struct HealthRecord {
    pub healthy: bool,
    pub checked_at: Instant,
}

impl HealthRecord {
    pub fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.checked_at) < ttl
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Never probed, or the last probe is older than the TTL
    Unknown,
    Healthy,
    Unhealthy,
}

pub struct HealthTracker {
    client: Client,
    probe: HealthProbe,
    timeout: Duration,
    ttl: Duration,
    records: RwLock<HashMap<String, HealthRecord>>,
}

impl HealthTracker {
    pub fn new(client: Client, probe: HealthProbe, timeout: Duration, ttl: Duration) -> Self {
        Self {
            client,
            probe,
            timeout,
            ttl,
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Send one probe. The timeout is enforced here, independent of whoever
    /// is awaiting the result.
    pub async fn check_health(&self, endpoint: &Endpoint) -> bool {
        let url = endpoint.path(&self.probe.path);
        let mut request = self.client.request(self.probe.method.clone(), &url);
        if self.probe.send_credentials && endpoint.has_api_key() {
            request = request.bearer_auth(&endpoint.api_key);
        }

        match tokio::time::timeout(self.timeout, request.send()).await {
            Ok(Ok(response)) => {
                let healthy = self.probe.accepts(response.status());
                debug!(
                    endpoint = %endpoint.url,
                    status = response.status().as_u16(),
                    healthy,
                    "Health probe completed"
                );
                healthy
            }
            Ok(Err(err)) => {
                debug!(endpoint = %endpoint.url, error = %err, "Health probe failed");
                false
            }
            Err(_) => {
                debug!(endpoint = %endpoint.url, timeout_ms = self.timeout.as_millis() as u64, "Health probe timed out");
                false
            }
        }
    }

    /// Probe and record the result.
    pub async fn probe(&self, endpoint: &Endpoint) -> bool {
        let healthy = self.check_health(endpoint).await;
        self.store(&endpoint.url, healthy);
        healthy
    }

    /// Re-probe every endpoint whose record is missing or older than `ttl`,
    /// all at once, and return the healthy subset in configured order.
    ///
    /// When nothing is healthy the full list is returned: the pool keeps
    /// serving rather than refusing every request.
    pub async fn refresh_healthy_list(
        &self,
        endpoints: &[Arc<Endpoint>],
        ttl: Duration,
    ) -> Vec<Arc<Endpoint>> {
        let now = Instant::now();
        let stale: Vec<&Arc<Endpoint>> = {
            let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
            endpoints
                .iter()
                .filter(|endpoint| {
                    records
                        .get(&endpoint.url)
                        .map_or(true, |record| !record.is_fresh(ttl, now))
                })
                .collect()
        };

        if !stale.is_empty() {
            debug!(count = stale.len(), "Probing stale endpoints");
            join_all(stale.into_iter().map(|endpoint| self.probe(endpoint))).await;
        }

        let healthy: Vec<Arc<Endpoint>> = {
            let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
            endpoints
                .iter()
                .filter(|endpoint| records.get(&endpoint.url).is_some_and(|r| r.healthy))
                .cloned()
                .collect()
        };

        if healthy.is_empty() && !endpoints.is_empty() {
            warn!(
                total = endpoints.len(),
                "No endpoint passed its health probe; falling back to the full list"
            );
            return endpoints.to_vec();
        }

        healthy
    }

    /// Classification as seen right now, honoring the TTL
    pub fn status(&self, url: &str) -> HealthStatus {
        match self.record(url) {
            Some(record) if record.is_fresh(self.ttl, Instant::now()) => {
                if record.healthy {
                    HealthStatus::Healthy
                } else {
                    HealthStatus::Unhealthy
                }
            }
            _ => HealthStatus::Unknown,
        }
    }

    pub fn record(&self, url: &str) -> Option<HealthRecord> {
        self.records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(url)
            .copied()
    }

    fn store(&self, url: &str, healthy: bool) {
        let record = HealthRecord {
            healthy,
            checked_at: Instant::now(),
        };
        self.records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string(), record);
    }
}
