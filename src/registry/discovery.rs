//! # Model Discovery
//!
//! Asks every upstream which models it serves and folds the answers into a
//! [`ModelCatalog`]. One endpoint failing never stops the others; failures
//! come back as data in the [`DiscoveryReport`].

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{Endpoint, ModelCatalog};
use crate::schemas::UpstreamModelList;

pub const MODELS_PATH: &str = "/v1/models";

/// Why one endpoint contributed nothing to a discovery pass
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode model list: {0}")]
    Decode(String),
}

#[derive(Debug, Clone)]
pub struct DiscoveryFailure {
    pub endpoint: String,
    pub error: DiscoveryError,
}

/// Outcome of one pass over all endpoints
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub catalog: ModelCatalog,
    pub failures: Vec<DiscoveryFailure>,
    pub endpoints_queried: usize,
}

impl DiscoveryReport {
    /// True when every queried endpoint failed
    pub fn all_failed(&self) -> bool {
        self.endpoints_queried > 0 && self.failures.len() == self.endpoints_queried
    }
}

#[derive(Debug, Clone)]
pub struct ModelDiscovery {
    client: Client,
    timeout: Duration,
}

impl ModelDiscovery {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Query every endpoint concurrently and merge the results in
    /// declaration order.
    pub async fn discover(
        &self,
        endpoints: &[Arc<Endpoint>],
        generation: u64,
    ) -> DiscoveryReport {
        let results = join_all(endpoints.iter().map(|endpoint| self.list_models(endpoint))).await;

        let mut catalog = ModelCatalog::new(generation, chrono::Utc::now().timestamp_millis());
        let mut failures = Vec::new();

        for (endpoint, result) in endpoints.iter().zip(results) {
            match result {
                Ok(model_ids) => {
                    for model_id in model_ids {
                        info!(model = %model_id, endpoint = %endpoint.url, "Discovered model");
                        catalog.insert(model_id, endpoint.clone());
                    }
                }
                Err(error) => {
                    warn!(endpoint = %endpoint.url, error = %error, "Failed to discover models");
                    failures.push(DiscoveryFailure {
                        endpoint: endpoint.url.clone(),
                        error,
                    });
                }
            }
        }

        info!(
            models = catalog.len(),
            endpoints = endpoints.len(),
            failed = failures.len(),
            "Model discovery pass complete"
        );

        DiscoveryReport {
            catalog,
            failures,
            endpoints_queried: endpoints.len(),
        }
    }

    /// Single attempt against one endpoint's model listing.
    pub async fn list_models(&self, endpoint: &Endpoint) -> Result<Vec<String>, DiscoveryError> {
        let url = endpoint.path(MODELS_PATH);
        debug!(endpoint = %endpoint.url, "Listing models");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&endpoint.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| DiscoveryError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DiscoveryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let listing: UpstreamModelList = response
            .json()
            .await
            .map_err(|e| DiscoveryError::Decode(e.to_string()))?;

        Ok(listing.data.into_iter().map(|model| model.id).collect())
    }
}
