//! # Endpoint Registry
//!
//! Owns the configured upstream endpoints and the current model catalog.
//! The catalog is published as an `Arc` snapshot: readers clone the
//! pointer and never see a half-built map, and a refresh swaps in a
//! complete new catalog.

pub mod catalog;
pub mod discovery;
pub mod endpoint;

pub use catalog::ModelCatalog;
pub use discovery::{DiscoveryError, DiscoveryFailure, DiscoveryReport, ModelDiscovery};
pub use endpoint::Endpoint;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::schemas::ModelSummary;

pub struct EndpointRegistry {
    endpoints: Vec<Arc<Endpoint>>,
    discovery: ModelDiscovery,
    catalog: RwLock<Arc<ModelCatalog>>,
    generation: AtomicU64,
}

impl EndpointRegistry {
    /// Registry with an empty catalog. Call [`EndpointRegistry::discover`]
    /// before serving traffic.
    pub fn new(endpoints: Vec<Endpoint>, discovery: ModelDiscovery) -> Self {
        Self {
            endpoints: endpoints.into_iter().map(Arc::new).collect(),
            discovery,
            catalog: RwLock::new(Arc::new(ModelCatalog::default())),
            generation: AtomicU64::new(0),
        }
    }

    /// Registry around a prebuilt catalog, for callers that do their own discovery
    pub fn with_catalog(endpoints: Vec<Arc<Endpoint>>, discovery: ModelDiscovery, catalog: ModelCatalog) -> Self {
        let generation = catalog.generation();
        Self {
            endpoints,
            discovery,
            catalog: RwLock::new(Arc::new(catalog)),
            generation: AtomicU64::new(generation),
        }
    }

    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    /// Run one discovery pass and publish the result.
    ///
    /// A pass in which every endpoint failed does not replace a non-empty
    /// catalog, so a transient outage during a refresh keeps routing alive.
    pub async fn discover(&self) -> DiscoveryReport {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let report = self.discovery.discover(&self.endpoints, generation).await;

        let current = self.catalog();
        if report.all_failed() && !current.is_empty() {
            warn!(
                generation = current.generation(),
                "Every endpoint failed discovery; keeping the previous catalog"
            );
            return report;
        }

        if report.catalog.is_empty() {
            warn!("No models discovered; every chat request will be rejected as unsupported");
        }

        let next = Arc::new(report.catalog.clone());
        *self.catalog.write().unwrap_or_else(PoisonError::into_inner) = next;
        report
    }

    /// Current catalog snapshot
    pub fn catalog(&self) -> Arc<ModelCatalog> {
        self.catalog
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Endpoints serving `model_id`; empty (not an error) when unknown.
    pub fn endpoints_for_model(&self, model_id: &str) -> Vec<Arc<Endpoint>> {
        self.catalog().endpoints_for(model_id).to_vec()
    }

    pub fn available_models(&self) -> Vec<ModelSummary> {
        self.catalog().summaries()
    }

    /// Re-run discovery on a fixed interval until `shutdown` fires.
    pub fn spawn_refresh(
        self: Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // the first tick completes immediately; startup already ran a pass
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Model refresh task stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        let report = self.discover().await;
                        info!(
                            generation = self.catalog().generation(),
                            failed = report.failures.len(),
                            "Model catalog refreshed"
                        );
                    }
                }
            }
        })
    }
}
