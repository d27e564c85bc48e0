//! # Application State
//!
//! Everything a handler needs, built once at startup and shared by `Arc`.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::{
    config::{Config, ConfigError},
    core::http_client::{HttpClientBuilder, HttpClientError},
    health::{HealthProbe, HealthTracker},
    providers::{OpenAiCompatibleProvider, Provider},
    registry::{EndpointRegistry, ModelDiscovery},
    selection::{RoundRobinPool, WeightedSelector},
};

/// Name of the auxiliary transcription pool, used in logs and errors
pub const TRANSCRIPTION_POOL: &str = "transcription";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    HttpClient(#[from] HttpClientError),
}

/// # Application State
///
/// Cloned into every handler; all members are shared.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Configured inference endpoints and the model catalog
    pub registry: Arc<EndpointRegistry>,
    pub selector: Arc<WeightedSelector>,
    pub provider: Arc<dyn Provider>,
    /// Round-robin pool of transcription servers
    pub transcription: Arc<RoundRobinPool>,
    /// Probes inference endpoints for `/health`
    pub inference_health: Arc<HealthTracker>,
}

impl AppState {
    /// Build the state and run the first discovery pass.
    ///
    /// Discovery failures are not fatal: the gateway comes up with whatever
    /// models the reachable endpoints reported.
    pub async fn new(config: Config) -> Result<Self, StartupError> {
        let endpoints = config.load_endpoints()?;
        let transcription_endpoints = config.load_transcription_endpoints()?;
        let client = HttpClientBuilder::from_config(&config).build()?;

        let registry = Arc::new(EndpointRegistry::new(
            endpoints,
            ModelDiscovery::new(client.clone(), config.request_timeout()),
        ));
        let report = registry.discover().await;
        info!(
            endpoints = report.endpoints_queried,
            failed = report.failures.len(),
            models = report.catalog.len(),
            "Initial model discovery finished"
        );

        let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatibleProvider::new(
            client.clone(),
            config.request_timeout(),
        ));

        let transcription = RoundRobinPool::new(
            TRANSCRIPTION_POOL,
            transcription_endpoints,
            HealthTracker::new(
                client.clone(),
                HealthProbe::transcription(),
                config.health_probe_timeout(),
                config.health_check_ttl(),
            ),
        );
        if transcription.is_configured() {
            info!(servers = transcription.total(), "Transcription pool configured");
        }

        let inference_health = HealthTracker::new(
            client,
            HealthProbe::models_listing(),
            config.health_probe_timeout(),
            config.health_check_ttl(),
        );

        Ok(Self::from_parts(
            config,
            registry,
            provider,
            transcription,
            inference_health,
        ))
    }

    /// Assemble state from prebuilt parts; no network I/O.
    pub fn from_parts(
        config: Config,
        registry: Arc<EndpointRegistry>,
        provider: Arc<dyn Provider>,
        transcription: RoundRobinPool,
        inference_health: HealthTracker,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            selector: Arc::new(WeightedSelector::new()),
            provider,
            transcription: Arc::new(transcription),
            inference_health: Arc::new(inference_health),
        }
    }
}
