//! # NexusGateway - LLM Request Router
//!
//! An OpenAI-compatible gateway in front of a fleet of inference endpoints.
//! At startup it asks every configured endpoint which models it serves,
//! then routes each chat completion to one of the endpoints for the
//! requested model by weighted random choice. Streamed completions are
//! proxied byte for byte as they arrive.
//!
//! ## Features
//!
//! - **Model Discovery**: per-endpoint `/v1/models` fan-out, partial failures tolerated
//! - **Weighted Routing**: traffic split proportional to configured endpoint weights
//! - **Streaming Passthrough**: SSE chunks forwarded in order with client-disconnect detection
//! - **Health-Aware Pools**: round-robin over probed transcription servers, fail-open
//! - **Shared-Secret Auth**: one bearer key guards every `/v1` route
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use nexus_gateway::{create_router, AppState, Config};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::for_test(); // or Config::parse_args() for CLI
//!     let state = AppState::new(config).await?;
//!     let app = create_router(state);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`config`] - Configuration management with CLI and environment support
//! - [`registry`] - Configured endpoints, model discovery and the model catalog
//! - [`health`] - Bounded-timeout liveness probes with TTL-cached results
//! - [`selection`] - Weighted random and round-robin endpoint selection
//! - [`providers`] - Upstream API clients behind the `Provider` trait
//! - [`streaming`] - Upstream-to-caller chunk pump
//! - [`server`] - HTTP routes, auth middleware and application state
//! - [`error`] - Request-scoped error type and its HTTP rendering

// Core infrastructure
pub mod core;
pub mod config;
pub mod error;
pub mod schemas;
pub mod graceful_shutdown;

// Domain modules
pub mod registry;
pub mod health;
pub mod selection;
pub mod providers;
pub mod streaming;

#[cfg(feature = "server")]
pub mod server;

// Re-export commonly used types for convenience
pub use config::{Config, ConfigError};
pub use error::ProxyError;
pub use schemas::{ChatCompletionRequest, Message, ModelSummary};
pub use crate::core::http_client::{HttpClientBuilder, HttpClientConfig};
pub use registry::{Endpoint, EndpointRegistry, ModelCatalog, ModelDiscovery};
pub use health::{HealthProbe, HealthTracker};
pub use selection::{RoundRobinPool, WeightedSelector};
pub use providers::{OpenAiCompatibleProvider, Provider};
pub use streaming::{forward_streaming, pump_stream, StreamSummary, UpstreamStream};
pub use graceful_shutdown::shutdown_signal;

// Server re-exports (feature-gated)
#[cfg(feature = "server")]
pub use server::{create_router, AppState, StartupError};

/// The result type used throughout the library
pub type Result<T> = std::result::Result<T, ProxyError>;
