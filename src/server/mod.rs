//! # Server Module
//!
//! Router, handlers, auth middleware and shared state for the gateway's
//! HTTP surface.

pub mod auth;
pub mod handlers;
pub mod state;

pub use handlers::{chat_completions, health_check, list_models, transcription_endpoint};
pub use state::{AppState, StartupError};

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    trace::{self, TraceLayer},
};
use tracing::Level;

/// Create router with all routes and middleware
pub fn create_router(state: AppState) -> Router {
    // Everything under /v1 requires the proxy key
    let api = Router::new()
        .route("/v1/models", get(list_models))
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/transcription/endpoint", get(transcription_endpoint))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_proxy_key,
        ));

    Router::new()
        .merge(api)
        .route("/health", get(health_check))
        .layer(
            ServiceBuilder::new()
                // Tracing middleware - logs HTTP requests and responses
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
                )
                // CORS middleware - allows cross-origin requests
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
