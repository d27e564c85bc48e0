//! # Core Infrastructure
//!
//! Shared plumbing used by discovery, health probing and forwarding.

pub mod http_client;

pub use http_client::{HttpClientBuilder, HttpClientConfig, HttpClientError, PoolConfig};
