#[cfg(feature = "cli")]
use clap::Parser;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::registry::Endpoint;

/// Startup configuration errors. Any of these keeps the gateway from serving.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("No endpoints configured (set ENDPOINTS)")]
    MissingEndpoints,
    #[error("Failed to parse endpoint configuration: {0}")]
    MalformedEndpoints(#[from] serde_json::Error),
    #[error("Endpoint list is empty")]
    EmptyEndpoints,
    #[error("Invalid endpoint URL '{url}': {reason}")]
    InvalidEndpointUrl { url: String, reason: String },
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// # NexusGateway Configuration
///
/// Settings come from command-line flags, environment variables, or a
/// `.env` file. Everything is read once at startup; there is no runtime
/// reconfiguration API.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "cli", derive(Parser))]
#[cfg_attr(feature = "cli", command(name = "nexus-gateway"))]
#[cfg_attr(feature = "cli", command(about = "LLM gateway that routes OpenAI-compatible chat completions across upstream endpoints"))]
#[cfg_attr(feature = "cli", command(version))]
pub struct Config {
    // =============================================================================
    // SERVER
    // =============================================================================

    /// Server port to listen on
    #[cfg_attr(feature = "cli", arg(short, long, env = "PORT", default_value = "3000"))]
    pub port: u16,

    /// Server host to bind to
    #[cfg_attr(feature = "cli", arg(long, env = "HOST", default_value = "0.0.0.0"))]
    pub host: String,

    /// Shared secret callers must present as `Authorization: Bearer <key>`
    #[cfg_attr(feature = "cli", arg(long, env = "PROXY_API_KEY", hide_env_values = true))]
    pub proxy_api_key: Option<String>,

    // =============================================================================
    // UPSTREAMS
    // =============================================================================

    /// JSON array of upstream endpoints: `[{"url": "...", "apiKey": "...", "weight": 2}]`
    #[cfg_attr(feature = "cli", arg(long, env = "ENDPOINTS", hide_env_values = true))]
    pub endpoints: Option<String>,

    /// Re-run model discovery every N seconds (0 disables)
    #[cfg_attr(feature = "cli", arg(long, env = "MODEL_REFRESH_INTERVAL_SECS", default_value = "0"))]
    pub model_refresh_interval_secs: u64,

    /// Transcription servers, comma separated
    #[cfg_attr(feature = "cli", arg(long, env = "TRANSCRIPTION_URLS", value_delimiter = ','))]
    pub transcription_urls: Vec<String>,

    /// Model name handed to clients alongside a transcription endpoint
    #[cfg_attr(feature = "cli", arg(long, env = "TRANSCRIPTION_MODEL"))]
    pub transcription_model: Option<String>,

    // =============================================================================
    // HEALTH CHECKS
    // =============================================================================

    /// How long a probe result stays fresh
    #[cfg_attr(feature = "cli", arg(long, env = "HEALTH_CHECK_TTL_SECS", default_value = "30"))]
    pub health_check_ttl_secs: u64,

    /// Per-probe timeout in milliseconds
    #[cfg_attr(feature = "cli", arg(long, env = "HEALTH_PROBE_TIMEOUT_MS", default_value = "3000"))]
    pub health_probe_timeout_ms: u64,

    // =============================================================================
    // HTTP CLIENT
    // =============================================================================

    /// Total timeout for non-streaming upstream requests in seconds
    #[cfg_attr(feature = "cli", arg(long, env = "HTTP_CLIENT_TIMEOUT", default_value = "120"))]
    pub http_client_timeout: u64,

    /// Idle connections kept per upstream host
    #[cfg_attr(feature = "cli", arg(long, env = "HTTP_CLIENT_MAX_CONNECTIONS_PER_HOST", default_value = "10"))]
    pub http_client_max_connections_per_host: usize,

    /// Chunks buffered between the upstream reader and the client writer
    #[cfg_attr(feature = "cli", arg(long, env = "STREAM_BUFFER_CHUNKS", default_value = "32"))]
    pub stream_buffer_chunks: usize,

    // =============================================================================
    // LOGGING
    // =============================================================================

    /// Log filter directive (e.g. `info`, `nexus_gateway=debug`)
    #[cfg_attr(feature = "cli", arg(long, env = "LOG_LEVEL", default_value = "info"))]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[cfg_attr(feature = "cli", arg(long, env = "LOG_JSON"))]
    pub log_json: bool,
}

impl Config {
    /// Parse configuration from command line arguments and environment variables.
    ///
    /// Loads `.env` first, then sets up logging, then validates. A config that
    /// fails validation is reported and the process exits before binding.
    #[cfg(feature = "cli")]
    pub fn parse_args() -> Self {
        let _ = dotenv::dotenv();

        let config = Self::parse();
        config.setup_logging();

        if let Err(err) = config.validate() {
            tracing::error!("Configuration validation failed: {}", err);
            std::process::exit(1);
        }

        config
    }

    /// Create a test configuration with minimal required fields.
    pub fn for_test() -> Self {
        Self {
            port: 3000,
            host: "127.0.0.1".to_string(),
            proxy_api_key: Some("test-proxy-key".to_string()),
            endpoints: Some(r#"[{"url": "http://localhost:8000", "apiKey": "sk-test"}]"#.to_string()),
            model_refresh_interval_secs: 0,
            transcription_urls: Vec::new(),
            transcription_model: None,
            health_check_ttl_secs: 30,
            health_probe_timeout_ms: 3000,
            http_client_timeout: 30,
            http_client_max_connections_per_host: 10,
            stream_buffer_chunks: 32,
            log_level: "info".to_string(),
            log_json: false,
        }
    }

    /// Install the global tracing subscriber. Safe to call more than once.
    pub fn setup_logging(&self) {
        let filter = tracing_subscriber::EnvFilter::try_new(&self.log_level)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_thread_names(false);

        let _ = if self.log_json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
    }

    /// Validate everything that can be checked without touching the network.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::Invalid(
                "Port cannot be 0. Please specify a valid port number (1-65535).".to_string(),
            ));
        }

        if self.host.is_empty() {
            return Err(ConfigError::Invalid("Host cannot be empty.".to_string()));
        }

        if self.health_probe_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "HEALTH_PROBE_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }

        if self.http_client_timeout == 0 {
            return Err(ConfigError::Invalid(
                "HTTP_CLIENT_TIMEOUT must be greater than 0".to_string(),
            ));
        }

        if self.stream_buffer_chunks == 0 {
            return Err(ConfigError::Invalid(
                "STREAM_BUFFER_CHUNKS must be greater than 0".to_string(),
            ));
        }

        if self.proxy_api_key.as_deref().map_or(true, str::is_empty) {
            tracing::warn!("PROXY_API_KEY is not set; /v1 routes will answer 500 until it is");
        }

        self.load_endpoints()?;
        self.load_transcription_endpoints()?;

        Ok(())
    }

    /// Parse the configured upstream list.
    pub fn load_endpoints(&self) -> Result<Vec<Endpoint>, ConfigError> {
        let raw = self
            .endpoints
            .as_deref()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .ok_or(ConfigError::MissingEndpoints)?;

        let endpoints: Vec<Endpoint> = serde_json::from_str(raw)?;
        if endpoints.is_empty() {
            return Err(ConfigError::EmptyEndpoints);
        }

        endpoints
            .into_iter()
            .map(|endpoint| {
                let url = normalize_url(&endpoint.url)?;
                Ok(Endpoint { url, ..endpoint })
            })
            .collect()
    }

    /// Transcription servers. These carry no credential.
    pub fn load_transcription_endpoints(&self) -> Result<Vec<Endpoint>, ConfigError> {
        self.transcription_urls
            .iter()
            .map(|raw| raw.trim())
            .filter(|raw| !raw.is_empty())
            .map(|raw| Ok(Endpoint::new(normalize_url(raw)?, "")))
            .collect()
    }

    pub fn health_check_ttl(&self) -> Duration {
        Duration::from_secs(self.health_check_ttl_secs)
    }

    pub fn health_probe_timeout(&self) -> Duration {
        Duration::from_millis(self.health_probe_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http_client_timeout)
    }

    /// `None` when periodic discovery is disabled
    pub fn model_refresh_interval(&self) -> Option<Duration> {
        (self.model_refresh_interval_secs > 0)
            .then(|| Duration::from_secs(self.model_refresh_interval_secs))
    }
}

/// Check scheme and host, and trim a trailing `/` so path joins stay consistent.
fn normalize_url(raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = |reason: String| ConfigError::InvalidEndpointUrl {
        url: raw.to_string(),
        reason,
    };

    let parsed = Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    if !["http", "https"].contains(&parsed.scheme()) {
        return Err(invalid(format!("unsupported scheme '{}'", parsed.scheme())));
    }
    if parsed.host_str().is_none() {
        return Err(invalid("missing host".to_string()));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with(endpoints: Option<&str>) -> Config {
        Config {
            endpoints: endpoints.map(str::to_string),
            ..Config::for_test()
        }
    }

    #[test]
    fn test_load_endpoints_parses_weights_and_keys() {
        let config = config_with(Some(
            r#"[
                {"url": "http://a.internal:8000/", "apiKey": "key-a", "weight": 3},
                {"url": "https://b.internal", "apiKey": "key-b", "priority": 1}
            ]"#,
        ));

        let endpoints = config.load_endpoints().unwrap();
        assert_eq!(endpoints.len(), 2);
        assert_eq!(endpoints[0].url, "http://a.internal:8000");
        assert_eq!(endpoints[0].api_key, "key-a");
        assert_eq!(endpoints[0].effective_weight(), 3);
        assert_eq!(endpoints[1].effective_weight(), 1);
        assert_eq!(endpoints[1].priority, Some(1));
    }

    #[test]
    fn test_missing_endpoints_is_config_error() {
        assert!(matches!(
            config_with(None).load_endpoints(),
            Err(ConfigError::MissingEndpoints)
        ));
        assert!(matches!(
            config_with(Some("   ")).load_endpoints(),
            Err(ConfigError::MissingEndpoints)
        ));
    }

    #[test]
    fn test_malformed_endpoints_is_config_error() {
        assert!(matches!(
            config_with(Some("[{url: nope")).load_endpoints(),
            Err(ConfigError::MalformedEndpoints(_))
        ));
        assert!(matches!(
            config_with(Some("[]")).load_endpoints(),
            Err(ConfigError::EmptyEndpoints)
        ));
    }

    #[test]
    fn test_invalid_endpoint_url_rejected() {
        let err = config_with(Some(r#"[{"url": "ftp://files.local", "apiKey": ""}]"#))
            .load_endpoints()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpointUrl { .. }));

        let err = config_with(Some(r#"[{"url": "not a url", "apiKey": ""}]"#))
            .load_endpoints()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpointUrl { .. }));
    }

    #[test]
    fn test_transcription_urls_trimmed() {
        let config = Config {
            transcription_urls: vec![" http://stt-1:9000/ ".into(), "".into(), "http://stt-2:9000".into()],
            ..Config::for_test()
        };

        let pool = config.load_transcription_endpoints().unwrap();
        let urls: Vec<_> = pool.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(urls, vec!["http://stt-1:9000", "http://stt-2:9000"]);
        assert!(pool.iter().all(|e| e.api_key.is_empty()));
    }

    #[test]
    fn test_validate() {
        assert!(Config::for_test().validate().is_ok());

        let config = Config { port: 0, ..Config::for_test() };
        assert!(config.validate().is_err());

        let config = Config { health_probe_timeout_ms: 0, ..Config::for_test() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_refresh_interval_disabled_by_zero() {
        assert_eq!(Config::for_test().model_refresh_interval(), None);

        let config = Config { model_refresh_interval_secs: 60, ..Config::for_test() };
        assert_eq!(config.model_refresh_interval(), Some(Duration::from_secs(60)));
    }
}
