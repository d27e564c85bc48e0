//! # Error Types
//!
//! Request-scoped failures surfaced by the gateway. Every variant carries
//! enough context for the logs; the HTTP rendering only ever exposes a
//! status code and a generic message for anything that is not the
//! caller's own fault.

#[cfg(feature = "server")]
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
#[cfg(feature = "server")]
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// The caller sent something we cannot route (missing model, bad body)
    #[error("Bad Request: {0}")]
    BadRequest(String),

    /// Missing or mismatched bearer credential
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Server-side configuration needed by the request is absent
    #[error("Configuration Error: {0}")]
    Configuration(String),

    /// The model id is not present in the catalog
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// A pool was asked for an endpoint but none are configured
    #[error("No endpoints configured for {0}")]
    NoEndpointsConfigured(String),

    /// Non-2xx status or transport failure talking to the selected endpoint
    #[error("Upstream Error ({endpoint}): {message}")]
    Upstream {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    /// The upstream body broke after the caller already received headers
    #[error("Stream interrupted ({endpoint}): {message}")]
    StreamInterrupted { endpoint: String, message: String },

    /// The caller went away mid-stream
    #[error("Client disconnected")]
    ClientDisconnected,

    #[error("Internal Error: {0}")]
    Internal(String),
}

impl ProxyError {
    /// Build an upstream error from a non-2xx response.
    pub fn upstream_status(endpoint: &str, status: u16, body: impl Into<String>) -> Self {
        ProxyError::Upstream {
            endpoint: endpoint.to_string(),
            status: Some(status),
            message: body.into(),
        }
    }

    /// Build an upstream error from a transport failure.
    pub fn upstream_transport(endpoint: &str, err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "request timeout - endpoint did not respond in time".to_string()
        } else if err.is_connect() {
            format!("connection failed: {}", err)
        } else {
            format!("HTTP client error: {}", err)
        };

        ProxyError::Upstream {
            endpoint: endpoint.to_string(),
            status: err.status().map(|s| s.as_u16()),
            message,
        }
    }

    /// Upstream HTTP status, if the failure came with one
    pub fn upstream_status_code(&self) -> Option<u16> {
        match self {
            ProxyError::Upstream { status, .. } => *status,
            _ => None,
        }
    }

    /// OpenAI-style error `type` tag
    pub fn error_type(&self) -> &'static str {
        match self {
            ProxyError::BadRequest(_) | ProxyError::UnsupportedModel(_) => "invalid_request_error",
            ProxyError::Unauthorized(_) => "authentication_error",
            ProxyError::Upstream { .. } | ProxyError::StreamInterrupted { .. } => "api_error",
            ProxyError::NoEndpointsConfigured(_) => "service_unavailable",
            ProxyError::Configuration(_)
            | ProxyError::ClientDisconnected
            | ProxyError::Internal(_) => "internal_error",
        }
    }
}

#[cfg(feature = "server")]
impl ProxyError {
    /// Status code and caller-facing message. Only caller-caused errors echo detail.
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ProxyError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ProxyError::UnsupportedModel(model) => {
                (StatusCode::BAD_REQUEST, format!("Unsupported model: {}", model))
            }
            ProxyError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ProxyError::Configuration(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server configuration error".to_string(),
            ),
            ProxyError::NoEndpointsConfigured(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "No endpoints available".to_string(),
            ),
            ProxyError::Upstream { .. } | ProxyError::StreamInterrupted { .. } => (
                StatusCode::BAD_GATEWAY,
                "Upstream request failed".to_string(),
            ),
            ProxyError::ClientDisconnected
            | ProxyError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

#[cfg(feature = "server")]
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();

        if status.is_server_error() {
            tracing::error!(error = %self, status = status.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "request rejected");
        }

        let body = Json(json!({
            "error": {
                "message": message,
                "type": self.error_type(),
                "code": null
            }
        }));

        (status, body).into_response()
    }
}

impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        let endpoint = err
            .url()
            .map(|url| url.origin().ascii_serialization())
            .unwrap_or_else(|| "unknown".to_string());
        ProxyError::upstream_transport(&endpoint, &err)
    }
}

#[cfg(feature = "server")]
impl From<axum::http::Error> for ProxyError {
    fn from(err: axum::http::Error) -> Self {
        ProxyError::Internal(format!("HTTP protocol error: {}", err))
    }
}

#[cfg(all(test, feature = "server"))]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_detail_is_not_exposed() {
        let err = ProxyError::upstream_status("http://10.0.0.7:8000", 500, "stack trace here");
        let (status, message) = err.status_and_message();

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(!message.contains("10.0.0.7"));
        assert!(!message.contains("stack trace"));
        assert_eq!(err.upstream_status_code(), Some(500));
    }

    #[test]
    fn test_unsupported_model_is_client_error() {
        let (status, message) = ProxyError::UnsupportedModel("ghost".into()).status_and_message();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message, "Unsupported model: ghost");
    }

    #[test]
    fn test_configuration_error_is_generic_500() {
        let (status, message) =
            ProxyError::Configuration("PROXY_API_KEY not configured".into()).status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Server configuration error");
    }
}
