//! # Proxy Key Middleware
//!
//! Guards every `/v1/*` route with a single shared bearer secret. Runs
//! before any handler, so a rejected request never reaches selection or
//! an upstream.

use axum::{
    body::Body,
    extract::State,
    http::{header, Request},
    middleware::Next,
    response::Response,
};
use subtle::ConstantTimeEq;
use tracing::{error, warn};

use super::AppState;
use crate::error::ProxyError;

/// Characters of a rejected token that may appear in logs
const LOGGED_TOKEN_PREFIX: usize = 8;

pub async fn require_proxy_key(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ProxyError> {
    let expected = match state.config.proxy_api_key.as_deref() {
        Some(key) if !key.is_empty() => key,
        _ => {
            error!("PROXY_API_KEY not configured");
            return Err(ProxyError::Configuration(
                "PROXY_API_KEY not configured".to_string(),
            ));
        }
    };

    let header_value = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ProxyError::Unauthorized("Authorization header is required".to_string()))?;

    let token = bearer_token(header_value);
    if !keys_match(token, expected) {
        let prefix: String = token.chars().take(LOGGED_TOKEN_PREFIX).collect();
        warn!("Invalid API key attempt: {}...", prefix);
        return Err(ProxyError::Unauthorized("Invalid API key".to_string()));
    }

    Ok(next.run(request).await)
}

/// The credential part of `Authorization: Bearer <token>`. Empty when the
/// token is absent or the scheme is anything other than `Bearer`.
fn bearer_token(header_value: &str) -> &str {
    let mut parts = header_value.split_whitespace();
    match parts.next() {
        Some(scheme) if scheme.eq_ignore_ascii_case("bearer") => parts.next().unwrap_or(""),
        _ => "",
    }
}

fn keys_match(token: &str, expected: &str) -> bool {
    let token = token.as_bytes();
    let expected = expected.as_bytes();
    token.len() == expected.len() && bool::from(token.ct_eq(expected))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token("Bearer abc"), "abc");
        assert_eq!(bearer_token("Bearer   abc  "), "abc");
        assert_eq!(bearer_token("bearer abc"), "abc");
        assert_eq!(bearer_token("BEARER abc"), "abc");
        assert_eq!(bearer_token("Bearer"), "");
        assert_eq!(bearer_token(""), "");
    }

    #[test]
    fn test_other_schemes_yield_no_token() {
        assert_eq!(bearer_token("Basic abc"), "");
        assert_eq!(bearer_token("Token abc"), "");
        assert_eq!(bearer_token("abc"), "");
    }

    #[test]
    fn test_keys_match() {
        assert!(keys_match("secret", "secret"));
        assert!(!keys_match("secret", "secreT"));
        assert!(!keys_match("secret", "secret-longer"));
        assert!(!keys_match("", "secret"));
    }
}
