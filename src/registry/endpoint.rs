use serde::{Deserialize, Serialize};
use std::fmt;

/// # Upstream Endpoint
///
/// One configured inference server. Built once from configuration and never
/// mutated afterwards; the rest of the gateway shares it behind an `Arc`.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Base URL without a trailing slash
    pub url: String,
    /// Bearer credential; empty for unauthenticated auxiliary servers
    #[serde(default)]
    pub api_key: String,
    /// Relative share of weighted traffic (defaults to 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    /// Reserved; carried through from configuration but not used for selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    /// Reserved; models are always taken from discovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<String>>,
}

impl Endpoint {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            api_key: api_key.into(),
            weight: None,
            priority: None,
            models: None,
        }
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Weight used by selection. Unset and zero both count as 1.
    pub fn effective_weight(&self) -> u64 {
        u64::from(self.weight.unwrap_or(1).max(1))
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.is_empty()
    }

    /// Join a path (starting with `/`) onto the base URL
    pub fn path(&self, path: &str) -> String {
        format!("{}{}", self.url, path)
    }
}

// Hand-written so the credential never reaches the logs.
impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("url", &self.url)
            .field("api_key", &if self.has_api_key() { "<redacted>" } else { "" })
            .field("weight", &self.weight)
            .field("priority", &self.priority)
            .finish()
    }
}
