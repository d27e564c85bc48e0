//! # Schemas Module
//!
//! Wire types for the OpenAI-compatible subset the gateway speaks, both
//! towards callers and towards upstream endpoints.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// # Chat Completion Request
///
/// Only the fields the gateway routes on are typed. Everything else the
/// caller sends is kept in `extra` and forwarded untouched.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ChatCompletionRequest {
    /// Model identifier; required for routing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Whether to stream the response (Server-Sent Events)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ChatCompletionRequest {
    pub fn is_streaming(&self) -> bool {
        self.stream.unwrap_or(false)
    }

    /// The model id, if present and non-blank
    pub fn model_id(&self) -> Option<&str> {
        self.model.as_deref().map(str::trim).filter(|m| !m.is_empty())
    }
}

/// Chat message. `content` stays as raw JSON so multimodal parts pass through.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Message {
    pub role: String,
    #[serde(default)]
    pub content: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: Value::String(content.into()),
            extra: Map::new(),
        }
    }
}

/// One entry of the gateway's `/v1/models` response
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ModelSummary {
    pub id: String,
    pub object: String,
    /// Discovery time, unix milliseconds
    pub created: i64,
    pub owned_by: String,
}

impl ModelSummary {
    pub fn proxied(id: String, created: i64) -> Self {
        Self {
            id,
            object: "model".to_string(),
            created,
            owned_by: "proxy".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsResponse {
    pub data: Vec<ModelSummary>,
}

/// Upstream `/v1/models` body; only `id` matters to discovery
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamModelList {
    #[serde(default)]
    pub data: Vec<UpstreamModel>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamModel {
    pub id: String,
}

/// Response of `/v1/transcription/endpoint`
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptionEndpointResponse {
    pub url: String,
    pub healthy_endpoints: usize,
    pub total_endpoints: usize,
    pub model: Option<String>,
}

/// Per-endpoint line in the health report
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointHealth {
    pub url: String,
    pub status: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatApiHealth {
    pub status: bool,
    pub configured: bool,
    pub endpoints: Vec<EndpointHealth>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModelsHealth {
    pub available: usize,
    pub status: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SpeechToTextHealth {
    pub status: bool,
    pub configured: bool,
    pub servers: usize,
    pub endpoints: Vec<EndpointHealth>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServicesHealth {
    pub chat_api: ChatApiHealth,
    pub models: ModelsHealth,
    pub speech_to_text: SpeechToTextHealth,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub timestamp: String,
    pub services: ServicesHealth,
}
