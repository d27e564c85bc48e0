//! # Upstream Providers
//!
//! A provider knows how to talk to one upstream API shape. Every endpoint
//! the gateway fronts today speaks the OpenAI chat-completions contract,
//! so there is a single implementation, but routing only ever goes through
//! the [`Provider`] trait.

pub mod openai;

pub use openai::OpenAiCompatibleProvider;

use serde_json::Value;

use crate::{
    error::ProxyError,
    registry::Endpoint,
    schemas::ChatCompletionRequest,
    streaming::UpstreamStream,
};

pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";

#[async_trait::async_trait]
pub trait Provider: Send + Sync {
    /// Name for logging
    fn name(&self) -> &'static str;

    /// Buffered completion: one POST, the parsed JSON body back.
    async fn chat_completions(
        &self,
        endpoint: &Endpoint,
        request: &ChatCompletionRequest,
    ) -> Result<Value, ProxyError>;

    /// Start a streamed completion. Returns once upstream answered with a
    /// success status; non-2xx is an error before any byte is forwarded.
    async fn open_chat_stream(
        &self,
        endpoint: &Endpoint,
        request: &ChatCompletionRequest,
    ) -> Result<UpstreamStream, ProxyError>;
}
