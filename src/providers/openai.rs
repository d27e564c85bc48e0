//! # OpenAI-Compatible Provider
//!
//! Forwards chat completions to any endpoint that implements the OpenAI
//! `/v1/chat/completions` contract (vLLM, LightLLM, llama.cpp server, ...).
//! Single attempt per request; retrying elsewhere is not this layer's call.

use std::time::{Duration, Instant};

use futures_util::StreamExt;
use reqwest::{header, Client, RequestBuilder};
use serde_json::Value;
use tracing::debug;

use super::{Provider, CHAT_COMPLETIONS_PATH};
use crate::{
    error::ProxyError,
    registry::Endpoint,
    schemas::ChatCompletionRequest,
    streaming::UpstreamStream,
};

#[derive(Clone, Debug)]
pub struct OpenAiCompatibleProvider {
    /// Shared client; carries no total timeout of its own
    client: Client,
    /// Total timeout for buffered completions
    request_timeout: Duration,
}

impl OpenAiCompatibleProvider {
    pub fn new(client: Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    fn post(&self, endpoint: &Endpoint, request: &ChatCompletionRequest) -> RequestBuilder {
        let mut builder = self
            .client
            .post(endpoint.path(CHAT_COMPLETIONS_PATH))
            .json(request);

        if endpoint.has_api_key() {
            builder = builder.bearer_auth(&endpoint.api_key);
        }
        builder
    }

    /// Read an error body without letting a stalled upstream hold the request.
    async fn error_body(&self, response: reqwest::Response) -> String {
        match tokio::time::timeout(self.request_timeout, response.text()).await {
            Ok(Ok(body)) => body,
            Ok(Err(err)) => format!("<unreadable body: {}>", err),
            Err(_) => "<timed out reading body>".to_string(),
        }
    }
}

#[async_trait::async_trait]
impl Provider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        "openai-compatible"
    }

    async fn chat_completions(
        &self,
        endpoint: &Endpoint,
        request: &ChatCompletionRequest,
    ) -> Result<Value, ProxyError> {
        let start_time = Instant::now();

        let response = self
            .post(endpoint, request)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ProxyError::upstream_transport(&endpoint.url, &e))?;

        let status = response.status();
        debug!(endpoint = %endpoint.url, status = status.as_u16(), "Upstream responded");

        if !status.is_success() {
            let body = self.error_body(response).await;
            return Err(ProxyError::upstream_status(&endpoint.url, status.as_u16(), body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProxyError::upstream_transport(&endpoint.url, &e))?;

        let json = serde_json::from_slice::<Value>(&bytes).map_err(|e| ProxyError::Upstream {
            endpoint: endpoint.url.clone(),
            status: Some(status.as_u16()),
            message: format!("error decoding response body: {}", e),
        })?;

        debug!(
            endpoint = %endpoint.url,
            response_time_ms = start_time.elapsed().as_millis() as u64,
            "Completed chat completion request"
        );
        Ok(json)
    }

    async fn open_chat_stream(
        &self,
        endpoint: &Endpoint,
        request: &ChatCompletionRequest,
    ) -> Result<UpstreamStream, ProxyError> {
        let mut body = request.clone();
        body.stream = Some(true);

        let response = self
            .post(endpoint, &body)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| ProxyError::upstream_transport(&endpoint.url, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = self.error_body(response).await;
            return Err(ProxyError::upstream_status(&endpoint.url, status.as_u16(), body));
        }

        debug!(endpoint = %endpoint.url, "Upstream stream opened");

        let source = endpoint.url.clone();
        let chunks = response.bytes_stream().map(move |item| {
            item.map_err(|e| ProxyError::StreamInterrupted {
                endpoint: source.clone(),
                message: e.to_string(),
            })
        });

        Ok(UpstreamStream::new(endpoint.url.clone(), chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::Message;
    use crate::streaming::{forward_streaming, stream_channel};
    use serde_json::json;
    use wiremock::{
        matchers::{body_partial_json, header, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn provider() -> OpenAiCompatibleProvider {
        OpenAiCompatibleProvider::new(Client::new(), Duration::from_secs(5))
    }

    fn request(stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: Some("llama".to_string()),
            messages: vec![Message::new("user", "hello")],
            stream: Some(stream),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_buffered_forward_returns_upstream_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-up"))
            .and(body_partial_json(json!({"model": "llama", "stream": false})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "choices": [{"index": 0, "message": {"role": "assistant", "content": "hi"}}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = Endpoint::new(server.uri(), "sk-up");
        let body = provider().chat_completions(&endpoint, &request(false)).await.unwrap();
        assert_eq!(body["choices"][0]["message"]["content"], json!("hi"));
    }

    #[tokio::test]
    async fn test_upstream_error_carries_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let endpoint = Endpoint::new(server.uri(), "sk-up");
        let err = provider().chat_completions(&endpoint, &request(false)).await.unwrap_err();
        match err {
            ProxyError::Upstream { status, message, endpoint } => {
                assert_eq!(status, Some(429));
                assert_eq!(message, "slow down");
                assert_eq!(endpoint, server.uri());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_upstream_error() {
        let endpoint = Endpoint::new("http://127.0.0.1:1", "");
        let err = provider().chat_completions(&endpoint, &request(false)).await.unwrap_err();
        assert!(matches!(err, ProxyError::Upstream { status: None, .. }));
    }

    #[tokio::test]
    async fn test_stream_requests_event_stream() {
        let server = MockServer::start().await;
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"hi\"}}]}\n\ndata: [DONE]\n\n";
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("accept", "text/event-stream"))
            .and(body_partial_json(json!({"stream": true})))
            .respond_with(ResponseTemplate::new(200).set_body_raw(sse, "text/event-stream"))
            .mount(&server)
            .await;

        let endpoint = Endpoint::new(server.uri(), "sk-up");
        let (tx, mut rx) = stream_channel(8);
        let summary = forward_streaming(&provider(), &endpoint, &request(true), tx)
            .await
            .unwrap();

        let mut received = Vec::new();
        while let Some(chunk) = rx.next().await {
            received.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(received, sse.as_bytes());
        assert_eq!(summary.bytes, sse.len());
    }

    #[tokio::test]
    async fn test_stream_open_rejects_non_success_before_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let endpoint = Endpoint::new(server.uri(), "");
        let result = provider().open_chat_stream(&endpoint, &request(true)).await;
        assert!(matches!(
            result,
            Err(ProxyError::Upstream { status: Some(503), .. })
        ));
    }
}
