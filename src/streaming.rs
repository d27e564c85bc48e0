//! # Streaming Module
//!
//! Byte-level passthrough of upstream event streams. The gateway does not
//! parse or re-frame SSE events: whatever the upstream writes is copied to
//! the caller chunk by chunk, in order, as soon as it arrives.
//!
//! The caller side is an mpsc channel whose receiver becomes the HTTP
//! response body. Three ways a pump can end:
//!
//! - upstream finishes: the sender is dropped and the body ends cleanly;
//! - upstream breaks: an error item is pushed so the server aborts the
//!   connection, and the caller sees a truncated stream;
//! - caller leaves: the receiver is gone, the pump stops reading and the
//!   upstream response is dropped with it.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::stream::{BoxStream, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::error::ProxyError;
use crate::providers::Provider;
use crate::registry::Endpoint;
use crate::schemas::ChatCompletionRequest;

pub type ChunkResult = Result<Bytes, io::Error>;
pub type ChunkSender = mpsc::Sender<ChunkResult>;

/// Channel between the pump and the response body
pub fn stream_channel(capacity: usize) -> (ChunkSender, ReceiverStream<ChunkResult>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (tx, ReceiverStream::new(rx))
}

/// An upstream response body that has already passed the status check
pub struct UpstreamStream {
    endpoint: String,
    inner: BoxStream<'static, Result<Bytes, ProxyError>>,
}

impl UpstreamStream {
    pub fn new<S>(endpoint: impl Into<String>, stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, ProxyError>> + Send + 'static,
    {
        Self {
            endpoint: endpoint.into(),
            inner: stream.boxed(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Stream for UpstreamStream {
    type Item = Result<Bytes, ProxyError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

/// What made it to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub chunks: usize,
    pub bytes: usize,
}

impl StreamSummary {
    fn record(&mut self, len: usize) {
        self.chunks += 1;
        self.bytes += len;
    }
}

/// Copy upstream chunks into `sink` until either side ends.
pub async fn pump_stream(
    mut upstream: UpstreamStream,
    sink: ChunkSender,
) -> Result<StreamSummary, ProxyError> {
    let mut summary = StreamSummary::default();

    loop {
        let next = tokio::select! {
            biased;
            _ = sink.closed() => {
                debug!(endpoint = %upstream.endpoint, chunks = summary.chunks, "Client went away while waiting on upstream");
                return Err(ProxyError::ClientDisconnected);
            }
            item = upstream.next() => item,
        };

        match next {
            None => return Ok(summary),
            Some(Ok(chunk)) => {
                if chunk.is_empty() {
                    continue;
                }
                let len = chunk.len();
                if sink.send(Ok(chunk)).await.is_err() {
                    return Err(ProxyError::ClientDisconnected);
                }
                summary.record(len);
            }
            Some(Err(err)) => {
                let abort = io::Error::new(io::ErrorKind::ConnectionAborted, err.to_string());
                let _ = sink.send(Err(abort)).await;
                return Err(err);
            }
        }
    }
}

/// Open a streamed completion on `endpoint` and pump it into `sink`.
pub async fn forward_streaming(
    provider: &dyn Provider,
    endpoint: &Endpoint,
    request: &ChatCompletionRequest,
    sink: ChunkSender,
) -> Result<StreamSummary, ProxyError> {
    let upstream = provider.open_chat_stream(endpoint, request).await?;
    pump_stream(upstream, sink).await
}
