//! # Server Handlers
//!
//! HTTP route handlers for the gateway surface.

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::future::join_all;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::AppState;
use crate::{
    error::ProxyError,
    schemas::{
        ChatApiHealth, ChatCompletionRequest, EndpointHealth, HealthReport, ModelsHealth,
        ModelsResponse, ServicesHealth, SpeechToTextHealth, TranscriptionEndpointResponse,
    },
    streaming::{pump_stream, stream_channel},
};

/// `GET /v1/models`
pub async fn list_models(State(state): State<AppState>) -> Json<ModelsResponse> {
    Json(ModelsResponse {
        data: state.registry.available_models(),
    })
}

/// `POST /v1/chat/completions`
pub async fn chat_completions(
    State(state): State<AppState>,
    payload: Result<Json<ChatCompletionRequest>, JsonRejection>,
) -> Result<Response, ProxyError> {
    let Json(request) = payload.map_err(|rejection| ProxyError::BadRequest(rejection.body_text()))?;

    let model = request
        .model_id()
        .ok_or_else(|| ProxyError::BadRequest("Model parameter is required".to_string()))?
        .to_string();

    let request_id = Uuid::new_v4();
    let span = info_span!("chat_completion", %request_id, model = %model);

    route_chat(state, model, request).instrument(span).await
}

async fn route_chat(
    state: AppState,
    model: String,
    mut request: ChatCompletionRequest,
) -> Result<Response, ProxyError> {
    // upstreams see the trimmed id the catalog was keyed by
    request.model = Some(model.clone());

    let catalog = state.registry.catalog();
    let endpoint = state.selector.select(&model, &catalog)?;
    info!(
        endpoint = %endpoint.url,
        stream = request.is_streaming(),
        provider = state.provider.name(),
        "Routing chat completion"
    );

    if !request.is_streaming() {
        let body = state.provider.chat_completions(&endpoint, &request).await?;
        return Ok(Json(body).into_response());
    }

    let upstream = state.provider.open_chat_stream(&endpoint, &request).await?;
    let (sink, body) = stream_channel(state.config.stream_buffer_chunks);

    tokio::spawn(
        async move {
            match pump_stream(upstream, sink).await {
                Ok(summary) => info!(
                    chunks = summary.chunks,
                    bytes = summary.bytes,
                    "Stream completed"
                ),
                Err(ProxyError::ClientDisconnected) => {
                    info!("Client disconnected, upstream stream dropped")
                }
                Err(err) => warn!(error = %err, "Stream interrupted after headers were sent"),
            }
        }
        .in_current_span(),
    );

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(body))?;
    Ok(response)
}

/// `GET /v1/transcription/endpoint`
pub async fn transcription_endpoint(
    State(state): State<AppState>,
) -> Result<Json<TranscriptionEndpointResponse>, ProxyError> {
    let selection = state.transcription.next_healthy().await?;
    debug!(
        endpoint = %selection.endpoint.url,
        healthy = selection.healthy,
        total = selection.total,
        "Transcription endpoint selected"
    );

    Ok(Json(TranscriptionEndpointResponse {
        url: selection.endpoint.url.clone(),
        healthy_endpoints: selection.healthy,
        total_endpoints: selection.total,
        model: state.config.transcription_model.clone(),
    }))
}

/// `GET /health`
///
/// Probes every inference endpoint and transcription server right now.
/// 200 when routing can succeed, 503 otherwise.
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let inference = state.registry.endpoints();
    let chat_endpoints = join_all(inference.iter().map(|endpoint| {
        let tracker = state.inference_health.clone();
        async move {
            EndpointHealth {
                url: endpoint.url.clone(),
                status: tracker.probe(endpoint).await,
            }
        }
    }))
    .await;

    let pool = &state.transcription;
    let stt_endpoints = join_all(pool.endpoints().iter().map(|endpoint| async move {
        EndpointHealth {
            url: endpoint.url.clone(),
            status: pool.tracker().probe(endpoint).await,
        }
    }))
    .await;

    let chat_api = ChatApiHealth {
        status: chat_endpoints.iter().any(|e| e.status),
        configured: !inference.is_empty(),
        endpoints: chat_endpoints,
    };

    let catalog = state.registry.catalog();
    let models = ModelsHealth {
        available: catalog.len(),
        status: !catalog.is_empty(),
    };

    let speech_to_text = SpeechToTextHealth {
        status: stt_endpoints.iter().any(|e| e.status),
        configured: pool.is_configured(),
        servers: pool.total(),
        endpoints: stt_endpoints,
    };

    let healthy = chat_api.status
        && models.status
        && (!speech_to_text.configured || speech_to_text.status);

    if !healthy {
        warn!(
            chat_api = chat_api.status,
            models = models.available,
            speech_to_text = speech_to_text.status,
            "Health check failed"
        );
    }

    let report = HealthReport {
        status: if healthy { "healthy" } else { "unhealthy" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        services: ServicesHealth {
            chat_api,
            models,
            speech_to_text,
        },
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
