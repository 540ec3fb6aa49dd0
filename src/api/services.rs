use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    error::ApiError,
    models::{IngestAccepted, IngestRequest},
    state::AppState,
    validation::validate_ingest,
};
use crate::messaging::{HEADER_CORRELATION_ID, Message};
use crate::models::MusicRequest;

/// Request ingress (POST /dispatch)
///
/// Validates the payload, assigns a UUIDv7 when the caller sent none and
/// enqueues the request on the dispatcher queue. Classification and fan-out
/// happen asynchronously in the dispatch worker.
pub async fn ingest_request(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let payload: IngestRequest = serde_json::from_slice(&body)?;
    validate_ingest(&payload)?;

    let uuid = payload
        .uuid
        .unwrap_or_else(|| Uuid::now_v7().to_string());
    let queries = payload.query.len();

    let request = MusicRequest::builder()
        .uuid(uuid.clone())
        .server_id(payload.server_id)
        .query(payload.query)
        .shuffle(payload.shuffle)
        .build();

    let body = request
        .encode()
        .map_err(|e| ApiError::Internal(format!("Failed to encode request: {e}")))?;
    let message = Message::new(&state.config.queues.dispatcher, body)
        .with_header(HEADER_CORRELATION_ID, &uuid);

    state.broker.enqueue(message).await.map_err(|e| {
        warn!(%uuid, error = %e, "Failed to enqueue request");
        ApiError::Unavailable(e.to_string())
    })?;

    info!(%uuid, queries, "Request accepted");
    Ok((StatusCode::ACCEPTED, Json(IngestAccepted { uuid, queries })))
}

/// Liveness probe (GET /livez)
pub async fn livez(State(state): State<AppState>) -> StatusCode {
    StatusCode::from_u16(state.config.probes.liveness_status).unwrap_or(StatusCode::NO_CONTENT)
}

/// Readiness probe (GET /readyz)
///
/// 204 when the broker answers healthy within the readiness timeout,
/// 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> StatusCode {
    let timeout = state.config.probes.readiness_timeout();
    match tokio::time::timeout(timeout, state.broker.health()).await {
        Ok(true) => StatusCode::NO_CONTENT,
        Ok(false) => StatusCode::SERVICE_UNAVAILABLE,
        Err(_) => {
            warn!(?timeout, "Readiness check timed out");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

/// Counters in Prometheus text format (GET /metrics)
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.snapshot().render(),
    )
}
