use crate::error::ServerResult;
use crate::middleware::RequestId;
use crate::state::ServerState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use invoice_pipeline::StageOutcome;
use std::sync::Arc;

/// `POST /v1/classify`, subscribed to the converted topic.
pub async fn classify(
    State(state): State<Arc<ServerState>>,
    request_id: Option<Extension<RequestId>>,
    body: Bytes,
) -> ServerResult<StatusCode> {
    let outcome = state.classify.handle(&body).await?;
    Ok(acknowledge("classify", request_id, &outcome))
}

/// `POST /v1/extract`, subscribed to the classified topic.
pub async fn extract(
    State(state): State<Arc<ServerState>>,
    request_id: Option<Extension<RequestId>>,
    body: Bytes,
) -> ServerResult<StatusCode> {
    let outcome = state.extract.handle(&body).await?;
    Ok(acknowledge("extract", request_id, &outcome))
}

/// Both outcomes are final for this delivery, so both acknowledge.
fn acknowledge(
    stage: &'static str,
    request_id: Option<Extension<RequestId>>,
    outcome: &StageOutcome,
) -> StatusCode {
    let request_id = request_id.map(|Extension(id)| id.0).unwrap_or_default();
    match outcome {
        StageOutcome::Published { topic, message_id } => tracing::debug!(
            stage,
            request_id = %request_id,
            topic = %topic,
            message_id = %message_id,
            "Push message acknowledged"
        ),
        StageOutcome::RoutedToFailure { .. } => tracing::debug!(
            stage,
            request_id = %request_id,
            "Push message acknowledged after failure routing"
        ),
    }
    StatusCode::NO_CONTENT
}
