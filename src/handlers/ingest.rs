use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Response,
    Json,
};

use super::status_message;
use crate::error::AppError;
use crate::ingest::{PayloadError, RequestPayload};
use crate::logging::RedactedKey;
use crate::server::AppState;
use crate::store::now_millis;

/// POST /log-request
///
/// Responds as soon as the batch is queued. A full queue drops the batch
/// and the caller still gets 201.
pub async fn log_requests(
    State(state): State<AppState>,
    payload: Result<Json<RequestPayload>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(payload) = payload.map_err(|e| {
        tracing::debug!(error = %e, "Rejected ingestion body");
        AppError::BadRequest("Invalid request body.")
    })?;

    let api_key = payload.api_key.clone();
    let records = payload.into_records(now_millis()).map_err(|e| match e {
        PayloadError::MissingApiKey => AppError::BadRequest("Invalid API key."),
        PayloadError::UnknownFramework => AppError::BadRequest("Invalid framework."),
    })?;

    let count = records.len();
    let queued = state.ingest.submit(records);
    tracing::debug!(key = %RedactedKey(&api_key), records = count, queued = queued, "Requests received");

    Ok(status_message(StatusCode::CREATED, "API requests logged successfully."))
}
