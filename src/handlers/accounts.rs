use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Response,
    Json,
};

use super::status_message;
use crate::error::AppError;
use crate::logging::RedactedKey;
use crate::server::AppState;

/// GET /generate-api-key
pub async fn generate_api_key(State(state): State<AppState>) -> Result<Json<String>, AppError> {
    let account = state.db.create_account().await.map_err(|e| {
        tracing::error!(error = %e, "API key generation failed");
        AppError::BadRequest("API key generation failed.")
    })?;

    tracing::info!(key = %RedactedKey(&account.api_key), "Account created");
    Ok(Json(account.api_key))
}

/// GET /user-id/:api_key
pub async fn get_user_id(
    State(state): State<AppState>,
    Path(api_key): Path<String>,
) -> Result<Json<String>, AppError> {
    let user_id = state
        .db
        .user_id_for_api_key(&api_key)
        .await
        .map_err(|e| {
            tracing::error!(key = %RedactedKey(&api_key), error = %e, "User id lookup failed");
            AppError::InvalidIdentifier("Invalid API key.")
        })?
        .ok_or(AppError::InvalidIdentifier("Invalid API key."))?;

    Ok(Json(user_id))
}

/// GET /delete/:api_key
///
/// Unknown credentials purge nothing and still succeed.
pub async fn delete_account(
    State(state): State<AppState>,
    Path(api_key): Path<String>,
) -> Result<Response, AppError> {
    let stats = state.db.purge_account(&api_key).await.map_err(|e| {
        tracing::error!(key = %RedactedKey(&api_key), error = %e, "Account purge failed");
        AppError::InvalidIdentifier("Invalid API key.")
    })?;

    tracing::info!(
        key = %RedactedKey(&api_key),
        requests = stats.requests_deleted,
        accounts = stats.accounts_deleted,
        monitors = stats.monitors_deleted,
        pings = stats.pings_deleted,
        "Account purged"
    );

    Ok(status_message(StatusCode::OK, "Account data deleted successfully."))
}
