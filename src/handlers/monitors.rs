use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::status_message;
use crate::error::AppError;
use crate::logging::RedactedKey;
use crate::server::AppState;
use crate::store::pings::millis_to_datetime;
use crate::store::{MonitorPing, MonitorTarget, NewMonitor};

#[derive(Debug, Deserialize)]
pub struct AddMonitorBody {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub secure: bool,
    #[serde(default)]
    pub ping: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeleteMonitorBody {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub url: String,
}

/// Monitor as listed to its owner
#[derive(Debug, Serialize)]
pub struct MonitorView {
    pub url: String,
    pub secure: bool,
    pub ping: bool,
    pub created_at: DateTime<Utc>,
}

impl From<MonitorTarget> for MonitorView {
    fn from(target: MonitorTarget) -> Self {
        Self {
            url: target.url,
            secure: target.secure,
            ping: target.ping,
            created_at: millis_to_datetime(target.created_at),
        }
    }
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(body)| body).map_err(|e| {
        tracing::debug!(error = %e, "Rejected monitor request body");
        AppError::BadRequest("Invalid request body.")
    })
}

async fn resolve_owner(state: &AppState, user_id: &str, message: &'static str) -> Result<String, AppError> {
    if user_id.is_empty() {
        return Err(AppError::BadRequest("User ID required."));
    }

    state
        .db
        .api_key_for_user_id(user_id)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "User id lookup failed");
            AppError::InvalidIdentifier(message)
        })?
        .ok_or(AppError::InvalidIdentifier(message))
}

/// POST /monitor/add
pub async fn add_monitor(
    State(state): State<AppState>,
    payload: Result<Json<AddMonitorBody>, JsonRejection>,
) -> Result<Response, AppError> {
    let body = body(payload)?;
    let api_key = resolve_owner(&state, &body.user_id, "Invalid data.").await?;

    let monitor = NewMonitor {
        url: body.url,
        secure: body.secure,
        ping: body.ping,
    };
    state
        .db
        .add_monitor(&api_key, &monitor, state.config.monitor.max_targets)
        .await
        .inspect_err(|e| tracing::info!(key = %RedactedKey(&api_key), error = %e, "Monitor rejected"))?;

    tracing::info!(key = %RedactedKey(&api_key), url = %monitor.url, "Monitor created");
    Ok(status_message(StatusCode::CREATED, "New monitor created successfully."))
}

/// POST /monitor/delete
pub async fn delete_monitor(
    State(state): State<AppState>,
    payload: Result<Json<DeleteMonitorBody>, JsonRejection>,
) -> Result<Response, AppError> {
    let body = body(payload)?;
    let api_key = resolve_owner(&state, &body.user_id, "Invalid data.").await?;

    let removed = state.db.delete_monitor(&api_key, &body.url).await.map_err(|e| {
        tracing::error!(key = %RedactedKey(&api_key), error = %e, "Monitor deletion failed");
        AppError::Store(e)
    })?;

    tracing::info!(key = %RedactedKey(&api_key), url = %body.url, removed = removed, "Monitor deleted");
    Ok(status_message(StatusCode::CREATED, "Monitor deleted successfully."))
}

/// GET /monitors/:user_id
pub async fn list_monitors(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<MonitorView>>, AppError> {
    resolve_owner(&state, &user_id, "Invalid user ID.").await?;

    let monitors = state.db.monitors_for_user_id(&user_id).await.map_err(|e| {
        tracing::error!(user_id = %user_id, error = %e, "Monitor listing failed");
        AppError::InvalidIdentifier("Invalid user ID.")
    })?;

    Ok(Json(monitors.into_iter().map(MonitorView::from).collect()))
}

/// GET /monitor/pings/:user_id
///
/// Ping history keyed by URL, oldest first. Marks the account accessed.
pub async fn get_pings(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<BTreeMap<String, Vec<MonitorPing>>>, AppError> {
    resolve_owner(&state, &user_id, "Invalid user ID.").await?;

    let pings = state.db.pings_for_user_id(&user_id).await.map_err(|e| {
        tracing::error!(user_id = %user_id, error = %e, "Ping lookup failed");
        AppError::InvalidIdentifier("Invalid user ID.")
    })?;

    if let Err(e) = state.db.touch_last_accessed_by_user_id(&user_id).await {
        tracing::warn!(user_id = %user_id, error = %e, "Failed to update last access time");
    }

    Ok(Json(pings))
}
