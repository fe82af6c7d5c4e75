use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

use crate::retrieval::{ExportError, RetrievalError};
use crate::store::{MonitorError, StoreError};

/// HTTP-facing error taxonomy
///
/// Validation, lookup and store failures all surface as 400 with a fixed
/// message, so callers cannot tell an unknown identifier from a malformed one.
/// Internal detail is logged where the error is raised, never returned.
#[derive(Debug)]
pub enum AppError {
    /// Missing or malformed input (credential, owner id, body)
    BadRequest(&'static str),
    /// Credential or owner id does not resolve to an account
    InvalidIdentifier(&'static str),
    /// Store query or connection failure
    Store(StoreError),
    /// Monitor target already registered for this account
    Conflict(&'static str),
    /// Serialization or compression failure
    Export(ExportError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            Self::InvalidIdentifier(msg) => write!(f, "Invalid identifier: {}", msg),
            Self::Store(err) => write!(f, "Store error: {}", err),
            Self::Conflict(msg) => write!(f, "Conflict: {}", msg),
            Self::Export(err) => write!(f, "Export error: {}", err),
        }
    }
}

impl std::error::Error for AppError {}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) | Self::InvalidIdentifier(_) | Self::Store(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Export(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::BadRequest(msg) | Self::InvalidIdentifier(msg) | Self::Conflict(msg) => msg,
            Self::Store(_) => "Invalid data.",
            Self::Export(_) => "Compression failed.",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(json!({
            "status": status.as_u16(),
            "message": self.public_message(),
        }));

        (status, body).into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Store(err)
    }
}

impl From<ExportError> for AppError {
    fn from(err: ExportError) -> Self {
        Self::Export(err)
    }
}

impl From<RetrievalError> for AppError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::Store(e) => Self::Store(e),
            RetrievalError::Export(e) => Self::Export(e),
        }
    }
}

impl From<MonitorError> for AppError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::AlreadyExists => Self::Conflict("Monitor already exists."),
            MonitorError::LimitReached => Self::BadRequest("Monitor limit reached."),
            MonitorError::InvalidUrl => Self::BadRequest("Invalid monitor URL."),
            MonitorError::Store(e) => Self::Store(e),
        }
    }
}
