//! HTTP handlers
//!
//! Every failure is an `AppError`, rendered as `{"status", "message"}`.

pub mod accounts;
pub mod data;
pub mod health;
pub mod ingest;
pub mod monitors;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::retrieval::BodyEncoding;

/// Pre-encoded JSON body; gzip bodies carry `Content-Encoding: gzip`
pub(crate) fn encoded_json(body: Vec<u8>, encoding: BodyEncoding) -> Response {
    match encoding {
        BodyEncoding::Gzip => (
            [
                (header::CONTENT_TYPE, "application/json"),
                (header::CONTENT_ENCODING, "gzip"),
            ],
            body,
        )
            .into_response(),
        BodyEncoding::Identity => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
    }
}

/// `{"status", "message"}` body for success responses
pub(crate) fn status_message(status: StatusCode, message: &'static str) -> Response {
    (
        status,
        Json(json!({
            "status": status.as_u16(),
            "message": message,
        })),
    )
        .into_response()
}
