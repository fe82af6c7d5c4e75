use crate::error::AppError;
use axum::{extract::FromRequestParts, http::request::Parts};

/// Primary credential header
pub const AUTH_HEADER: &str = "X-AUTH-TOKEN";

/// Deprecated alias accepted when the primary header is absent
pub const LEGACY_AUTH_HEADER: &str = "API-Key";

/// Account credential taken from the request headers
///
/// Presence only; whether the credential resolves to an account is checked
/// by the handler.
#[derive(Debug, Clone)]
pub struct Credential(pub String);

#[axum::async_trait]
impl<S> FromRequestParts<S> for Credential
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_credential(parts)
            .map(|key| Credential(key.to_string()))
            .ok_or(AppError::BadRequest("Invalid API key."))
    }
}

/// First non-empty value of `X-AUTH-TOKEN`, then `API-Key`
fn extract_credential(parts: &Parts) -> Option<&str> {
    [AUTH_HEADER, LEGACY_AUTH_HEADER].iter().find_map(|name| {
        parts
            .headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    })
}
