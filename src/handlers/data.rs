use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::{header, HeaderMap},
    response::Response,
};

use super::encoded_json;
use crate::auth::Credential;
use crate::error::AppError;
use crate::logging::RedactedKey;
use crate::retrieval::{self, BodyEncoding, DataQuery, ExportFormat, RequestFilter};
use crate::server::AppState;

type RawQuery = Result<Query<Vec<(String, String)>>, QueryRejection>;

/// Undecodable query strings are treated as empty
fn data_query(raw: RawQuery) -> DataQuery {
    match raw {
        Ok(Query(pairs)) => DataQuery::from_pairs(pairs),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring undecodable query string");
            DataQuery::default()
        }
    }
}

/// Gzip when any `Accept-Encoding` value lists gzip (or `*`) with a non-zero weight
fn negotiate_encoding(headers: &HeaderMap) -> BodyEncoding {
    let accepts_gzip = headers
        .get_all(header::ACCEPT_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|entry| {
            let mut parts = entry.split(';').map(str::trim);
            let coding = parts.next().unwrap_or_default();
            let weight = parts
                .find_map(|p| p.strip_prefix("q="))
                .and_then(|q| q.parse::<f32>().ok())
                .unwrap_or(1.0);
            let named = coding.eq_ignore_ascii_case("gzip")
                || coding.eq_ignore_ascii_case("x-gzip")
                || coding == "*";
            named && weight > 0.0
        });

    if accepts_gzip {
        BodyEncoding::Gzip
    } else {
        BodyEncoding::Identity
    }
}

/// GET /data
///
/// Filtered export for the credential in `X-AUTH-TOKEN`. Unusable filters
/// are ignored. Gzip only when the client accepts it.
pub async fn get_data(
    State(state): State<AppState>,
    Credential(api_key): Credential,
    headers: HeaderMap,
    query: RawQuery,
) -> Result<Response, AppError> {
    let known = state.db.account_exists(&api_key).await.map_err(|e| {
        tracing::error!(key = %RedactedKey(&api_key), error = %e, "Credential lookup failed");
        AppError::InvalidIdentifier("Invalid API key.")
    })?;
    if !known {
        return Err(AppError::InvalidIdentifier("Invalid API key."));
    }

    let query = data_query(query);
    let filter = RequestFilter::from_query(&query);
    let format = ExportFormat::from_compact_flag(query.compact());
    let encoding = negotiate_encoding(&headers);

    let export = retrieval::export_requests(&state.db, &api_key, &filter, format, encoding, state.config.retrieval)
        .await
        .inspect_err(|e| tracing::error!(key = %RedactedKey(&api_key), error = %e, "Data export failed"))?;

    tracing::info!(key = %RedactedKey(&api_key), rows = export.rows, truncated = export.truncated, "Data exported");
    Ok(encoded_json(export.body, export.encoding))
}

/// GET /requests/:user_id
///
/// Unfiltered gzip export for the dashboard; verbose unless `?compact=true`.
pub async fn get_user_requests(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    query: RawQuery,
) -> Result<Response, AppError> {
    let api_key = state
        .db
        .api_key_for_user_id(&user_id)
        .await
        .map_err(|e| {
            tracing::error!(user_id = %user_id, error = %e, "User id lookup failed");
            AppError::InvalidIdentifier("Invalid user ID.")
        })?
        .ok_or(AppError::InvalidIdentifier("Invalid user ID."))?;

    let format = ExportFormat::from_compact_flag(data_query(query).compact());
    let export = retrieval::export_requests(
        &state.db,
        &api_key,
        &RequestFilter::default(),
        format,
        BodyEncoding::Gzip,
        state.config.retrieval,
    )
    .await
    .inspect_err(|e| tracing::error!(user_id = %user_id, error = %e, "Request export failed"))?;

    tracing::info!(user_id = %user_id, rows = export.rows, pages = export.pages, "Requests exported");
    Ok(encoded_json(export.body, export.encoding))
}
