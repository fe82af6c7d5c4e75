//! Retrieval path: filter compiler, pagination cursor reader and export encoder

pub mod cursor;
pub mod export;
pub mod filter;

pub use cursor::{Cursor, CursorReader, PageSource, ReadOutcome, StorePageSource};
pub use export::{BodyEncoding, ExportError, ExportFormat, RequestView};
pub use filter::{DataQuery, RequestFilter};

use crate::config::RetrievalConfig;
use crate::logging::RedactedKey;
use crate::store::{Database, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Encoded export ready to send
#[derive(Debug)]
pub struct Export {
    pub body: Vec<u8>,
    pub encoding: BodyEncoding,
    pub rows: usize,
    pub pages: usize,
    pub truncated: bool,
}

/// Read every matching row for `api_key` and encode it
///
/// `last_accessed` is only touched once the body is fully built; a failed
/// or cancelled export leaves it unchanged.
pub async fn export_requests(
    db: &Database,
    api_key: &str,
    filter: &RequestFilter,
    format: ExportFormat,
    encoding: BodyEncoding,
    limits: RetrievalConfig,
) -> Result<Export, RetrievalError> {
    let source = StorePageSource::new(db.clone(), filter.compile(api_key));
    let outcome = CursorReader::new(source, limits).read_all().await?;

    let rows = outcome.rows.len();
    let views: Vec<RequestView> = outcome.rows.into_iter().map(RequestView::from).collect();
    let body = export::encode(&views, format, encoding)?;

    if let Err(e) = db.touch_last_accessed(api_key).await {
        tracing::warn!(key = %RedactedKey(api_key), error = %e, "Failed to update last access time");
    }

    tracing::debug!(
        key = %RedactedKey(api_key),
        rows = rows,
        pages = outcome.pages,
        bytes = body.len(),
        "Export built"
    );

    Ok(Export {
        body,
        encoding,
        rows,
        pages: outcome.pages,
        truncated: outcome.truncated,
    })
}
