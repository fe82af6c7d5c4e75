//! Pagination cursor reader
//!
//! Streams a logically unbounded result set as bounded pages, walking the
//! `(created_at, id)` pair so rows sharing a timestamp are neither skipped
//! nor repeated at a page boundary.

use async_trait::async_trait;

use super::filter::{CompiledPredicate, SqlValue};
use crate::config::RetrievalConfig;
use crate::store::{Database, RequestRow, StoreError};

/// Position of the last row consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
    pub created_at: i64,
    pub id: i64,
}

impl From<&RequestRow> for Cursor {
    fn from(row: &RequestRow) -> Self {
        Self {
            created_at: row.created_at,
            id: row.id,
        }
    }
}

/// Anything that can serve ordered pages of request rows
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Up to `limit` rows strictly after `after`, ascending by `(created_at, id)`
    async fn fetch_page(&self, after: Option<Cursor>, limit: usize) -> Result<Vec<RequestRow>, StoreError>;
}

/// Page source backed by the store and a compiled filter predicate
pub struct StorePageSource {
    db: Database,
    predicate: CompiledPredicate,
}

impl StorePageSource {
    pub fn new(db: Database, predicate: CompiledPredicate) -> Self {
        Self { db, predicate }
    }
}

#[async_trait]
impl PageSource for StorePageSource {
    async fn fetch_page(&self, after: Option<Cursor>, limit: usize) -> Result<Vec<RequestRow>, StoreError> {
        let compiled = self.predicate.page(after, limit);

        let mut query = sqlx::query_as::<_, RequestRow>(&compiled.sql);
        for value in &compiled.params {
            query = match value {
                SqlValue::Text(text) => query.bind(text.as_str()),
                SqlValue::Integer(int) => query.bind(*int),
            };
        }

        Ok(query.fetch_all(self.db.pool()).await?)
    }
}

/// Rows gathered by one full read
#[derive(Debug, Default)]
pub struct ReadOutcome {
    pub rows: Vec<RequestRow>,
    /// Page queries issued
    pub pages: usize,
    /// More rows existed beyond `max_rows`
    pub truncated: bool,
}

/// Drives a `PageSource` page by page until a short page or the row cap
pub struct CursorReader<S> {
    source: S,
    page_size: usize,
    max_rows: usize,
}

impl<S: PageSource> CursorReader<S> {
    pub fn new(source: S, limits: RetrievalConfig) -> Self {
        Self {
            source,
            page_size: limits.page_size.max(1),
            max_rows: limits.max_rows.max(1),
        }
    }

    /// Read every page in order
    ///
    /// Each query asks for one row more than it keeps; that extra row only
    /// signals whether another page exists, so N rows take exactly ⌈N/P⌉
    /// queries. Stops early once `max_rows` rows are held.
    pub async fn read_all(&self) -> Result<ReadOutcome, StoreError> {
        let mut outcome = ReadOutcome::default();
        let mut cursor: Option<Cursor> = None;

        loop {
            let want = self.page_size.min(self.max_rows - outcome.rows.len());
            let mut page = self.source.fetch_page(cursor, want.saturating_add(1)).await?;
            outcome.pages += 1;

            let has_more = page.len() > want;
            page.truncate(want);

            if let Some(last) = page.last() {
                cursor = Some(Cursor::from(last));
            }
            outcome.rows.extend(page);

            if !has_more {
                break;
            }

            if outcome.rows.len() >= self.max_rows {
                outcome.truncated = true;
                tracing::warn!(
                    max_rows = self.max_rows,
                    "Export reached row cap, remaining rows omitted"
                );
                break;
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory rows already sorted by (created_at, id)
    struct VecSource {
        rows: Vec<RequestRow>,
        calls: AtomicUsize,
    }

    impl VecSource {
        fn new(timestamps: &[i64]) -> Self {
            let rows = timestamps
                .iter()
                .enumerate()
                .map(|(i, ts)| row(i as i64 + 1, *ts))
                .collect();
            Self {
                rows,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl PageSource for VecSource {
        async fn fetch_page(&self, after: Option<Cursor>, limit: usize) -> Result<Vec<RequestRow>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .rows
                .iter()
                .filter(|r| match after {
                    None => true,
                    Some(c) => (r.created_at, r.id) > (c.created_at, c.id),
                })
                .take(limit)
                .cloned()
                .collect())
        }
    }

    fn row(id: i64, created_at: i64) -> RequestRow {
        RequestRow {
            id,
            ip_address: None,
            path: format!("/r/{}", id),
            hostname: None,
            user_agent: None,
            method: 0,
            response_time: 1,
            status: 200,
            location: None,
            user_id: None,
            created_at,
        }
    }

    fn limits(page_size: usize, max_rows: usize) -> RetrievalConfig {
        RetrievalConfig { page_size, max_rows }
    }

    fn ids(rows: &[RequestRow]) -> Vec<i64> {
        rows.iter().map(|r| r.id).collect()
    }

    #[tokio::test]
    async fn test_pages_issued_is_ceiling_of_rows_over_page_size() {
        let timestamps: Vec<i64> = (1..=10).map(|t| t * 100).collect();
        for (page_size, expected_pages) in [(3, 4), (5, 2), (10, 1), (4, 3), (1, 10)] {
            let reader = CursorReader::new(VecSource::new(&timestamps), limits(page_size, 1_000));
            let outcome = reader.read_all().await.unwrap();

            assert_eq!(outcome.pages, expected_pages, "page size {}", page_size);
            assert_eq!(reader.source.calls.load(Ordering::SeqCst), expected_pages);
            assert_eq!(ids(&outcome.rows), (1..=10).collect::<Vec<_>>());
            assert!(!outcome.truncated);
        }
    }

    #[tokio::test]
    async fn test_paged_read_equals_single_query() {
        let timestamps: Vec<i64> = (1..=37).map(|t| t * 7).collect();
        let single = CursorReader::new(VecSource::new(&timestamps), limits(1_000, 1_000))
            .read_all()
            .await
            .unwrap();
        let paged = CursorReader::new(VecSource::new(&timestamps), limits(6, 1_000))
            .read_all()
            .await
            .unwrap();

        assert_eq!(single.pages, 1);
        assert_eq!(paged.pages, 7);
        assert_eq!(paged.rows, single.rows);
    }

    #[tokio::test]
    async fn test_timestamp_ties_across_page_boundary() {
        // Five rows share one timestamp and straddle the page boundary
        let timestamps = [100, 200, 200, 200, 200, 200, 300];
        let outcome = CursorReader::new(VecSource::new(&timestamps), limits(3, 1_000))
            .read_all()
            .await
            .unwrap();

        assert_eq!(ids(&outcome.rows), vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn test_row_cap_truncates() {
        let timestamps: Vec<i64> = (1..=10).collect();
        let outcome = CursorReader::new(VecSource::new(&timestamps), limits(3, 7))
            .read_all()
            .await
            .unwrap();

        assert_eq!(ids(&outcome.rows), (1..=7).collect::<Vec<_>>());
        assert!(outcome.truncated);
        assert_eq!(outcome.pages, 3);
    }

    #[tokio::test]
    async fn test_row_cap_exactly_met_is_not_truncated() {
        let timestamps: Vec<i64> = (1..=6).collect();
        let outcome = CursorReader::new(VecSource::new(&timestamps), limits(3, 6))
            .read_all()
            .await
            .unwrap();

        assert_eq!(outcome.rows.len(), 6);
        assert!(!outcome.truncated);
    }

    #[tokio::test]
    async fn test_unbounded_limits_read_everything() {
        let source = VecSource::new(&[100, 200, 200, 300]);
        let reader = CursorReader::new(source, limits(usize::MAX, usize::MAX));

        let outcome = reader.read_all().await.unwrap();
        assert_eq!(ids(&outcome.rows), vec![1, 2, 3, 4]);
        assert_eq!(outcome.pages, 1);
        assert!(!outcome.truncated);
    }

    #[tokio::test]
    async fn test_empty_source() {
        let outcome = CursorReader::new(VecSource::new(&[]), limits(3, 10))
            .read_all()
            .await
            .unwrap();

        assert!(outcome.rows.is_empty());
        assert_eq!(outcome.pages, 1);
    }

    #[tokio::test]
    async fn test_store_page_source_walks_ties() {
        let db = Database::in_memory().await.unwrap();
        let account = db.create_account().await.unwrap();
        let records: Vec<_> = [10, 20, 20, 20, 30]
            .iter()
            .map(|ts| crate::store::requests::sample_record(&account.api_key, *ts))
            .collect();
        db.insert_requests(&records).await.unwrap();

        let predicate = super::super::filter::RequestFilter::default().compile(&account.api_key);
        let reader = CursorReader::new(StorePageSource::new(db.clone(), predicate), limits(2, 100));
        let outcome = reader.read_all().await.unwrap();

        assert_eq!(outcome.pages, 3);
        let created: Vec<i64> = outcome.rows.iter().map(|r| r.created_at).collect();
        assert_eq!(created, vec![10, 20, 20, 20, 30]);
        let mut seen = ids(&outcome.rows);
        seen.dedup();
        assert_eq!(seen.len(), 5);
    }
}
