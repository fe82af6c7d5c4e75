use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::BTreeMap;

use super::{Database, StoreError};

/// SQLite caps bound parameters per statement; five are bound per ping
const PINGS_PER_STATEMENT: usize = 1000;

/// One probe outcome headed for the store
#[derive(Debug, Clone, PartialEq)]
pub struct PingRecord {
    pub api_key: String,
    pub url: String,
    /// Elapsed milliseconds, 0 for a failed probe
    pub response_time: i64,
    /// HTTP status, 0 for a failed probe
    pub status: i64,
    pub created_at: i64,
}

/// Ping as returned to the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorPing {
    pub response_time: i64,
    pub status: i64,
    pub created_at: DateTime<Utc>,
}

pub(crate) fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(ms).unwrap_or_default()
}

impl Database {
    /// Bulk insert one probe cycle's outcomes in a single transaction
    pub async fn insert_pings(&self, pings: &[PingRecord]) -> Result<u64, StoreError> {
        if pings.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for chunk in pings.chunks(PINGS_PER_STATEMENT) {
            let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
                "INSERT INTO pings (api_key, url, response_time, status, created_at) ",
            );
            builder.push_values(chunk, |mut row, ping| {
                row.push_bind(&ping.api_key)
                    .push_bind(&ping.url)
                    .push_bind(ping.response_time)
                    .push_bind(ping.status)
                    .push_bind(ping.created_at);
            });

            inserted += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    /// Evict pings recorded before `cutoff` (Unix milliseconds)
    pub async fn delete_pings_before(&self, cutoff: i64) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM pings WHERE created_at < ?1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Ping history per registered URL, oldest first
    ///
    /// Every target of the owner appears as a key, even with no pings yet.
    pub async fn pings_for_user_id(
        &self,
        user_id: &str,
    ) -> Result<BTreeMap<String, Vec<MonitorPing>>, StoreError> {
        let mut history: BTreeMap<String, Vec<MonitorPing>> = self
            .monitors_for_user_id(user_id)
            .await?
            .into_iter()
            .map(|monitor| (monitor.url, Vec::new()))
            .collect();

        let rows: Vec<(String, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT p.url, p.response_time, p.status, p.created_at
            FROM pings p
            INNER JOIN accounts a ON a.api_key = p.api_key
            WHERE a.user_id = ?1
            ORDER BY p.created_at, p.rowid
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        for (url, response_time, status, created_at) in rows {
            if let Some(pings) = history.get_mut(&url) {
                pings.push(MonitorPing {
                    response_time,
                    status,
                    created_at: millis_to_datetime(created_at),
                });
            }
        }

        Ok(history)
    }

    pub async fn count_pings(&self, api_key: &str) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM pings WHERE api_key = ?1")
            .bind(api_key)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
