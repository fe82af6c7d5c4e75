use serde::Serialize;

use super::{Database, StoreError};

/// Rows removed per table by an account purge
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeStats {
    pub requests_deleted: u64,
    pub accounts_deleted: u64,
    pub monitors_deleted: u64,
    pub pings_deleted: u64,
}

impl Database {
    /// Delete everything stored for a credential: requests, the account,
    /// monitors, then pings, all or nothing.
    ///
    /// Foreign keys from requests and monitors are deferred to commit, so
    /// removing the account before its monitors is legal inside the transaction.
    pub async fn purge_account(&self, api_key: &str) -> Result<PurgeStats, StoreError> {
        let mut tx = self.pool.begin().await?;

        let requests_deleted = sqlx::query("DELETE FROM requests WHERE api_key = ?1")
            .bind(api_key)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let accounts_deleted = sqlx::query("DELETE FROM accounts WHERE api_key = ?1")
            .bind(api_key)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let monitors_deleted = sqlx::query("DELETE FROM monitors WHERE api_key = ?1")
            .bind(api_key)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let pings_deleted = sqlx::query("DELETE FROM pings WHERE api_key = ?1")
            .bind(api_key)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;

        Ok(PurgeStats {
            requests_deleted,
            accounts_deleted,
            monitors_deleted,
            pings_deleted,
        })
    }
}
