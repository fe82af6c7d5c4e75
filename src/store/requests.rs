use super::{Database, StoreError};

/// One request telemetry record headed for the store
#[derive(Debug, Clone, PartialEq)]
pub struct RequestRecord {
    pub api_key: String,
    pub path: String,
    pub hostname: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub method: i16,
    pub status: i16,
    pub response_time: i16,
    pub framework: i16,
    pub location: Option<String>,
    pub user_id: Option<String>,
    /// Unix milliseconds
    pub created_at: i64,
}

/// Stored request as read back by the export path
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct RequestRow {
    pub id: i64,
    pub ip_address: Option<String>,
    pub path: String,
    pub hostname: Option<String>,
    pub user_agent: Option<String>,
    pub method: i16,
    pub response_time: i16,
    pub status: i16,
    pub location: Option<String>,
    pub user_id: Option<String>,
    /// Unix milliseconds
    pub created_at: i64,
}

impl Database {
    /// Insert records in one transaction, skipping any whose credential has no account
    ///
    /// Returns the number of rows written.
    pub async fn insert_requests(&self, records: &[RequestRecord]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;

        for record in records {
            let result = sqlx::query(
                r#"
                INSERT INTO requests (
                    api_key, path, hostname, ip_address, user_agent,
                    method, status, response_time, framework, location, user_id, created_at
                )
                SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12
                WHERE EXISTS (SELECT 1 FROM accounts WHERE api_key = ?1)
                "#,
            )
            .bind(&record.api_key)
            .bind(&record.path)
            .bind(&record.hostname)
            .bind(&record.ip_address)
            .bind(&record.user_agent)
            .bind(record.method)
            .bind(record.status)
            .bind(record.response_time)
            .bind(record.framework)
            .bind(&record.location)
            .bind(&record.user_id)
            .bind(record.created_at)
            .execute(&mut *tx)
            .await?;

            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    pub async fn count_requests(&self, api_key: &str) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM requests WHERE api_key = ?1")
            .bind(api_key)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
pub(crate) fn sample_record(api_key: &str, created_at: i64) -> RequestRecord {
    RequestRecord {
        api_key: api_key.to_string(),
        path: "/v1/users".to_string(),
        hostname: Some("api.example.com".to_string()),
        ip_address: Some("203.0.113.7".to_string()),
        user_agent: Some("curl/8.0".to_string()),
        method: 0,
        status: 200,
        response_time: 12,
        framework: 10,
        location: Some("GB".to_string()),
        user_id: None,
        created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_requests_for_known_account() {
        let db = Database::in_memory().await.unwrap();
        let account = db.create_account().await.unwrap();

        let records = vec![
            sample_record(&account.api_key, 1_000),
            sample_record(&account.api_key, 2_000),
        ];

        let inserted = db.insert_requests(&records).await.unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(db.count_requests(&account.api_key).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_requests_skips_unknown_credential() {
        let db = Database::in_memory().await.unwrap();
        let account = db.create_account().await.unwrap();

        let records = vec![
            sample_record(&account.api_key, 1_000),
            sample_record("not-a-key", 2_000),
        ];

        let inserted = db.insert_requests(&records).await.unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(db.count_requests("not-a-key").await.unwrap(), 0);
    }
}
