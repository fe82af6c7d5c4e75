use serde::Serialize;

use super::{now_millis, Database, StoreError};

/// Registered uptime target
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct MonitorTarget {
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Host and path without scheme, e.g. "example.com/health"
    pub url: String,
    /// Probe over https when set
    pub secure: bool,
    /// Probe with HEAD when set, GET otherwise
    pub ping: bool,
    pub created_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewMonitor {
    pub url: String,
    pub secure: bool,
    pub ping: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("monitor already exists")]
    AlreadyExists,

    #[error("monitor limit reached")]
    LimitReached,

    #[error("monitor url is not a valid host")]
    InvalidUrl,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for MonitorError {
    fn from(err: sqlx::Error) -> Self {
        let duplicate = err
            .as_database_error()
            .is_some_and(|db_err| db_err.is_unique_violation());

        if duplicate {
            Self::AlreadyExists
        } else {
            Self::Store(StoreError::Query(err))
        }
    }
}

/// Accept "host[:port][/path]" with no scheme; the scheme comes from the secure flag
fn valid_target_url(target: &str) -> bool {
    if target.is_empty() || target.contains("://") || target.chars().any(char::is_whitespace) {
        return false;
    }

    url::Url::parse(&format!("https://{}", target))
        .map(|parsed| parsed.host_str().is_some_and(|h| !h.is_empty()))
        .unwrap_or(false)
}

impl Database {
    /// Register a target, enforcing pair uniqueness and the per-account cap
    ///
    /// A duplicate is reported before the cap so re-submitting an existing
    /// target at the limit still yields `AlreadyExists`.
    pub async fn add_monitor(
        &self,
        api_key: &str,
        monitor: &NewMonitor,
        max_targets: i64,
    ) -> Result<(), MonitorError> {
        if !valid_target_url(&monitor.url) {
            return Err(MonitorError::InvalidUrl);
        }

        let (existing,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM monitors WHERE api_key = ?1 AND url = ?2")
                .bind(api_key)
                .bind(&monitor.url)
                .fetch_one(&self.pool)
                .await?;

        if existing > 0 {
            return Err(MonitorError::AlreadyExists);
        }

        // Cap check and insert in one statement so concurrent adds cannot overshoot
        let result = sqlx::query(
            r#"
            INSERT INTO monitors (api_key, url, secure, ping, created_at)
            SELECT ?1, ?2, ?3, ?4, ?5
            WHERE (SELECT COUNT(*) FROM monitors WHERE api_key = ?1) < ?6
            "#,
        )
        .bind(api_key)
        .bind(&monitor.url)
        .bind(monitor.secure)
        .bind(monitor.ping)
        .bind(now_millis())
        .bind(max_targets)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MonitorError::LimitReached);
        }

        Ok(())
    }

    /// Remove a target and its ping history atomically
    pub async fn delete_monitor(&self, api_key: &str, url: &str) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM monitors WHERE api_key = ?1 AND url = ?2")
            .bind(api_key)
            .bind(url)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        sqlx::query("DELETE FROM pings WHERE api_key = ?1 AND url = ?2")
            .bind(api_key)
            .bind(url)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(removed > 0)
    }

    pub async fn monitors_for_user_id(&self, user_id: &str) -> Result<Vec<MonitorTarget>, StoreError> {
        let monitors = sqlx::query_as::<_, MonitorTarget>(
            r#"
            SELECT m.api_key, m.url, m.secure, m.ping, m.created_at
            FROM monitors m
            INNER JOIN accounts a ON a.api_key = m.api_key
            WHERE a.user_id = ?1
            ORDER BY m.created_at, m.url
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(monitors)
    }

    /// Every registered target across all accounts
    pub async fn all_monitors(&self) -> Result<Vec<MonitorTarget>, StoreError> {
        let monitors = sqlx::query_as::<_, MonitorTarget>(
            "SELECT api_key, url, secure, ping, created_at FROM monitors ORDER BY api_key, created_at, url",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(monitors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(url: &str) -> NewMonitor {
        NewMonitor {
            url: url.to_string(),
            secure: true,
            ping: false,
        }
    }

    #[test]
    fn test_valid_target_url() {
        assert!(valid_target_url("example.com"));
        assert!(valid_target_url("example.com:8443/health"));
        assert!(!valid_target_url(""));
        assert!(!valid_target_url("https://example.com"));
        assert!(!valid_target_url("exa mple.com"));
    }

    #[tokio::test]
    async fn test_add_monitor_rejects_duplicate() {
        let db = Database::in_memory().await.unwrap();
        let account = db.create_account().await.unwrap();

        db.add_monitor(&account.api_key, &monitor("example.com"), 3).await.unwrap();
        let result = db.add_monitor(&account.api_key, &monitor("example.com"), 3).await;

        assert!(matches!(result, Err(MonitorError::AlreadyExists)));
    }

    #[tokio::test]
    async fn test_add_monitor_enforces_cap() {
        let db = Database::in_memory().await.unwrap();
        let account = db.create_account().await.unwrap();

        for url in ["a.example.com", "b.example.com", "c.example.com"] {
            db.add_monitor(&account.api_key, &monitor(url), 3).await.unwrap();
        }

        let result = db.add_monitor(&account.api_key, &monitor("d.example.com"), 3).await;
        assert!(matches!(result, Err(MonitorError::LimitReached)));

        // Duplicate at the cap still reports the duplicate
        let result = db.add_monitor(&account.api_key, &monitor("a.example.com"), 3).await;
        assert!(matches!(result, Err(MonitorError::AlreadyExists)));

        let monitors = db.monitors_for_user_id(&account.user_id).await.unwrap();
        assert_eq!(monitors.len(), 3);
    }

    #[tokio::test]
    async fn test_cap_is_per_account() {
        let db = Database::in_memory().await.unwrap();
        let first = db.create_account().await.unwrap();
        let second = db.create_account().await.unwrap();

        for url in ["a.example.com", "b.example.com", "c.example.com"] {
            db.add_monitor(&first.api_key, &monitor(url), 3).await.unwrap();
        }

        db.add_monitor(&second.api_key, &monitor("a.example.com"), 3).await.unwrap();
        assert_eq!(db.all_monitors().await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_delete_monitor_removes_pings() {
        let db = Database::in_memory().await.unwrap();
        let account = db.create_account().await.unwrap();
        db.add_monitor(&account.api_key, &monitor("example.com"), 3).await.unwrap();

        db.insert_pings(&[crate::store::PingRecord {
            api_key: account.api_key.clone(),
            url: "example.com".to_string(),
            response_time: 42,
            status: 200,
            created_at: now_millis(),
        }])
        .await
        .unwrap();

        assert!(db.delete_monitor(&account.api_key, "example.com").await.unwrap());
        assert!(db.monitors_for_user_id(&account.user_id).await.unwrap().is_empty());
        assert_eq!(db.count_pings(&account.api_key).await.unwrap(), 0);
    }
}
