use serde::Serialize;
use uuid::Uuid;

use super::{now_millis, Database, StoreError};

/// Freshly issued account handles
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub api_key: String,
    pub user_id: String,
}

impl Database {
    /// Issue a new account with generated credential and owner id
    pub async fn create_account(&self) -> Result<Account, StoreError> {
        let account = Account {
            api_key: Uuid::new_v4().to_string(),
            user_id: Uuid::new_v4().to_string(),
        };
        let now = now_millis();

        sqlx::query(
            "INSERT INTO accounts (api_key, user_id, created_at, last_accessed) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&account.api_key)
        .bind(&account.user_id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(account)
    }

    /// Owner id for a credential, `None` when the credential is unknown
    pub async fn user_id_for_api_key(&self, api_key: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT user_id FROM accounts WHERE api_key = ?1")
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(user_id,)| user_id))
    }

    /// Credential for an owner id, `None` when the owner id is unknown
    pub async fn api_key_for_user_id(&self, user_id: &str) -> Result<Option<String>, StoreError> {
        let row: Option<(String,)> = sqlx::query_as("SELECT api_key FROM accounts WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(api_key,)| api_key))
    }

    pub async fn account_exists(&self, api_key: &str) -> Result<bool, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM accounts WHERE api_key = ?1")
            .bind(api_key)
            .fetch_one(&self.pool)
            .await?;

        Ok(count > 0)
    }

    pub async fn touch_last_accessed(&self, api_key: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE accounts SET last_accessed = ?1 WHERE api_key = ?2")
            .bind(now_millis())
            .bind(api_key)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn touch_last_accessed_by_user_id(&self, user_id: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE accounts SET last_accessed = ?1 WHERE user_id = ?2")
            .bind(now_millis())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Last access time in Unix milliseconds
    pub async fn last_accessed(&self, api_key: &str) -> Result<Option<i64>, StoreError> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT last_accessed FROM accounts WHERE api_key = ?1")
            .bind(api_key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(ts,)| ts))
    }
}
