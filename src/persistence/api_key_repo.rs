//! API key repository for `SQLite` persistence.
//!
//! Lookup is by full-key digest only. No prefix index exists, so a failed
//! authentication reveals nothing about partially-known keys.

use std::sync::Arc;

use crate::models::api_key::ApiKey;
use crate::timeutil::{fmt_ts, now_ts, parse_ts};
use crate::Result;

use super::db::Database;

/// Repository for API key records.
#[derive(Clone)]
pub struct ApiKeyRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct ApiKeyRow {
    api_key_id: String,
    project_id: String,
    agent_id: Option<String>,
    key_hash: String,
    is_active: i64,
    created_at: String,
    last_used_at: Option<String>,
}

impl ApiKeyRow {
    fn into_key(self) -> Result<ApiKey> {
        Ok(ApiKey {
            api_key_id: self.api_key_id,
            project_id: self.project_id,
            agent_id: self.agent_id,
            key_hash: self.key_hash,
            is_active: self.is_active != 0,
            created_at: parse_ts(&self.created_at)?,
            last_used_at: self.last_used_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

const COLUMNS: &str =
    "api_key_id, project_id, agent_id, key_hash, is_active, created_at, last_used_at";

impl ApiKeyRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a key row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails, including when the
    /// agent already has an active key (unique index violation).
    pub async fn insert(&self, key: &ApiKey) -> Result<()> {
        sqlx::query(
            "INSERT INTO api_keys (api_key_id, project_id, agent_id, key_hash,
                                   is_active, created_at, last_used_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL)",
        )
        .bind(&key.api_key_id)
        .bind(&key.project_id)
        .bind(&key.agent_id)
        .bind(&key.key_hash)
        .bind(i64::from(key.is_active))
        .bind(fmt_ts(key.created_at))
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Look up an active key by full-key digest.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn fetch_active_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>> {
        let row: Option<ApiKeyRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM api_keys WHERE key_hash = ?1 AND is_active = 1"
        ))
        .bind(key_hash)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(ApiKeyRow::into_key).transpose()
    }

    /// Stamp a key's `last_used_at`. Best-effort bookkeeping; callers
    /// ignore a zero row count.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn touch(&self, api_key_id: &str) -> Result<()> {
        sqlx::query("UPDATE api_keys SET last_used_at = ?2 WHERE api_key_id = ?1")
            .bind(api_key_id)
            .bind(now_ts())
            .execute(self.db.as_ref())
            .await?;
        Ok(())
    }

    /// Deactivate every active key bound to an agent.
    ///
    /// Returns the number of keys deactivated.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn deactivate_for_agent(&self, project_id: &str, agent_id: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE api_keys SET is_active = 0
             WHERE project_id = ?1 AND agent_id = ?2 AND is_active = 1",
        )
        .bind(project_id)
        .bind(agent_id)
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected())
    }
}
