//! Reservation lease repository.
//!
//! Acquire is a single atomic `INSERT .. ON CONFLICT DO UPDATE .. WHERE
//! expired` statement; the row count decides the winner. Expiry is
//! evaluated lazily against the caller's `now` — no sweeper task exists.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::reservation::Reservation;
use crate::timeutil::{fmt_ts, parse_ts};
use crate::{AppError, Result};

use super::db::Database;

/// Repository for reservation records.
#[derive(Clone)]
pub struct ReservationRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct ReservationRow {
    project_id: String,
    resource_key: String,
    holder_agent_id: String,
    holder_alias: String,
    acquired_at: String,
    expires_at: String,
    metadata_json: String,
}

impl ReservationRow {
    fn into_reservation(self) -> Result<Reservation> {
        let metadata = serde_json::from_str(&self.metadata_json)
            .map_err(|e| AppError::Db(format!("invalid metadata json: {e}")))?;
        Ok(Reservation {
            project_id: self.project_id,
            resource_key: self.resource_key,
            holder_agent_id: self.holder_agent_id,
            holder_alias: self.holder_alias,
            acquired_at: parse_ts(&self.acquired_at)?,
            expires_at: parse_ts(&self.expires_at)?,
            metadata,
        })
    }
}

const COLUMNS: &str = "project_id, resource_key, holder_agent_id, holder_alias, \
                       acquired_at, expires_at, metadata_json";

impl ReservationRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Atomically insert the lease, or overwrite it if the existing row
    /// has expired. Returns whether the caller now holds the lease.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the statement or metadata encoding fails.
    pub async fn try_acquire(&self, lease: &Reservation) -> Result<bool> {
        let metadata_json = serde_json::to_string(&lease.metadata)
            .map_err(|e| AppError::Db(format!("metadata encode: {e}")))?;

        let result = sqlx::query(
            "INSERT INTO reservations (project_id, resource_key, holder_agent_id,
                                       holder_alias, acquired_at, expires_at, metadata_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (project_id, resource_key) DO UPDATE SET
                 holder_agent_id = excluded.holder_agent_id,
                 holder_alias    = excluded.holder_alias,
                 acquired_at     = excluded.acquired_at,
                 expires_at      = excluded.expires_at,
                 metadata_json   = excluded.metadata_json
             WHERE reservations.expires_at <= excluded.acquired_at",
        )
        .bind(&lease.project_id)
        .bind(&lease.resource_key)
        .bind(&lease.holder_agent_id)
        .bind(&lease.holder_alias)
        .bind(fmt_ts(lease.acquired_at))
        .bind(fmt_ts(lease.expires_at))
        .bind(&metadata_json)
        .execute(self.db.as_ref())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Fetch a lease row regardless of expiry.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn fetch(
        &self,
        project_id: &str,
        resource_key: &str,
    ) -> Result<Option<Reservation>> {
        let row: Option<ReservationRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM reservations
             WHERE project_id = ?1 AND resource_key = ?2"
        ))
        .bind(project_id)
        .bind(resource_key)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(ReservationRow::into_reservation).transpose()
    }

    /// Extend a live lease held by `holder_agent_id`.
    ///
    /// Returns whether the row was updated; `false` means the lease is
    /// absent, expired, or held by someone else.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn renew(
        &self,
        project_id: &str,
        resource_key: &str,
        holder_agent_id: &str,
        now: DateTime<Utc>,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE reservations SET expires_at = ?5
             WHERE project_id = ?1 AND resource_key = ?2
               AND holder_agent_id = ?3 AND expires_at > ?4",
        )
        .bind(project_id)
        .bind(resource_key)
        .bind(holder_agent_id)
        .bind(fmt_ts(now))
        .bind(fmt_ts(new_expires_at))
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a lease row the caller may release: either the caller holds
    /// it, or it has expired (anyone may clean up).
    ///
    /// Returns whether a row was deleted.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the delete fails.
    pub async fn release(
        &self,
        project_id: &str,
        resource_key: &str,
        holder_agent_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM reservations
             WHERE project_id = ?1 AND resource_key = ?2
               AND (holder_agent_id = ?3 OR expires_at <= ?4)",
        )
        .bind(project_id)
        .bind(resource_key)
        .bind(holder_agent_id)
        .bind(fmt_ts(now))
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Live leases of a project, optionally filtered by key prefix.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn list_live(
        &self,
        project_id: &str,
        prefix: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reservation>> {
        let rows: Vec<ReservationRow> = if let Some(prefix) = prefix {
            // LIKE with escaped wildcards so the prefix stays literal.
            let pattern = format!(
                "{}%",
                prefix.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
            );
            sqlx::query_as(&format!(
                "SELECT {COLUMNS} FROM reservations
                 WHERE project_id = ?1 AND expires_at > ?2
                   AND resource_key LIKE ?3 ESCAPE '\\'
                 ORDER BY resource_key ASC"
            ))
            .bind(project_id)
            .bind(fmt_ts(now))
            .bind(pattern)
            .fetch_all(self.db.as_ref())
            .await?
        } else {
            sqlx::query_as(&format!(
                "SELECT {COLUMNS} FROM reservations
                 WHERE project_id = ?1 AND expires_at > ?2
                 ORDER BY resource_key ASC"
            ))
            .bind(project_id)
            .bind(fmt_ts(now))
            .fetch_all(self.db.as_ref())
            .await?
        };
        rows.into_iter()
            .map(ReservationRow::into_reservation)
            .collect()
    }
}
