//! Mail message repository for `SQLite` persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::mail::{parse_priority, priority_str, MailMessage, SignatureFields};
use crate::timeutil::{fmt_ts, parse_ts};
use crate::{AppError, Result};

use super::db::Database;

/// Repository for mail message records.
#[derive(Clone)]
pub struct MailRepo {
    db: Arc<Database>,
}

/// Internal row struct for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct MailRow {
    message_id: String,
    project_id: String,
    from_agent_id: String,
    to_agent_id: String,
    from_alias: String,
    subject: String,
    body: String,
    priority: String,
    thread_id: Option<String>,
    from_did: Option<String>,
    to_did: Option<String>,
    signature: Option<String>,
    signing_key_id: Option<String>,
    created_at: String,
    read_at: Option<String>,
}

impl MailRow {
    fn into_message(self) -> Result<MailMessage> {
        let priority = parse_priority(&self.priority)
            .ok_or_else(|| AppError::Db(format!("invalid priority: {}", self.priority)))?;
        Ok(MailMessage {
            message_id: self.message_id,
            project_id: self.project_id,
            from_agent_id: self.from_agent_id,
            to_agent_id: self.to_agent_id,
            from_alias: self.from_alias,
            subject: self.subject,
            body: self.body,
            priority,
            thread_id: self.thread_id,
            signature: SignatureFields {
                from_did: self.from_did,
                to_did: self.to_did,
                signature: self.signature,
                signing_key_id: self.signing_key_id,
            },
            created_at: parse_ts(&self.created_at)?,
            read_at: self.read_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

const COLUMNS: &str = "message_id, project_id, from_agent_id, to_agent_id, from_alias, \
                       subject, body, priority, thread_id, from_did, to_did, signature, \
                       signing_key_id, created_at, read_at";

impl MailRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert a message row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert(&self, msg: &MailMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO messages (message_id, project_id, from_agent_id, to_agent_id,
                                   from_alias, subject, body, priority, thread_id,
                                   from_did, to_did, signature, signing_key_id,
                                   created_at, read_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, NULL)",
        )
        .bind(&msg.message_id)
        .bind(&msg.project_id)
        .bind(&msg.from_agent_id)
        .bind(&msg.to_agent_id)
        .bind(&msg.from_alias)
        .bind(&msg.subject)
        .bind(&msg.body)
        .bind(priority_str(msg.priority))
        .bind(&msg.thread_id)
        .bind(&msg.signature.from_did)
        .bind(&msg.signature.to_did)
        .bind(&msg.signature.signature)
        .bind(&msg.signature.signing_key_id)
        .bind(fmt_ts(msg.created_at))
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Fetch a message scoped to its recipient's project.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn fetch(&self, project_id: &str, message_id: &str) -> Result<Option<MailMessage>> {
        let row: Option<MailRow> = sqlx::query_as(&format!(
            "SELECT {COLUMNS} FROM messages WHERE project_id = ?1 AND message_id = ?2"
        ))
        .bind(project_id)
        .bind(message_id)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(MailRow::into_message).transpose()
    }

    /// Fetch a recipient's inbox, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn inbox(
        &self,
        project_id: &str,
        to_agent_id: &str,
        unread_only: bool,
        limit: u32,
    ) -> Result<Vec<MailMessage>> {
        let rows: Vec<MailRow> = if unread_only {
            sqlx::query_as(&format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE project_id = ?1 AND to_agent_id = ?2 AND read_at IS NULL
                 ORDER BY created_at DESC LIMIT ?3"
            ))
            .bind(project_id)
            .bind(to_agent_id)
            .bind(i64::from(limit))
            .fetch_all(self.db.as_ref())
            .await?
        } else {
            sqlx::query_as(&format!(
                "SELECT {COLUMNS} FROM messages
                 WHERE project_id = ?1 AND to_agent_id = ?2
                 ORDER BY created_at DESC LIMIT ?3"
            ))
            .bind(project_id)
            .bind(to_agent_id)
            .bind(i64::from(limit))
            .fetch_all(self.db.as_ref())
            .await?
        };
        rows.into_iter().map(MailRow::into_message).collect()
    }

    /// Set `read_at` iff the row belongs to the recipient and is unread.
    ///
    /// Returns whether the transition happened. The `read_at IS NULL`
    /// guard makes ack at-most-once.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the update fails.
    pub async fn mark_read(
        &self,
        project_id: &str,
        message_id: &str,
        to_agent_id: &str,
        read_at: DateTime<Utc>,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE messages SET read_at = ?4
             WHERE project_id = ?1 AND message_id = ?2 AND to_agent_id = ?3
               AND read_at IS NULL",
        )
        .bind(project_id)
        .bind(message_id)
        .bind(to_agent_id)
        .bind(fmt_ts(read_at))
        .execute(self.db.as_ref())
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
