//! Chat session, message, and read receipt repository.
//!
//! Messages within a session are totally ordered by
//! `(created_at, message_id)`; every ordering-sensitive query compares on
//! that pair, never on the timestamp alone.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::models::chat::{ChatMessage, ChatParticipant, ChatSession, ReadReceipt};
use crate::models::mail::SignatureFields;
use crate::timeutil::{fmt_ts, parse_ts};
use crate::Result;

use super::db::Database;

/// Repository for chat records.
#[derive(Clone)]
pub struct ChatRepo {
    db: Arc<Database>,
}

/// Internal session row for `SQLite` deserialization.
#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: String,
    project_id: String,
    participant_hash: String,
    created_at: String,
}

impl SessionRow {
    fn into_session(self) -> Result<ChatSession> {
        Ok(ChatSession {
            session_id: self.session_id,
            project_id: self.project_id,
            participant_hash: self.participant_hash,
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

/// Internal participant row.
#[derive(sqlx::FromRow)]
struct ParticipantRow {
    session_id: String,
    agent_id: String,
    alias: String,
    joined_at: String,
}

impl ParticipantRow {
    fn into_participant(self) -> Result<ChatParticipant> {
        Ok(ChatParticipant {
            session_id: self.session_id,
            agent_id: self.agent_id,
            alias: self.alias,
            joined_at: parse_ts(&self.joined_at)?,
        })
    }
}

/// Internal message row.
#[derive(sqlx::FromRow)]
struct MessageRow {
    message_id: String,
    session_id: String,
    from_agent_id: String,
    from_alias: String,
    body: String,
    sender_leaving: i64,
    hang_on: i64,
    from_did: Option<String>,
    to_did: Option<String>,
    signature: Option<String>,
    signing_key_id: Option<String>,
    created_at: String,
}

impl MessageRow {
    fn into_message(self) -> Result<ChatMessage> {
        Ok(ChatMessage {
            message_id: self.message_id,
            session_id: self.session_id,
            from_agent_id: self.from_agent_id,
            from_alias: self.from_alias,
            body: self.body,
            sender_leaving: self.sender_leaving != 0,
            hang_on: self.hang_on != 0,
            signature: SignatureFields {
                from_did: self.from_did,
                to_did: self.to_did,
                signature: self.signature,
                signing_key_id: self.signing_key_id,
            },
            created_at: parse_ts(&self.created_at)?,
        })
    }
}

/// Internal receipt row.
#[derive(sqlx::FromRow)]
struct ReceiptRow {
    session_id: String,
    agent_id: String,
    last_read_message_id: Option<String>,
    last_read_at: Option<String>,
}

impl ReceiptRow {
    fn into_receipt(self) -> Result<ReadReceipt> {
        Ok(ReadReceipt {
            session_id: self.session_id,
            agent_id: self.agent_id,
            last_read_message_id: self.last_read_message_id,
            last_read_at: self.last_read_at.as_deref().map(parse_ts).transpose()?,
        })
    }
}

const MSG_COLUMNS: &str = "message_id, session_id, from_agent_id, from_alias, body, \
                           sender_leaving, hang_on, from_did, to_did, signature, \
                           signing_key_id, created_at";

impl ChatRepo {
    /// Create a new repository instance.
    #[must_use]
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert-or-select a session on `(project_id, participant_hash)`.
    ///
    /// Returns the canonical row plus whether this call created it. The
    /// `INSERT OR IGNORE` + select pair runs against a single-writer pool,
    /// so concurrent creators converge on one row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if either statement fails or the row
    /// vanishes between the two (sessions are never deleted).
    pub async fn upsert_session(&self, candidate: &ChatSession) -> Result<(ChatSession, bool)> {
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO chat_sessions
                 (session_id, project_id, participant_hash, created_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&candidate.session_id)
        .bind(&candidate.project_id)
        .bind(&candidate.participant_hash)
        .bind(fmt_ts(candidate.created_at))
        .execute(self.db.as_ref())
        .await?
        .rows_affected()
            > 0;

        let row: SessionRow = sqlx::query_as(
            "SELECT session_id, project_id, participant_hash, created_at
             FROM chat_sessions WHERE project_id = ?1 AND participant_hash = ?2",
        )
        .bind(&candidate.project_id)
        .bind(&candidate.participant_hash)
        .fetch_one(self.db.as_ref())
        .await?;

        Ok((row.into_session()?, inserted))
    }

    /// Add a participant row. Idempotent on repeats.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn add_participant(&self, participant: &ChatParticipant) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO chat_session_participants
                 (session_id, agent_id, alias, joined_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&participant.session_id)
        .bind(&participant.agent_id)
        .bind(&participant.alias)
        .bind(fmt_ts(participant.joined_at))
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Fetch a session scoped to a project.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn fetch_session(
        &self,
        project_id: &str,
        session_id: &str,
    ) -> Result<Option<ChatSession>> {
        let row: Option<SessionRow> = sqlx::query_as(
            "SELECT session_id, project_id, participant_hash, created_at
             FROM chat_sessions WHERE project_id = ?1 AND session_id = ?2",
        )
        .bind(project_id)
        .bind(session_id)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(SessionRow::into_session).transpose()
    }

    /// List a session's participants, alias order.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn participants(&self, session_id: &str) -> Result<Vec<ChatParticipant>> {
        let rows: Vec<ParticipantRow> = sqlx::query_as(
            "SELECT session_id, agent_id, alias, joined_at
             FROM chat_session_participants WHERE session_id = ?1
             ORDER BY alias ASC",
        )
        .bind(session_id)
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter()
            .map(ParticipantRow::into_participant)
            .collect()
    }

    /// Whether the agent is a participant of the session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn is_participant(&self, session_id: &str, agent_id: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chat_session_participants
             WHERE session_id = ?1 AND agent_id = ?2",
        )
        .bind(session_id)
        .bind(agent_id)
        .fetch_one(self.db.as_ref())
        .await?;
        Ok(count > 0)
    }

    /// Sessions the agent participates in, newest first.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn sessions_for_agent(
        &self,
        project_id: &str,
        agent_id: &str,
    ) -> Result<Vec<ChatSession>> {
        let rows: Vec<SessionRow> = sqlx::query_as(
            "SELECT s.session_id, s.project_id, s.participant_hash, s.created_at
             FROM chat_sessions s
             JOIN chat_session_participants p ON p.session_id = s.session_id
             WHERE s.project_id = ?1 AND p.agent_id = ?2
             ORDER BY s.created_at DESC",
        )
        .bind(project_id)
        .bind(agent_id)
        .fetch_all(self.db.as_ref())
        .await?;
        rows.into_iter().map(SessionRow::into_session).collect()
    }

    /// Insert a message row.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the insert fails.
    pub async fn insert_message(&self, msg: &ChatMessage) -> Result<()> {
        sqlx::query(
            "INSERT INTO chat_messages (message_id, session_id, from_agent_id, from_alias,
                                        body, sender_leaving, hang_on, from_did, to_did,
                                        signature, signing_key_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )
        .bind(&msg.message_id)
        .bind(&msg.session_id)
        .bind(&msg.from_agent_id)
        .bind(&msg.from_alias)
        .bind(&msg.body)
        .bind(i64::from(msg.sender_leaving))
        .bind(i64::from(msg.hang_on))
        .bind(&msg.signature.from_did)
        .bind(&msg.signature.to_did)
        .bind(&msg.signature.signature)
        .bind(&msg.signature.signing_key_id)
        .bind(fmt_ts(msg.created_at))
        .execute(self.db.as_ref())
        .await?;
        Ok(())
    }

    /// Fetch one message within a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn fetch_message(
        &self,
        session_id: &str,
        message_id: &str,
    ) -> Result<Option<ChatMessage>> {
        let row: Option<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MSG_COLUMNS} FROM chat_messages
             WHERE session_id = ?1 AND message_id = ?2"
        ))
        .bind(session_id)
        .bind(message_id)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(MessageRow::into_message).transpose()
    }

    /// Session history in commit order, optionally after a timestamp.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn history(
        &self,
        session_id: &str,
        after: Option<DateTime<Utc>>,
        limit: u32,
    ) -> Result<Vec<ChatMessage>> {
        let rows: Vec<MessageRow> = if let Some(after) = after {
            sqlx::query_as(&format!(
                "SELECT {MSG_COLUMNS} FROM chat_messages
                 WHERE session_id = ?1 AND created_at > ?2
                 ORDER BY created_at ASC, message_id ASC LIMIT ?3"
            ))
            .bind(session_id)
            .bind(fmt_ts(after))
            .bind(i64::from(limit))
            .fetch_all(self.db.as_ref())
            .await?
        } else {
            sqlx::query_as(&format!(
                "SELECT {MSG_COLUMNS} FROM chat_messages
                 WHERE session_id = ?1
                 ORDER BY created_at ASC, message_id ASC LIMIT ?2"
            ))
            .bind(session_id)
            .bind(i64::from(limit))
            .fetch_all(self.db.as_ref())
            .await?
        };
        rows.into_iter().map(MessageRow::into_message).collect()
    }

    /// Most recent message of a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn last_message(&self, session_id: &str) -> Result<Option<ChatMessage>> {
        let row: Option<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MSG_COLUMNS} FROM chat_messages
             WHERE session_id = ?1
             ORDER BY created_at DESC, message_id DESC LIMIT 1"
        ))
        .bind(session_id)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(MessageRow::into_message).transpose()
    }

    /// Most recent message a given agent sent in a session.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn last_message_of_agent(
        &self,
        session_id: &str,
        agent_id: &str,
    ) -> Result<Option<ChatMessage>> {
        let row: Option<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MSG_COLUMNS} FROM chat_messages
             WHERE session_id = ?1 AND from_agent_id = ?2
             ORDER BY created_at DESC, message_id DESC LIMIT 1"
        ))
        .bind(session_id)
        .bind(agent_id)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(MessageRow::into_message).transpose()
    }

    /// Fetch the reader's receipt, if any.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn receipt(&self, session_id: &str, agent_id: &str) -> Result<Option<ReadReceipt>> {
        let row: Option<ReceiptRow> = sqlx::query_as(
            "SELECT session_id, agent_id, last_read_message_id, last_read_at
             FROM chat_read_receipts WHERE session_id = ?1 AND agent_id = ?2",
        )
        .bind(session_id)
        .bind(agent_id)
        .fetch_optional(self.db.as_ref())
        .await?;
        row.map(ReceiptRow::into_receipt).transpose()
    }

    /// Count messages from other senders after the reader's receipt.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if the query fails.
    pub async fn unread_count(&self, session_id: &str, agent_id: &str) -> Result<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM chat_messages m
             WHERE m.session_id = ?1 AND m.from_agent_id != ?2
               AND NOT EXISTS (
                   SELECT 1 FROM chat_read_receipts r
                   JOIN chat_messages cur ON cur.message_id = r.last_read_message_id
                   WHERE r.session_id = ?1 AND r.agent_id = ?2
                     AND (m.created_at < cur.created_at
                          OR (m.created_at = cur.created_at
                              AND m.message_id <= cur.message_id))
               )",
        )
        .bind(session_id)
        .bind(agent_id)
        .fetch_one(self.db.as_ref())
        .await?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    /// Advance the reader's receipt to `target` if that moves it forward.
    ///
    /// Returns the number of messages from other senders newly covered by
    /// the advance; `0` means the receipt was already at or past the
    /// target and nothing changed.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` if any statement fails.
    pub async fn advance_receipt(
        &self,
        session_id: &str,
        agent_id: &str,
        target: &ChatMessage,
        read_at: DateTime<Utc>,
    ) -> Result<u32> {
        let target_ts = fmt_ts(target.created_at);

        // Previous position, for counting what the advance newly covers.
        let prev = match self.receipt(session_id, agent_id).await? {
            Some(r) => match r.last_read_message_id {
                Some(id) => self.fetch_message(session_id, &id).await?,
                None => None,
            },
            None => None,
        };

        // Monotone guard: only move forward in (created_at, message_id) order.
        let advanced = sqlx::query(
            "INSERT INTO chat_read_receipts
                 (session_id, agent_id, last_read_message_id, last_read_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (session_id, agent_id) DO UPDATE SET
                 last_read_message_id = excluded.last_read_message_id,
                 last_read_at = excluded.last_read_at
             WHERE chat_read_receipts.last_read_message_id IS NULL
                OR EXISTS (
                    SELECT 1 FROM chat_messages cur
                    WHERE cur.message_id = chat_read_receipts.last_read_message_id
                      AND (cur.created_at < ?5
                           OR (cur.created_at = ?5 AND cur.message_id < ?3))
                )",
        )
        .bind(session_id)
        .bind(agent_id)
        .bind(&target.message_id)
        .bind(fmt_ts(read_at))
        .bind(&target_ts)
        .execute(self.db.as_ref())
        .await?
        .rows_affected()
            > 0;

        if !advanced {
            return Ok(0);
        }

        let marked: i64 = if let Some(prev) = prev {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM chat_messages m
                 WHERE m.session_id = ?1 AND m.from_agent_id != ?2
                   AND (m.created_at < ?3
                        OR (m.created_at = ?3 AND m.message_id <= ?4))
                   AND (m.created_at > ?5
                        OR (m.created_at = ?5 AND m.message_id > ?6))",
            )
            .bind(session_id)
            .bind(agent_id)
            .bind(&target_ts)
            .bind(&target.message_id)
            .bind(fmt_ts(prev.created_at))
            .bind(&prev.message_id)
            .fetch_one(self.db.as_ref())
            .await?
        } else {
            sqlx::query_scalar(
                "SELECT COUNT(*) FROM chat_messages m
                 WHERE m.session_id = ?1 AND m.from_agent_id != ?2
                   AND (m.created_at < ?3
                        OR (m.created_at = ?3 AND m.message_id <= ?4))",
            )
            .bind(session_id)
            .bind(agent_id)
            .bind(&target_ts)
            .bind(&target.message_id)
            .fetch_one(self.db.as_ref())
            .await?
        };

        Ok(u32::try_from(marked).unwrap_or(u32::MAX))
    }
}
