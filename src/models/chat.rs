//! Chat session, participant, message, and read receipt models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::mail::SignatureFields;

/// Multi-party persistent conversation. `(project_id, participant_hash)`
/// is unique so repeated creates between the same group reuse the row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ChatSession {
    /// Stable identifier.
    pub session_id: String,
    /// Owning project.
    pub project_id: String,
    /// Digest of the sorted participant alias set.
    pub participant_hash: String,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    /// Construct a new session with a generated identifier.
    #[must_use]
    pub fn new(project_id: String, participant_hash: String) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            project_id,
            participant_hash,
            created_at: Utc::now(),
        }
    }
}

/// Membership row for one agent in one session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ChatParticipant {
    /// Session the agent belongs to.
    pub session_id: String,
    /// Member agent.
    pub agent_id: String,
    /// Member alias at join time.
    pub alias: String,
    /// Join timestamp.
    pub joined_at: DateTime<Utc>,
}

/// One message within a session. `hang_on` marks a control message
/// requesting more time; `sender_leaving` marks the sender's departure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ChatMessage {
    /// Stable identifier.
    pub message_id: String,
    /// Owning session.
    pub session_id: String,
    /// Sending agent; must be a participant.
    pub from_agent_id: String,
    /// Sender alias at send time.
    pub from_alias: String,
    /// Body text.
    pub body: String,
    /// Sender departs after this message.
    pub sender_leaving: bool,
    /// Control message requesting a wait extension.
    pub hang_on: bool,
    /// Signature passthrough fields.
    #[serde(flatten)]
    pub signature: SignatureFields,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    /// Construct a message stamped now.
    #[must_use]
    pub fn new(
        session_id: String,
        from_agent_id: String,
        from_alias: String,
        body: String,
        sender_leaving: bool,
        hang_on: bool,
        signature: SignatureFields,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            session_id,
            from_agent_id,
            from_alias,
            body,
            sender_leaving,
            hang_on,
            signature,
            created_at: Utc::now(),
        }
    }
}

/// Per-reader high-water mark. Advances monotonically.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ReadReceipt {
    /// Session the receipt belongs to.
    pub session_id: String,
    /// Reading agent.
    pub agent_id: String,
    /// Last message the reader has marked.
    pub last_read_message_id: Option<String>,
    /// When the reader last advanced.
    pub last_read_at: Option<DateTime<Utc>>,
}
