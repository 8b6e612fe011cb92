//! Mail message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery priority attached by the sender. Informational only.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Background noise.
    Low,
    /// Default.
    #[default]
    Normal,
    /// Wants attention soon.
    High,
    /// Drop what you are doing.
    Urgent,
}

/// Sender-provided signature fields, relayed verbatim and never
/// interpreted by the core.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct SignatureFields {
    /// Sender DID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_did: Option<String>,
    /// Recipient DID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_did: Option<String>,
    /// Detached signature over the payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    /// Identifier of the signing key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signing_key_id: Option<String>,
}

/// Mail message row. `read_at` transitions exactly once, `NULL → set`,
/// and only by the recipient.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct MailMessage {
    /// Stable identifier.
    pub message_id: String,
    /// Owning project; equals both endpoints' project.
    pub project_id: String,
    /// Sending agent.
    pub from_agent_id: String,
    /// Receiving agent.
    pub to_agent_id: String,
    /// Sender alias at send time.
    pub from_alias: String,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
    /// Sender-declared priority.
    pub priority: Priority,
    /// Application-supplied conversation thread.
    pub thread_id: Option<String>,
    /// Signature passthrough fields.
    #[serde(flatten)]
    pub signature: SignatureFields,
    /// Commit timestamp.
    pub created_at: DateTime<Utc>,
    /// Acknowledgment timestamp; set at most once by the recipient.
    pub read_at: Option<DateTime<Utc>>,
}

impl MailMessage {
    /// Construct an unread message stamped now.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project_id: String,
        from_agent_id: String,
        to_agent_id: String,
        from_alias: String,
        subject: String,
        body: String,
        priority: Priority,
        thread_id: Option<String>,
        signature: SignatureFields,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            project_id,
            from_agent_id,
            to_agent_id,
            from_alias,
            subject,
            body,
            priority,
            thread_id,
            signature,
            created_at: Utc::now(),
            read_at: None,
        }
    }
}

/// Parse a stored priority string.
#[must_use]
pub fn parse_priority(s: &str) -> Option<Priority> {
    match s {
        "low" => Some(Priority::Low),
        "normal" => Some(Priority::Normal),
        "high" => Some(Priority::High),
        "urgent" => Some(Priority::Urgent),
        _ => None,
    }
}

/// Serialize a priority to its database string.
#[must_use]
pub fn priority_str(p: Priority) -> &'static str {
    match p {
        Priority::Low => "low",
        Priority::Normal => "normal",
        Priority::High => "high",
        Priority::Urgent => "urgent",
    }
}
