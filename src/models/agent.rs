//! Agent model and alias validation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppError, Result};

/// Who may open mail or chat toward this agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    /// Any sender within the project is accepted.
    Open,
    /// Only senders present in the agent's contact set are accepted.
    ContactsOnly,
}

/// Lifecycle status for an agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    /// Agent is live and addressable.
    Active,
    /// Agent stepped away; still addressable, reported as departed.
    Retired,
    /// Agent is terminal; addressing it is refused.
    Deregistered,
}

/// Agent domain entity. `agent_id` is stable across key rotations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Agent {
    /// Stable identifier.
    pub agent_id: String,
    /// Owning project.
    pub project_id: String,
    /// Project-unique, `/`-free human identifier.
    pub alias: String,
    /// Free-form display name.
    pub human_name: Option<String>,
    /// Free-form agent type tag (e.g. the driving model or harness).
    pub agent_type: Option<String>,
    /// Who may open mail or chat toward this agent.
    pub access_mode: AccessMode,
    /// Lifecycle status.
    pub status: AgentStatus,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Tombstone timestamp; set instead of row deletion.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Agent {
    /// Construct a new active agent with a generated identifier.
    #[must_use]
    pub fn new(
        project_id: String,
        alias: String,
        human_name: Option<String>,
        agent_type: Option<String>,
    ) -> Self {
        Self {
            agent_id: Uuid::new_v4().to_string(),
            project_id,
            alias,
            human_name,
            agent_type,
            access_mode: AccessMode::Open,
            status: AgentStatus::Active,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    /// Whether the agent is live (not tombstoned).
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Validate an agent alias.
///
/// The `/` character is reserved for cross-namespace addresses and is
/// rejected at create time.
///
/// # Errors
///
/// Returns `AppError::InvalidArgument` if the alias is empty, longer than
/// 128 characters, or contains `/`.
pub fn validate_alias(alias: &str) -> Result<()> {
    if alias.is_empty() {
        return Err(AppError::InvalidArgument("alias must not be empty".into()));
    }
    if alias.len() > 128 {
        return Err(AppError::InvalidArgument(
            "alias must be at most 128 characters".into(),
        ));
    }
    if alias.contains('/') {
        return Err(AppError::InvalidArgument(
            "alias must not contain '/'".into(),
        ));
    }
    if alias.chars().any(char::is_control) {
        return Err(AppError::InvalidArgument(
            "alias must not contain control characters".into(),
        ));
    }
    Ok(())
}
