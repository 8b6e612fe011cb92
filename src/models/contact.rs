//! Contact model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A sender address admitted by a `contacts_only` agent.
///
/// Within a project, contact addresses are bare aliases; the `/`
/// separator is reserved for cross-namespace addresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Contact {
    /// Owning project.
    pub project_id: String,
    /// Agent whose contact set this row belongs to.
    pub agent_id: String,
    /// Admitted sender address.
    pub contact_address: String,
    /// When the contact was added.
    pub created_at: DateTime<Utc>,
}

impl Contact {
    /// Construct a contact row stamped now.
    #[must_use]
    pub fn new(project_id: String, agent_id: String, contact_address: String) -> Self {
        Self {
            project_id,
            agent_id,
            contact_address,
            created_at: Utc::now(),
        }
    }
}
