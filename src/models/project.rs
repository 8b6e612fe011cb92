//! Project model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Project domain entity. Owns its agents, keys, contacts, messages,
/// sessions, and reservations; never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Project {
    /// Stable identifier.
    pub project_id: String,
    /// Human name, unique among non-deleted projects within the tenant.
    pub slug: String,
    /// Optional tenant partition the slug is scoped to.
    pub tenant_id: Option<String>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Tombstone timestamp; set instead of row deletion.
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Project {
    /// Construct a new live project with a generated identifier.
    #[must_use]
    pub fn new(slug: String, tenant_id: Option<String>) -> Self {
        Self {
            project_id: Uuid::new_v4().to_string(),
            slug,
            tenant_id,
            created_at: Utc::now(),
            deleted_at: None,
        }
    }
}
