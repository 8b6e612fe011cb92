//! Reservation lease model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Named lease on an opaque string key, scoped to a project.
///
/// A row is held iff `expires_at > now`; expired rows may be overwritten
/// by any acquirer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct Reservation {
    /// Owning project.
    pub project_id: String,
    /// Opaque lease key.
    pub resource_key: String,
    /// Current holder.
    pub holder_agent_id: String,
    /// Holder alias at acquire time.
    pub holder_alias: String,
    /// When the current holder acquired the lease.
    pub acquired_at: DateTime<Utc>,
    /// Absolute expiry.
    pub expires_at: DateTime<Utc>,
    /// Caller-supplied JSON metadata, relayed verbatim.
    pub metadata: serde_json::Value,
}

impl Reservation {
    /// Whether the lease is live at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }

    /// Seconds until expiry at `now`, clamped to zero.
    #[must_use]
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }
}
