//! Best-effort presence over the ephemeral KV.
//!
//! A heartbeat writes `(project_id, agent_id) → now` with the configured
//! TTL; absence of the key means offline. Presence never gates delivery.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::Principal;
use crate::state::AppState;
use crate::timeutil::now_ts;
use crate::Result;

/// Result of a heartbeat.
#[derive(Debug, Clone, Serialize)]
pub struct HeartbeatResult {
    /// When the presence entry lapses unless refreshed.
    pub online_until: DateTime<Utc>,
}

fn presence_key(project_id: &str, agent_id: &str) -> String {
    format!("presence:{project_id}:{agent_id}")
}

/// Record a heartbeat for the acting agent.
///
/// # Errors
///
/// `FORBIDDEN` when the credential is project-only.
pub fn heartbeat(state: &AppState, principal: &Principal) -> Result<HeartbeatResult> {
    let agent_id = principal.require_agent()?;
    let ttl_seconds = state.config.presence.heartbeat_ttl_seconds;
    state.kv.put(
        &presence_key(&principal.project_id, agent_id),
        &now_ts(),
        Duration::from_secs(ttl_seconds),
    );
    Ok(HeartbeatResult {
        online_until: Utc::now() + chrono::Duration::seconds(i64::try_from(ttl_seconds).unwrap_or(0)),
    })
}

/// Whether the agent has a live heartbeat.
#[must_use]
pub fn is_online(state: &AppState, project_id: &str, agent_id: &str) -> bool {
    state.kv.contains(&presence_key(project_id, agent_id))
}
