//! Reservation lease manager: acquire, renew, release, list.
//!
//! Leases are per-project named locks on opaque string keys. Expiry is
//! evaluated lazily at read time; at most one unexpired holder exists per
//! `(project_id, resource_key)`.

use chrono::{Duration, Utc};
use serde::Serialize;

use crate::auth::Principal;
use crate::errors::ConflictHolder;
use crate::models::agent::Agent;
use crate::models::reservation::Reservation;
use crate::state::AppState;
use crate::timeutil::fmt_ts;
use crate::{AppError, Result};

/// Result of a granted acquire.
#[derive(Debug, Clone, Serialize)]
pub struct AcquireResult {
    /// Lease key.
    pub resource_key: String,
    /// Holding agent id.
    pub holder_agent_id: String,
    /// Holding agent alias.
    pub holder_alias: String,
    /// Grant timestamp.
    pub acquired_at: chrono::DateTime<Utc>,
    /// Absolute expiry.
    pub expires_at: chrono::DateTime<Utc>,
}

/// Result of a renew.
#[derive(Debug, Clone, Serialize)]
pub struct RenewResult {
    /// New absolute expiry.
    pub expires_at: chrono::DateTime<Utc>,
}

/// Result of a release.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseResult {
    /// Whether a row was deleted. `false` means there was nothing to
    /// release (idempotent).
    pub released: bool,
}

async fn acting_agent(state: &AppState, principal: &Principal) -> Result<Agent> {
    let agent_id = principal.require_agent()?;
    state
        .agents()
        .fetch(&principal.project_id, agent_id)
        .await?
        .ok_or_else(|| AppError::NotFound("acting agent no longer exists".into()))
}

fn clamp_ttl(state: &AppState, ttl_seconds: Option<u64>) -> i64 {
    let cfg = &state.config.reservations;
    let ttl = ttl_seconds.unwrap_or(cfg.default_ttl_seconds);
    let ttl = ttl.clamp(1, cfg.max_ttl_seconds);
    i64::try_from(ttl).unwrap_or(i64::MAX)
}

/// Acquire a lease, overwriting an expired row if one is in the way.
///
/// # Errors
///
/// `CONFLICT` (with holder details) when another live holder exists,
/// `INVALID_ARGUMENT` for an empty key.
pub async fn acquire(
    state: &AppState,
    principal: &Principal,
    resource_key: &str,
    ttl_seconds: Option<u64>,
    metadata: serde_json::Value,
) -> Result<AcquireResult> {
    if resource_key.is_empty() {
        return Err(AppError::InvalidArgument(
            "resource_key must not be empty".into(),
        ));
    }
    let agent = acting_agent(state, principal).await?;
    let now = Utc::now();
    let lease = Reservation {
        project_id: principal.project_id.clone(),
        resource_key: resource_key.to_owned(),
        holder_agent_id: agent.agent_id.clone(),
        holder_alias: agent.alias.clone(),
        acquired_at: now,
        expires_at: now + Duration::seconds(clamp_ttl(state, ttl_seconds)),
        metadata,
    };

    if state.reservations().try_acquire(&lease).await? {
        return Ok(AcquireResult {
            resource_key: lease.resource_key,
            holder_agent_id: lease.holder_agent_id,
            holder_alias: lease.holder_alias,
            acquired_at: lease.acquired_at,
            expires_at: lease.expires_at,
        });
    }

    // Lost to a live holder; report them.
    let current = state
        .reservations()
        .fetch(&principal.project_id, resource_key)
        .await?
        .ok_or_else(|| AppError::conflict("reservation raced with a concurrent release"))?;
    Err(AppError::held_by(ConflictHolder {
        holder_agent_id: current.holder_agent_id,
        holder_alias: current.holder_alias,
        expires_at: fmt_ts(current.expires_at),
    }))
}

/// Extend a lease the principal currently holds.
///
/// # Errors
///
/// `NOT_FOUND` when no live row exists (absent or expired), `FORBIDDEN`
/// when another live holder owns the key.
pub async fn renew(
    state: &AppState,
    principal: &Principal,
    resource_key: &str,
    ttl_seconds: Option<u64>,
) -> Result<RenewResult> {
    let agent = acting_agent(state, principal).await?;
    let now = Utc::now();
    let expires_at = now + Duration::seconds(clamp_ttl(state, ttl_seconds));

    if state
        .reservations()
        .renew(
            &principal.project_id,
            resource_key,
            &agent.agent_id,
            now,
            expires_at,
        )
        .await?
    {
        return Ok(RenewResult { expires_at });
    }

    match state
        .reservations()
        .fetch(&principal.project_id, resource_key)
        .await?
    {
        Some(current) if current.is_live(now) => Err(AppError::Forbidden(format!(
            "reservation held by {:?}",
            current.holder_alias
        ))),
        _ => Err(AppError::NotFound("no live reservation to renew".into())),
    }
}

/// Release a lease. Holder-only while live; anyone may clean up an
/// expired row; releasing an absent row is a no-op.
///
/// # Errors
///
/// `FORBIDDEN` when another live holder owns the key.
pub async fn release(
    state: &AppState,
    principal: &Principal,
    resource_key: &str,
) -> Result<ReleaseResult> {
    let agent = acting_agent(state, principal).await?;
    let now = Utc::now();

    if state
        .reservations()
        .release(&principal.project_id, resource_key, &agent.agent_id, now)
        .await?
    {
        return Ok(ReleaseResult { released: true });
    }

    match state
        .reservations()
        .fetch(&principal.project_id, resource_key)
        .await?
    {
        Some(current) if current.is_live(now) => Err(AppError::Forbidden(format!(
            "reservation held by {:?}",
            current.holder_alias
        ))),
        _ => Ok(ReleaseResult { released: false }),
    }
}

/// Live leases of the project, optionally filtered by key prefix.
///
/// # Errors
///
/// Returns `AppError::Db` on store failures.
pub async fn list(
    state: &AppState,
    principal: &Principal,
    prefix: Option<&str>,
) -> Result<Vec<Reservation>> {
    state
        .reservations()
        .list_live(&principal.project_id, prefix, Utc::now())
        .await
}
