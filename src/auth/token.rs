//! Bearer-token authentication.

use tracing::debug;

use crate::models::api_key::hash_key;
use crate::state::AppState;
use crate::{AppError, Result};

use super::Principal;

/// Authenticate a bearer token by full-key digest lookup.
///
/// The digest index is the only thing consulted — no prefix lookup
/// exists, so an invalid token reveals nothing about near-miss keys.
/// `last_used_at` is stamped opportunistically; a bookkeeping failure
/// does not fail the request.
///
/// # Errors
///
/// Returns `AppError::Unauthenticated` when no active key matches.
pub async fn authenticate_bearer(state: &AppState, bearer: &str) -> Result<Principal> {
    let digest = hash_key(bearer);
    let key = state
        .api_keys()
        .fetch_active_by_hash(&digest)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("invalid api key".into()))?;

    if let Err(err) = state.api_keys().touch(&key.api_key_id).await {
        debug!(%err, "failed to stamp key last_used_at");
    }

    Ok(Principal {
        project_id: key.project_id,
        agent_id: key.agent_id,
        api_key_id: Some(key.api_key_id),
    })
}
