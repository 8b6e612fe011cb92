//! Authentication and authorization.
//!
//! Every operation is scoped to the project (and, for agent-linked keys,
//! the acting agent) carried by the [`Principal`] produced here. Two
//! modes exist and never mix: bearer-token digest lookup, and the
//! proxy-trust signed context. When proxy trust is enabled, a malformed
//! context fails terminally — there is no bearer fallback.

pub mod principal;
pub mod proxy;
pub mod token;

pub use principal::Principal;

use crate::state::AppState;
use crate::{AppError, Result};

/// Raw credentials extracted from a request before validation.
#[derive(Debug, Default, Clone)]
pub struct AuthInputs {
    /// Bearer token from the `Authorization` header.
    pub bearer: Option<String>,
    /// Proxy context project id header.
    pub proxy_project_id: Option<String>,
    /// Proxy context acting agent header.
    pub proxy_agent_id: Option<String>,
    /// Proxy context signature header, hex-encoded.
    pub proxy_signature: Option<String>,
}

/// Authenticate a caller to a [`Principal`].
///
/// # Errors
///
/// Returns `AppError::Unauthenticated` on missing or invalid credentials.
/// Under proxy trust the failure is terminal regardless of any bearer
/// token also present on the request.
pub async fn authenticate(state: &AppState, inputs: &AuthInputs) -> Result<Principal> {
    if state.config.proxy_trust.enabled {
        return proxy::authenticate_proxy(state, inputs).await;
    }

    let bearer = inputs
        .bearer
        .as_deref()
        .ok_or_else(|| AppError::Unauthenticated("missing bearer token".into()))?;
    token::authenticate_bearer(state, bearer).await
}
