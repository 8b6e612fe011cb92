//! Proxy-trust authentication.
//!
//! Deployments behind a trusted gateway carry a signed internal context
//! instead of bearer tokens. The signature covers the project and acting
//! agent ids; verification failure is terminal — bearer fallback is
//! disabled by construction (this module never reads the bearer input).

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::state::AppState;
use crate::{AppError, Result};

use super::{AuthInputs, Principal};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the proxy context project id.
pub const PROJECT_HEADER: &str = "x-aweb-project";
/// Header carrying the proxy context acting agent id.
pub const AGENT_HEADER: &str = "x-aweb-agent";
/// Header carrying the hex-encoded context signature.
pub const SIGNATURE_HEADER: &str = "x-aweb-signature";

fn mac_input(project_id: &str, agent_id: Option<&str>) -> String {
    format!("{project_id}\n{}", agent_id.unwrap_or(""))
}

/// Sign a proxy context. Used by the trusted gateway and by tests.
///
/// # Errors
///
/// Returns `AppError::Config` if the secret is unusable as key material.
pub fn sign_context(secret: &str, project_id: &str, agent_id: Option<&str>) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Config("proxy signing secret unusable".into()))?;
    mac.update(mac_input(project_id, agent_id).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Verify a proxy context signature in constant time.
///
/// # Errors
///
/// Returns `AppError::Unauthenticated` on any mismatch or malformed
/// signature encoding.
pub fn verify_context(
    secret: &str,
    project_id: &str,
    agent_id: Option<&str>,
    signature_hex: &str,
) -> Result<()> {
    let sig = hex::decode(signature_hex)
        .map_err(|_| AppError::Unauthenticated("malformed proxy signature".into()))?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AppError::Unauthenticated("proxy signing secret unusable".into()))?;
    mac.update(mac_input(project_id, agent_id).as_bytes());
    mac.verify_slice(&sig)
        .map_err(|_| AppError::Unauthenticated("proxy context signature mismatch".into()))
}

/// Authenticate a request under proxy trust.
///
/// # Errors
///
/// Returns `AppError::Unauthenticated` when the context is missing,
/// tampered, or names entities outside the store. Never falls back to
/// bearer.
pub async fn authenticate_proxy(state: &AppState, inputs: &AuthInputs) -> Result<Principal> {
    let project_id = inputs
        .proxy_project_id
        .as_deref()
        .ok_or_else(|| AppError::Unauthenticated("missing proxy context".into()))?;
    let signature = inputs
        .proxy_signature
        .as_deref()
        .ok_or_else(|| AppError::Unauthenticated("missing proxy signature".into()))?;
    let agent_id = inputs.proxy_agent_id.as_deref();

    verify_context(
        &state.config.proxy_trust.signing_secret,
        project_id,
        agent_id,
        signature,
    )?;

    if state.projects().fetch(project_id).await?.is_none() {
        return Err(AppError::Unauthenticated(
            "proxy context names an unknown project".into(),
        ));
    }

    if let Some(agent_id) = agent_id {
        let agent = state.agents().fetch(project_id, agent_id).await?;
        if agent.is_none() {
            return Err(AppError::Unauthenticated(
                "proxy context names an unknown agent".into(),
            ));
        }
    }

    Ok(Principal {
        project_id: project_id.to_owned(),
        agent_id: agent_id.map(str::to_owned),
        api_key_id: None,
    })
}
