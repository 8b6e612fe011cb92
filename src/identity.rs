//! Identity operations: bootstrap, introspection, agent lifecycle,
//! key rotation, and contacts.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::Principal;
use crate::models::agent::{validate_alias, AccessMode, Agent, AgentStatus};
use crate::models::api_key::{hash_key, mint_key, ApiKey};
use crate::models::contact::Contact;
use crate::models::project::Project;
use crate::presence;
use crate::state::AppState;
use crate::{AppError, Result};

/// Parameters for the unauthenticated bootstrap.
#[derive(Debug, Clone)]
pub struct InitParams {
    /// Project slug; the project is created on first use.
    pub project_slug: String,
    /// Optional tenant partition the slug is scoped to.
    pub tenant_id: Option<String>,
    /// Requested alias; generated when absent.
    pub alias: Option<String>,
    /// Display name.
    pub human_name: Option<String>,
    /// Free-form agent type tag.
    pub agent_type: Option<String>,
}

/// Result of the bootstrap, carrying the plaintext key exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct InitResult {
    /// Project id the agent belongs to.
    pub project_id: String,
    /// Project slug.
    pub project_slug: String,
    /// New agent id.
    pub agent_id: String,
    /// Granted alias.
    pub alias: String,
    /// Plaintext API key. Only the digest is stored.
    pub api_key: String,
}

/// Caller identity echo.
#[derive(Debug, Clone, Serialize)]
pub struct IntrospectResult {
    /// Principal project.
    pub project_id: String,
    /// Acting agent, when agent-linked.
    pub agent_id: Option<String>,
    /// Acting agent alias.
    pub alias: Option<String>,
    /// Acting agent display name.
    pub human_name: Option<String>,
    /// Acting agent type tag.
    pub agent_type: Option<String>,
}

/// Agent listing row enriched with presence.
#[derive(Debug, Clone, Serialize)]
pub struct AgentListing {
    /// Agent id.
    pub agent_id: String,
    /// Alias.
    pub alias: String,
    /// Display name.
    pub human_name: Option<String>,
    /// Type tag.
    pub agent_type: Option<String>,
    /// Access mode.
    pub access_mode: AccessMode,
    /// Lifecycle status.
    pub status: AgentStatus,
    /// Whether a live presence heartbeat exists.
    pub online: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Result of a key rotation, carrying the new plaintext key once.
#[derive(Debug, Clone, Serialize)]
pub struct RotateResult {
    /// New plaintext API key.
    pub api_key: String,
    /// Number of keys deactivated by the rotation.
    pub rotated_out: u64,
}

const ALIAS_ADJECTIVES: &[&str] = &[
    "amber", "bold", "calm", "deft", "eager", "fleet", "green", "keen", "lucid", "noble",
    "quick", "rapt", "sage", "tidy", "vivid", "warm",
];

const ALIAS_NOUNS: &[&str] = &[
    "anchor", "beacon", "cedar", "delta", "ember", "falcon", "garnet", "harbor", "iris",
    "jasper", "kestrel", "lantern", "meadow", "nimbus", "osprey", "pebble",
];

/// Suggest an alias not taken by any live agent of the project.
///
/// # Errors
///
/// Returns `AppError::Db` on store failures.
pub async fn suggest_alias(state: &AppState, project_id: &str) -> Result<String> {
    for attempt in 0u32..64 {
        let seed = Uuid::new_v4().into_bytes();
        let adjective = ALIAS_ADJECTIVES[usize::from(seed[0]) % ALIAS_ADJECTIVES.len()];
        let noun = ALIAS_NOUNS[usize::from(seed[1]) % ALIAS_NOUNS.len()];
        let candidate = if attempt < 8 {
            format!("{adjective}-{noun}")
        } else {
            let suffix = u16::from_be_bytes([seed[2], seed[3]]) % 1000;
            format!("{adjective}-{noun}-{suffix}")
        };
        if state
            .agents()
            .fetch_by_alias(project_id, &candidate)
            .await?
            .is_none()
        {
            return Ok(candidate);
        }
    }
    // All memorable combinations taken; fall back to an opaque id.
    Ok(format!("agent-{}", Uuid::new_v4().simple()))
}

/// Bootstrap a project, agent, and API key in one call.
///
/// # Errors
///
/// `INVALID_ARGUMENT` for a bad alias or empty slug, `CONFLICT` when the
/// alias is taken by a live agent.
pub async fn init(state: &AppState, params: InitParams) -> Result<InitResult> {
    if params.project_slug.is_empty() {
        return Err(AppError::InvalidArgument(
            "project_slug must not be empty".into(),
        ));
    }

    let project = match state
        .projects()
        .fetch_by_slug(&params.project_slug, params.tenant_id.as_deref())
        .await?
    {
        Some(existing) => existing,
        None => {
            let project = Project::new(params.project_slug.clone(), params.tenant_id.clone());
            state.projects().insert(&project).await?;
            project
        }
    };

    let alias = match params.alias {
        Some(alias) => {
            validate_alias(&alias)?;
            if state
                .agents()
                .fetch_by_alias(&project.project_id, &alias)
                .await?
                .is_some()
            {
                return Err(AppError::conflict(format!("alias {alias:?} is taken")));
            }
            alias
        }
        None => suggest_alias(state, &project.project_id).await?,
    };

    let agent = Agent::new(
        project.project_id.clone(),
        alias.clone(),
        params.human_name,
        params.agent_type,
    );
    state.agents().insert(&agent).await?;

    let plaintext = mint_key();
    let key = ApiKey::new(
        project.project_id.clone(),
        Some(agent.agent_id.clone()),
        hash_key(&plaintext),
    );
    state.api_keys().insert(&key).await?;

    Ok(InitResult {
        project_id: project.project_id,
        project_slug: project.slug,
        agent_id: agent.agent_id,
        alias,
        api_key: plaintext,
    })
}

/// Describe the caller.
///
/// # Errors
///
/// Returns `AppError::Db` on store failures.
pub async fn introspect(state: &AppState, principal: &Principal) -> Result<IntrospectResult> {
    let agent = match principal.agent_id.as_deref() {
        Some(agent_id) => state.agents().fetch(&principal.project_id, agent_id).await?,
        None => None,
    };
    Ok(IntrospectResult {
        project_id: principal.project_id.clone(),
        agent_id: principal.agent_id.clone(),
        alias: agent.as_ref().map(|a| a.alias.clone()),
        human_name: agent.as_ref().and_then(|a| a.human_name.clone()),
        agent_type: agent.and_then(|a| a.agent_type),
    })
}

/// List the project's live agents with presence.
///
/// # Errors
///
/// Returns `AppError::Db` on store failures.
pub async fn list_agents(state: &AppState, principal: &Principal) -> Result<Vec<AgentListing>> {
    let agents = state.agents().list(&principal.project_id).await?;
    Ok(agents
        .into_iter()
        .map(|a| {
            let online = presence::is_online(state, &a.project_id, &a.agent_id);
            AgentListing {
                agent_id: a.agent_id,
                alias: a.alias,
                human_name: a.human_name,
                agent_type: a.agent_type,
                access_mode: a.access_mode,
                status: a.status,
                online,
                created_at: a.created_at,
            }
        })
        .collect())
}

/// Rotate the acting agent's API key. The agent id stays stable; the
/// previous key stops authenticating.
///
/// # Errors
///
/// `FORBIDDEN` for project-only credentials.
pub async fn rotate_key(state: &AppState, principal: &Principal) -> Result<RotateResult> {
    let agent_id = principal.require_agent()?;
    let rotated_out = state
        .api_keys()
        .deactivate_for_agent(&principal.project_id, agent_id)
        .await?;

    let plaintext = mint_key();
    let key = ApiKey::new(
        principal.project_id.clone(),
        Some(agent_id.to_owned()),
        hash_key(&plaintext),
    );
    state.api_keys().insert(&key).await?;

    Ok(RotateResult {
        api_key: plaintext,
        rotated_out,
    })
}

/// Mark the acting agent retired. Retired agents stay addressable and
/// are reported as departed in chat.
///
/// # Errors
///
/// `NOT_FOUND` when the agent row is gone.
pub async fn retire(state: &AppState, principal: &Principal) -> Result<()> {
    let agent_id = principal.require_agent()?;
    let updated = state
        .agents()
        .set_status(&principal.project_id, agent_id, AgentStatus::Retired)
        .await?;
    if !updated {
        return Err(AppError::NotFound("acting agent no longer exists".into()));
    }
    Ok(())
}

/// Deregister the acting agent terminally and deactivate its keys.
///
/// # Errors
///
/// `NOT_FOUND` when the agent row is gone.
pub async fn deregister(state: &AppState, principal: &Principal) -> Result<()> {
    let agent_id = principal.require_agent()?;
    let updated = state
        .agents()
        .set_status(&principal.project_id, agent_id, AgentStatus::Deregistered)
        .await?;
    if !updated {
        return Err(AppError::NotFound("acting agent no longer exists".into()));
    }
    state
        .api_keys()
        .deactivate_for_agent(&principal.project_id, agent_id)
        .await?;
    Ok(())
}

/// Set the acting agent's access mode.
///
/// # Errors
///
/// `NOT_FOUND` when the agent row is gone.
pub async fn set_access_mode(
    state: &AppState,
    principal: &Principal,
    mode: AccessMode,
) -> Result<()> {
    let agent_id = principal.require_agent()?;
    let updated = state
        .agents()
        .set_access_mode(&principal.project_id, agent_id, mode)
        .await?;
    if !updated {
        return Err(AppError::NotFound("acting agent no longer exists".into()));
    }
    Ok(())
}

/// List the acting agent's contact set.
///
/// # Errors
///
/// Returns `AppError::Db` on store failures.
pub async fn list_contacts(state: &AppState, principal: &Principal) -> Result<Vec<Contact>> {
    let agent_id = principal.require_agent()?;
    state.contacts().list(&principal.project_id, agent_id).await
}

/// Add an address to the acting agent's contact set. Idempotent.
///
/// # Errors
///
/// `INVALID_ARGUMENT` for an empty address.
pub async fn add_contact(
    state: &AppState,
    principal: &Principal,
    contact_address: &str,
) -> Result<()> {
    let agent_id = principal.require_agent()?;
    if contact_address.is_empty() {
        return Err(AppError::InvalidArgument(
            "contact_address must not be empty".into(),
        ));
    }
    let contact = Contact::new(
        principal.project_id.clone(),
        agent_id.to_owned(),
        contact_address.to_owned(),
    );
    state.contacts().add(&contact).await
}

/// Remove an address from the acting agent's contact set.
///
/// # Errors
///
/// `NOT_FOUND` when the address is not in the set.
pub async fn remove_contact(
    state: &AppState,
    principal: &Principal,
    contact_address: &str,
) -> Result<()> {
    let agent_id = principal.require_agent()?;
    let removed = state
        .contacts()
        .remove(&principal.project_id, agent_id, contact_address)
        .await?;
    if !removed {
        return Err(AppError::NotFound("no such contact".into()));
    }
    Ok(())
}
