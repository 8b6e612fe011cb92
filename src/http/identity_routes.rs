//! Identity, agent lifecycle, presence, and contacts handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;

use crate::auth::Principal;
use crate::identity::{self, InitParams};
use crate::models::agent::AccessMode;
use crate::presence;
use crate::state::AppState;
use crate::Result;

/// Request body for `POST /v1/init`.
#[derive(Debug, Deserialize)]
pub struct InitBody {
    /// Project slug; created on first use.
    pub project_slug: String,
    /// Optional tenant partition.
    #[serde(default)]
    pub tenant_id: Option<String>,
    /// Requested alias; generated when absent.
    #[serde(default)]
    pub alias: Option<String>,
    /// Display name.
    #[serde(default)]
    pub human_name: Option<String>,
    /// Agent type tag.
    #[serde(default)]
    pub agent_type: Option<String>,
}

/// `POST /v1/init` — unauthenticated bootstrap.
pub async fn init(
    State(state): State<Arc<AppState>>,
    Json(body): Json<InitBody>,
) -> Result<Json<identity::InitResult>> {
    let result = identity::init(
        &state,
        InitParams {
            project_slug: body.project_slug,
            tenant_id: body.tenant_id,
            alias: body.alias,
            human_name: body.human_name,
            agent_type: body.agent_type,
        },
    )
    .await?;
    Ok(Json(result))
}

/// `GET /v1/auth/introspect`.
pub async fn introspect(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<identity::IntrospectResult>> {
    Ok(Json(identity::introspect(&state, &principal).await?))
}

/// `POST /v1/auth/rotate`.
pub async fn rotate(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<identity::RotateResult>> {
    Ok(Json(identity::rotate_key(&state, &principal).await?))
}

/// `GET /v1/agents` — live agents with presence.
pub async fn list_agents(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<identity::AgentListing>>> {
    Ok(Json(identity::list_agents(&state, &principal).await?))
}

/// `POST /v1/agents/heartbeat`.
pub async fn heartbeat(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<presence::HeartbeatResult>> {
    Ok(Json(presence::heartbeat(&state, &principal)?))
}

/// `GET /v1/agents/alias-suggestion`.
pub async fn alias_suggestion(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<serde_json::Value>> {
    let alias = identity::suggest_alias(&state, &principal.project_id).await?;
    Ok(Json(serde_json::json!({ "alias": alias })))
}

/// `POST /v1/agents/retire`.
pub async fn retire(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<serde_json::Value>> {
    identity::retire(&state, &principal).await?;
    Ok(Json(serde_json::json!({ "status": "retired" })))
}

/// `POST /v1/agents/deregister`.
pub async fn deregister(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<serde_json::Value>> {
    identity::deregister(&state, &principal).await?;
    Ok(Json(serde_json::json!({ "status": "deregistered" })))
}

/// Request body for `POST /v1/agents/access-mode`.
#[derive(Debug, Deserialize)]
pub struct AccessModeBody {
    /// New access mode for the acting agent.
    pub access_mode: AccessMode,
}

/// `POST /v1/agents/access-mode`.
pub async fn access_mode(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(body): Json<AccessModeBody>,
) -> Result<Json<serde_json::Value>> {
    identity::set_access_mode(&state, &principal, body.access_mode).await?;
    Ok(Json(serde_json::json!({ "status": "updated" })))
}

/// `GET /v1/contacts`.
pub async fn list_contacts(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<crate::models::contact::Contact>>> {
    Ok(Json(identity::list_contacts(&state, &principal).await?))
}

/// Request body for `POST /v1/contacts`.
#[derive(Debug, Deserialize)]
pub struct AddContactBody {
    /// Address to admit.
    pub contact_address: String,
}

/// `POST /v1/contacts`.
pub async fn add_contact(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(body): Json<AddContactBody>,
) -> Result<Json<serde_json::Value>> {
    identity::add_contact(&state, &principal, &body.contact_address).await?;
    Ok(Json(serde_json::json!({ "status": "added" })))
}

/// `DELETE /v1/contacts/{address}`.
pub async fn remove_contact(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(address): Path<String>,
) -> Result<Json<serde_json::Value>> {
    identity::remove_contact(&state, &principal, &address).await?;
    Ok(Json(serde_json::json!({ "status": "removed" })))
}
