//! Mail handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::auth::Principal;
use crate::mail::{self, SendMailParams};
use crate::models::mail::{MailMessage, Priority, SignatureFields};
use crate::state::AppState;
use crate::Result;

/// Request body for `POST /v1/messages`.
#[derive(Debug, Deserialize)]
pub struct SendBody {
    /// Recipient agent id.
    #[serde(default)]
    pub to_agent: Option<String>,
    /// Recipient alias.
    #[serde(default)]
    pub to_alias: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
    /// Sender-declared priority.
    #[serde(default)]
    pub priority: Priority,
    /// Application-supplied conversation thread.
    #[serde(default)]
    pub thread_id: Option<String>,
    /// Signature passthrough fields.
    #[serde(flatten)]
    pub signature: SignatureFields,
}

/// `POST /v1/messages`.
pub async fn send(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(body): Json<SendBody>,
) -> Result<Json<mail::SendMailResult>> {
    let result = mail::send(
        &state,
        &principal,
        SendMailParams {
            to_agent: body.to_agent,
            to_alias: body.to_alias,
            subject: body.subject,
            body: body.body,
            priority: body.priority,
            thread_id: body.thread_id,
            signature: body.signature,
        },
    )
    .await?;
    Ok(Json(result))
}

/// Query parameters for `GET /v1/messages/inbox`.
#[derive(Debug, Deserialize)]
pub struct InboxQuery {
    /// Restrict to unacknowledged rows.
    #[serde(default)]
    pub unread_only: bool,
    /// Maximum rows returned.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

/// `GET /v1/messages/inbox`.
pub async fn inbox(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Query(query): Query<InboxQuery>,
) -> Result<Json<Vec<MailMessage>>> {
    Ok(Json(
        mail::inbox(&state, &principal, query.unread_only, query.limit).await?,
    ))
}

/// `POST /v1/messages/{message_id}/ack`.
pub async fn ack(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(message_id): Path<String>,
) -> Result<Json<mail::AckResult>> {
    Ok(Json(mail::ack(&state, &principal, &message_id).await?))
}
