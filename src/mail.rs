//! Mail store: send, per-recipient inbox, at-most-once acknowledgment.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::Principal;
use crate::events::{BusEvent, MailArrivedEvent};
use crate::models::agent::{Agent, AgentStatus};
use crate::models::mail::{MailMessage, Priority, SignatureFields};
use crate::state::AppState;
use crate::{AppError, Result};

/// Parameters for sending one message.
#[derive(Debug, Clone)]
pub struct SendMailParams {
    /// Recipient agent id; either this or `to_alias` must be set.
    pub to_agent: Option<String>,
    /// Recipient alias.
    pub to_alias: Option<String>,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
    /// Sender-declared priority.
    pub priority: Priority,
    /// Application-supplied conversation thread.
    pub thread_id: Option<String>,
    /// Signature passthrough fields.
    pub signature: SignatureFields,
}

/// Result of a committed send.
#[derive(Debug, Clone, Serialize)]
pub struct SendMailResult {
    /// Stored message id.
    pub message_id: String,
    /// Commit timestamp.
    pub delivered_at: DateTime<Utc>,
}

/// Result of an acknowledgment.
#[derive(Debug, Clone, Serialize)]
pub struct AckResult {
    /// When the message was (first) acknowledged. A second ack is a
    /// no-op and reports the original timestamp.
    pub acknowledged_at: DateTime<Utc>,
}

async fn resolve_recipient(
    state: &AppState,
    project_id: &str,
    to_agent: Option<&str>,
    to_alias: Option<&str>,
) -> Result<Agent> {
    let found = match (to_agent, to_alias) {
        (Some(id), _) => state.agents().fetch(project_id, id).await?,
        (None, Some(alias)) => state.agents().fetch_by_alias(project_id, alias).await?,
        (None, None) => {
            return Err(AppError::InvalidArgument(
                "either to_agent or to_alias is required".into(),
            ))
        }
    };
    let agent = found.ok_or_else(|| AppError::NotFound("no such recipient".into()))?;
    if agent.status == AgentStatus::Deregistered {
        return Err(AppError::Gone("recipient is deregistered".into()));
    }
    Ok(agent)
}

/// Send a message to a recipient within the principal's project.
///
/// Durable on commit; emits a `mail_arrived` event keyed by the
/// recipient.
///
/// # Errors
///
/// `NOT_FOUND` for missing recipients, `GONE` for deregistered ones,
/// `FORBIDDEN` on a contacts violation.
pub async fn send(
    state: &AppState,
    principal: &Principal,
    params: SendMailParams,
) -> Result<SendMailResult> {
    let agent_id = principal.require_agent()?;
    let sender = state
        .agents()
        .fetch(&principal.project_id, agent_id)
        .await?
        .ok_or_else(|| AppError::NotFound("acting agent no longer exists".into()))?;

    let recipient = resolve_recipient(
        state,
        &principal.project_id,
        params.to_agent.as_deref(),
        params.to_alias.as_deref(),
    )
    .await?;

    if recipient.access_mode == crate::models::agent::AccessMode::ContactsOnly {
        let admitted = state
            .contacts()
            .contains(&principal.project_id, &recipient.agent_id, &sender.alias)
            .await?;
        if !admitted {
            return Err(AppError::Forbidden(format!(
                "agent {:?} accepts contacts only",
                recipient.alias
            )));
        }
    }

    let msg = MailMessage::new(
        principal.project_id.clone(),
        sender.agent_id.clone(),
        recipient.agent_id.clone(),
        sender.alias.clone(),
        params.subject,
        params.body,
        params.priority,
        params.thread_id,
        params.signature,
    );
    state.mail().insert(&msg).await?;

    state.bus.publish(BusEvent::MailArrived(MailArrivedEvent {
        project_id: principal.project_id.clone(),
        to_agent_id: recipient.agent_id,
        message_id: msg.message_id.clone(),
        timestamp: msg.created_at,
    }));

    Ok(SendMailResult {
        message_id: msg.message_id,
        delivered_at: msg.created_at,
    })
}

/// The caller's inbox, newest first.
///
/// # Errors
///
/// Returns `AppError::Db` on store failures.
pub async fn inbox(
    state: &AppState,
    principal: &Principal,
    unread_only: bool,
    limit: u32,
) -> Result<Vec<MailMessage>> {
    let agent_id = principal.require_agent()?;
    state
        .mail()
        .inbox(&principal.project_id, agent_id, unread_only, limit)
        .await
}

/// Acknowledge a message. At-most-once: the first ack sets `read_at`,
/// a second ack is an idempotent no-op reporting the original timestamp.
///
/// # Errors
///
/// `NOT_FOUND` when the message does not exist for this recipient.
pub async fn ack(state: &AppState, principal: &Principal, message_id: &str) -> Result<AckResult> {
    let agent_id = principal.require_agent()?;
    let now = Utc::now();

    let transitioned = state
        .mail()
        .mark_read(&principal.project_id, message_id, agent_id, now)
        .await?;
    if transitioned {
        return Ok(AckResult {
            acknowledged_at: now,
        });
    }

    // No transition: either already acked (idempotent no-op) or not ours.
    let msg = state
        .mail()
        .fetch(&principal.project_id, message_id)
        .await?
        .filter(|m| m.to_agent_id == agent_id)
        .ok_or_else(|| AppError::NotFound("no such message".into()))?;
    let acknowledged_at = msg
        .read_at
        .ok_or_else(|| AppError::Db("unread message did not transition".into()))?;
    Ok(AckResult { acknowledged_at })
}
