//! Chat engine: sessions, messages, read receipts, and blocking sends.
//!
//! The hard contracts live here: create-or-reuse session idempotency on
//! the canonical participant set, blocking send-and-wait with hang-on and
//! read-receipt extensions, and commit-ordered fan-out to streams.

pub mod hash;
pub mod waiter;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::auth::Principal;
use crate::events::{BusEvent, MessageEvent, ReadReceiptEvent};
use crate::models::agent::{Agent, AgentStatus};
use crate::models::chat::{ChatMessage, ChatParticipant, ChatSession};
use crate::models::mail::SignatureFields;
use crate::presence;
use crate::state::AppState;
use crate::{AppError, Result};

use self::waiter::{wait_for_reply, WaitOutcome};

/// Parameters for opening (or reusing) a session with a first message.
#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    /// Destination aliases within the project.
    pub to: Vec<String>,
    /// First message body.
    pub message: String,
    /// Sender departs after this message.
    pub leaving: bool,
    /// Blocking wait deadline; `None` uses the conversation-start
    /// default, `0` returns immediately.
    pub wait_seconds: Option<u64>,
    /// Signature passthrough fields.
    pub signature: SignatureFields,
}

/// Parameters for an in-session send.
#[derive(Debug, Clone)]
pub struct SendMessageParams {
    /// Message body.
    pub message: String,
    /// Control message requesting a wait extension for blocked peers.
    pub hang_on: bool,
    /// Sender departs after this message.
    pub leaving: bool,
    /// Blocking wait deadline; `None` uses the quick-send default
    /// (`0` for hang-on or leaving sends), `0` returns immediately.
    pub wait_seconds: Option<u64>,
    /// Signature passthrough fields.
    pub signature: SignatureFields,
}

/// Blocking-send resolution, flattened into send responses.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WaitReply {
    /// `sent`, `replied`, `sender_left`, or `timeout`.
    pub status: String,
    /// Reply body for `replied` / `sender_left`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    /// Replying agent alias.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_from: Option<String>,
}

impl WaitReply {
    fn sent() -> Self {
        Self {
            status: "sent".to_owned(),
            reply: None,
            reply_from: None,
        }
    }

    fn from_outcome(outcome: WaitOutcome) -> Result<Self> {
        match outcome {
            WaitOutcome::Replied { from, body } => Ok(Self {
                status: "replied".to_owned(),
                reply: Some(body),
                reply_from: Some(from),
            }),
            WaitOutcome::SenderLeft { from, body } => Ok(Self {
                status: "sender_left".to_owned(),
                reply: Some(body),
                reply_from: Some(from),
            }),
            WaitOutcome::DeadlineReached => Ok(Self {
                status: "timeout".to_owned(),
                reply: None,
                reply_from: None,
            }),
            WaitOutcome::BusClosed => {
                Err(AppError::Unavailable("event bus shut down".into()))
            }
        }
    }
}

/// Result of `create_session`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSessionResult {
    /// Canonical session id (new or reused).
    pub session_id: String,
    /// First message id.
    pub message_id: String,
    /// Canonical participant alias list.
    pub participants: Vec<String>,
    /// Target aliases with a live presence heartbeat.
    pub targets_connected: Vec<String>,
    /// Target aliases that are not active or last spoke while leaving.
    pub targets_left: Vec<String>,
    /// Blocking-send resolution.
    #[serde(flatten)]
    pub wait: WaitReply,
}

/// Result of `send_message`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageResult {
    /// Stored message id.
    pub message_id: String,
    /// Extension granted to blocked waiters; positive only for hang-on.
    pub extends_wait_seconds: u64,
    /// Blocking-send resolution.
    #[serde(flatten)]
    pub wait: WaitReply,
}

/// Result of `mark_read`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MarkReadResult {
    /// Whether the receipt moved.
    pub success: bool,
    /// Messages from other senders newly covered by the advance.
    pub messages_marked: u32,
    /// Extension granted to a blocked sender, when one was waiting.
    pub wait_extended_seconds: u64,
}

/// One row of the pending overview.
#[derive(Debug, Clone, Serialize)]
pub struct PendingRow {
    /// Session id.
    pub session_id: String,
    /// Body of the most recent message.
    pub last_message: Option<String>,
    /// Alias of the most recent sender.
    pub last_from: Option<String>,
    /// Messages from others after the caller's receipt.
    pub unread_count: u32,
    /// Most recent activity (last message, else session creation).
    pub last_activity: DateTime<Utc>,
    /// Whether another participant is blocked awaiting the caller.
    pub sender_waiting: bool,
    /// Seconds until the waiter's effective deadline.
    pub time_remaining_seconds: Option<i64>,
}

/// One row of the session listing.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    /// Session id.
    pub session_id: String,
    /// Participant aliases.
    pub participants: Vec<String>,
    /// Session creation time.
    pub created_at: DateTime<Utc>,
}

/// Resolve a destination alias to a live, addressable agent.
///
/// # Errors
///
/// `NOT_FOUND` for unknown or tombstoned aliases, `GONE` for
/// deregistered agents.
async fn resolve_target(state: &AppState, project_id: &str, alias: &str) -> Result<Agent> {
    let agent = state
        .agents()
        .fetch_by_alias(project_id, alias)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no agent with alias {alias:?}")))?;
    if agent.status == AgentStatus::Deregistered {
        return Err(AppError::Gone(format!("agent {alias:?} is deregistered")));
    }
    Ok(agent)
}

/// Enforce the contacts gate for one destination.
async fn check_contact_gate(state: &AppState, sender: &Agent, target: &Agent) -> Result<()> {
    use crate::models::agent::AccessMode;
    if target.access_mode == AccessMode::ContactsOnly {
        let admitted = state
            .contacts()
            .contains(&target.project_id, &target.agent_id, &sender.alias)
            .await?;
        if !admitted {
            return Err(AppError::Forbidden(format!(
                "agent {:?} accepts contacts only",
                target.alias
            )));
        }
    }
    Ok(())
}

/// Deadline for a blocking send. Waits are capped at a day so absurd
/// requests cannot overflow timestamp arithmetic.
fn wait_deadline(wait_seconds: u64) -> DateTime<Utc> {
    let capped = i64::try_from(wait_seconds.min(86_400)).unwrap_or(86_400);
    Utc::now() + chrono::Duration::seconds(capped)
}

fn publish_message(state: &AppState, msg: &ChatMessage, extends_wait_seconds: u64) {
    state.bus.publish(BusEvent::Message(MessageEvent {
        session_id: msg.session_id.clone(),
        message_id: msg.message_id.clone(),
        from_agent_id: msg.from_agent_id.clone(),
        from_agent: msg.from_alias.clone(),
        body: msg.body.clone(),
        sender_leaving: msg.sender_leaving,
        hang_on: msg.hang_on,
        extends_wait_seconds,
        timestamp: msg.created_at,
    }));
}

/// Create a session with the canonical participant set, or reuse the
/// existing one, and append the first message. Blocks per the wait
/// parameters.
///
/// # Errors
///
/// `FORBIDDEN` without an acting agent or on a contacts violation,
/// `NOT_FOUND`/`GONE` for unresolvable targets, `INVALID_ARGUMENT` when
/// fewer than two distinct agents result.
pub async fn create_session(
    state: &AppState,
    principal: &Principal,
    params: CreateSessionParams,
) -> Result<CreateSessionResult> {
    let agent_id = principal.require_agent()?;
    let sender = state
        .agents()
        .fetch(&principal.project_id, agent_id)
        .await?
        .ok_or_else(|| AppError::NotFound("acting agent no longer exists".into()))?;

    let mut targets: Vec<Agent> = Vec::new();
    for alias in &params.to {
        if *alias == sender.alias {
            continue;
        }
        let target = resolve_target(state, &principal.project_id, alias).await?;
        check_contact_gate(state, &sender, &target).await?;
        if !targets.iter().any(|t| t.agent_id == target.agent_id) {
            targets.push(target);
        }
    }

    if targets.is_empty() {
        return Err(AppError::InvalidArgument(
            "a session needs at least two distinct participants".into(),
        ));
    }

    let mut aliases: Vec<String> = targets.iter().map(|t| t.alias.clone()).collect();
    aliases.push(sender.alias.clone());
    let canonical = hash::canonical_aliases(&aliases);
    let digest = hash::participant_hash(&canonical);

    let candidate = ChatSession::new(principal.project_id.clone(), digest);
    let (session, _created) = state.chat().upsert_session(&candidate).await?;

    let now = Utc::now();
    for member in targets.iter().chain(std::iter::once(&sender)) {
        state
            .chat()
            .add_participant(&ChatParticipant {
                session_id: session.session_id.clone(),
                agent_id: member.agent_id.clone(),
                alias: member.alias.clone(),
                joined_at: now,
            })
            .await?;
    }

    // Subscribe before committing the message so a racing reply cannot
    // fall between commit and subscribe.
    let mut rx = state.bus.subscribe();

    let msg = ChatMessage::new(
        session.session_id.clone(),
        sender.agent_id.clone(),
        sender.alias.clone(),
        params.message,
        params.leaving,
        false,
        params.signature,
    );
    state.chat().insert_message(&msg).await?;

    let mut targets_connected = Vec::new();
    let mut targets_left = Vec::new();
    for target in &targets {
        if presence::is_online(state, &principal.project_id, &target.agent_id) {
            targets_connected.push(target.alias.clone());
        }
        let departed = target.status != AgentStatus::Active
            || state
                .chat()
                .last_message_of_agent(&session.session_id, &target.agent_id)
                .await?
                .is_some_and(|m| m.sender_leaving);
        if departed {
            targets_left.push(target.alias.clone());
        }
    }

    let wait_seconds = params
        .wait_seconds
        .unwrap_or(state.config.timeouts.conversation_start_wait_seconds);

    let wait = if wait_seconds == 0 || params.leaving {
        publish_message(state, &msg, 0);
        WaitReply::sent()
    } else {
        let deadline = wait_deadline(wait_seconds);
        let guard = state
            .waiters
            .register(&session.session_id, &sender.agent_id, deadline);
        publish_message(state, &msg, 0);
        let outcome = wait_for_reply(
            &guard,
            &mut rx,
            &session.session_id,
            &sender.agent_id,
            &msg.message_id,
        )
        .await;
        WaitReply::from_outcome(outcome)?
    };

    Ok(CreateSessionResult {
        session_id: session.session_id,
        message_id: msg.message_id,
        participants: canonical,
        targets_connected,
        targets_left,
        wait,
    })
}

/// Append a message to a session the principal participates in. Blocks
/// per the wait parameters; hang-on messages extend every blocked peer.
///
/// # Errors
///
/// `NOT_FOUND` for an unknown session, `FORBIDDEN` for non-participants.
pub async fn send_message(
    state: &AppState,
    principal: &Principal,
    session_id: &str,
    params: SendMessageParams,
) -> Result<SendMessageResult> {
    let agent_id = principal.require_agent()?;
    let session = state
        .chat()
        .fetch_session(&principal.project_id, session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("no such session".into()))?;
    if !state.chat().is_participant(&session.session_id, agent_id).await? {
        return Err(AppError::Forbidden("not a participant of this session".into()));
    }
    let sender = state
        .agents()
        .fetch(&principal.project_id, agent_id)
        .await?
        .ok_or_else(|| AppError::NotFound("acting agent no longer exists".into()))?;

    let extends_wait_seconds = if params.hang_on {
        state.config.timeouts.wait_extension_seconds
    } else {
        0
    };

    let mut rx = state.bus.subscribe();

    let msg = ChatMessage::new(
        session.session_id.clone(),
        sender.agent_id.clone(),
        sender.alias.clone(),
        params.message,
        params.leaving,
        params.hang_on,
        params.signature,
    );
    state.chat().insert_message(&msg).await?;

    if extends_wait_seconds > 0 {
        state.waiters.extend_others(
            &session.session_id,
            &sender.agent_id,
            Utc::now(),
            extends_wait_seconds,
        );
    }

    let wait_seconds = params.wait_seconds.unwrap_or(if params.hang_on || params.leaving {
        0
    } else {
        state.config.timeouts.quick_send_wait_seconds
    });

    let wait = if wait_seconds == 0 {
        publish_message(state, &msg, extends_wait_seconds);
        WaitReply::sent()
    } else {
        let deadline = wait_deadline(wait_seconds);
        let guard = state
            .waiters
            .register(&session.session_id, &sender.agent_id, deadline);
        publish_message(state, &msg, extends_wait_seconds);
        let outcome = wait_for_reply(
            &guard,
            &mut rx,
            &session.session_id,
            &sender.agent_id,
            &msg.message_id,
        )
        .await;
        WaitReply::from_outcome(outcome)?
    };

    Ok(SendMessageResult {
        message_id: msg.message_id,
        extends_wait_seconds,
        wait,
    })
}

/// Session history in commit order.
///
/// `unread_only` returns messages past the caller's receipt position
/// (the commit time of the last message marked read), or everything when
/// no receipt exists.
///
/// # Errors
///
/// `NOT_FOUND` for an unknown session, `FORBIDDEN` for non-participants.
pub async fn history(
    state: &AppState,
    principal: &Principal,
    session_id: &str,
    unread_only: bool,
    limit: u32,
) -> Result<Vec<ChatMessage>> {
    let agent_id = principal.require_agent()?;
    let session = state
        .chat()
        .fetch_session(&principal.project_id, session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("no such session".into()))?;
    if !state.chat().is_participant(&session.session_id, agent_id).await? {
        return Err(AppError::Forbidden("not a participant of this session".into()));
    }

    let mut after = None;
    if unread_only {
        let receipt = state.chat().receipt(&session.session_id, agent_id).await?;
        if let Some(marked_id) = receipt.and_then(|r| r.last_read_message_id) {
            after = state
                .chat()
                .fetch_message(&session.session_id, &marked_id)
                .await?
                .map(|m| m.created_at);
        }
    }

    state.chat().history(&session.session_id, after, limit).await
}

/// Advance the caller's read receipt to `up_to_message_id`.
///
/// Monotone: rolling back reports `messages_marked = 0` and leaves the
/// receipt unchanged. A real advance publishes a `read_receipt` event
/// and extends any blocked sender.
///
/// # Errors
///
/// `NOT_FOUND` for an unknown session or message, `FORBIDDEN` for
/// non-participants.
pub async fn mark_read(
    state: &AppState,
    principal: &Principal,
    session_id: &str,
    up_to_message_id: &str,
) -> Result<MarkReadResult> {
    let agent_id = principal.require_agent()?;
    let session = state
        .chat()
        .fetch_session(&principal.project_id, session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("no such session".into()))?;
    if !state.chat().is_participant(&session.session_id, agent_id).await? {
        return Err(AppError::Forbidden("not a participant of this session".into()));
    }
    let target = state
        .chat()
        .fetch_message(&session.session_id, up_to_message_id)
        .await?
        .ok_or_else(|| AppError::NotFound("no such message in this session".into()))?;
    let reader = state
        .agents()
        .fetch(&principal.project_id, agent_id)
        .await?
        .ok_or_else(|| AppError::NotFound("acting agent no longer exists".into()))?;

    let now = Utc::now();
    let messages_marked = state
        .chat()
        .advance_receipt(&session.session_id, agent_id, &target, now)
        .await?;

    let mut wait_extended_seconds = 0;
    if messages_marked > 0 {
        let extends = state.config.timeouts.wait_extension_seconds;
        if state
            .waiters
            .extend_others(&session.session_id, agent_id, now, extends)
        {
            wait_extended_seconds = extends;
        }
        state.bus.publish(BusEvent::ReadReceipt(ReadReceiptEvent {
            session_id: session.session_id.clone(),
            reader_agent_id: reader.agent_id.clone(),
            reader_alias: reader.alias.clone(),
            extends_wait_seconds: wait_extended_seconds,
            timestamp: now,
        }));
    }

    Ok(MarkReadResult {
        success: messages_marked > 0,
        messages_marked,
        wait_extended_seconds,
    })
}

/// Pending overview: one row per session the caller participates in.
///
/// # Errors
///
/// Returns `AppError::Db` on store failures.
pub async fn pending(state: &AppState, principal: &Principal) -> Result<Vec<PendingRow>> {
    let agent_id = principal.require_agent()?;
    let sessions = state
        .chat()
        .sessions_for_agent(&principal.project_id, agent_id)
        .await?;

    let now = Utc::now();
    let mut rows = Vec::with_capacity(sessions.len());
    for session in sessions {
        let last = state.chat().last_message(&session.session_id).await?;
        let unread_count = state.chat().unread_count(&session.session_id, agent_id).await?;
        let waiting = state.waiters.waiting_against(&session.session_id, agent_id);
        let (sender_waiting, time_remaining_seconds) = match waiting {
            Some((_, deadline)) => (true, Some((deadline - now).num_seconds().max(0))),
            None => (false, None),
        };
        let last_activity = last
            .as_ref()
            .map_or(session.created_at, |m| m.created_at);
        rows.push(PendingRow {
            session_id: session.session_id,
            last_message: last.as_ref().map(|m| m.body.clone()),
            last_from: last.as_ref().map(|m| m.from_alias.clone()),
            unread_count,
            last_activity,
            sender_waiting,
            time_remaining_seconds,
        });
    }
    Ok(rows)
}

/// Sessions the caller participates in, with participant aliases.
///
/// # Errors
///
/// Returns `AppError::Db` on store failures.
pub async fn list_sessions(state: &AppState, principal: &Principal) -> Result<Vec<SessionSummary>> {
    let agent_id = principal.require_agent()?;
    let sessions = state
        .chat()
        .sessions_for_agent(&principal.project_id, agent_id)
        .await?;

    let mut rows = Vec::with_capacity(sessions.len());
    for session in sessions {
        let participants = state
            .chat()
            .participants(&session.session_id)
            .await?
            .into_iter()
            .map(|p| p.alias)
            .collect();
        rows.push(SessionSummary {
            session_id: session.session_id,
            participants,
            created_at: session.created_at,
        });
    }
    Ok(rows)
}
