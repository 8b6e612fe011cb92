//! Chat handlers, including the per-session SSE stream.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use chrono::Utc;
use futures_util::stream::Stream;
use serde::Deserialize;
use tokio::sync::broadcast;

use crate::auth::Principal;
use crate::chat::{self, CreateSessionParams, SendMessageParams};
use crate::events::BusEvent;
use crate::models::chat::ChatMessage;
use crate::models::mail::SignatureFields;
use crate::state::AppState;
use crate::timeutil::fmt_ts;
use crate::{AppError, Result};

/// Request body for `POST /v1/chat/sessions`.
#[derive(Debug, Deserialize)]
pub struct CreateSessionBody {
    /// Destination aliases.
    pub to: Vec<String>,
    /// First message body.
    pub message: String,
    /// Sender departs after this message.
    #[serde(default)]
    pub leaving: bool,
    /// Blocking wait deadline; omit for the default, `0` for fire-and-forget.
    #[serde(default)]
    pub wait_seconds: Option<u64>,
    /// Signature passthrough fields.
    #[serde(flatten)]
    pub signature: SignatureFields,
}

/// `POST /v1/chat/sessions`.
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Json(body): Json<CreateSessionBody>,
) -> Result<Json<chat::CreateSessionResult>> {
    let result = chat::create_session(
        &state,
        &principal,
        CreateSessionParams {
            to: body.to,
            message: body.message,
            leaving: body.leaving,
            wait_seconds: body.wait_seconds,
            signature: body.signature,
        },
    )
    .await?;
    Ok(Json(result))
}

/// `GET /v1/chat/sessions`.
pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<chat::SessionSummary>>> {
    Ok(Json(chat::list_sessions(&state, &principal).await?))
}

/// `GET /v1/chat/pending`.
pub async fn pending(
    State(state): State<Arc<AppState>>,
    principal: Principal,
) -> Result<Json<Vec<chat::PendingRow>>> {
    Ok(Json(chat::pending(&state, &principal).await?))
}

/// Query parameters for `GET /v1/chat/sessions/{id}/messages`.
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    /// Restrict to messages after the caller's receipt.
    #[serde(default)]
    pub unread_only: bool,
    /// Maximum rows returned.
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    100
}

/// `GET /v1/chat/sessions/{session_id}/messages`.
pub async fn history(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(session_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<ChatMessage>>> {
    Ok(Json(
        chat::history(
            &state,
            &principal,
            &session_id,
            query.unread_only,
            query.limit,
        )
        .await?,
    ))
}

/// Request body for `POST /v1/chat/sessions/{id}/messages`.
#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    /// Message body.
    pub message: String,
    /// Control message requesting a wait extension.
    #[serde(default)]
    pub hang_on: bool,
    /// Sender departs after this message.
    #[serde(default)]
    pub leaving: bool,
    /// Blocking wait deadline; omit for the default, `0` for fire-and-forget.
    #[serde(default)]
    pub wait_seconds: Option<u64>,
    /// Signature passthrough fields.
    #[serde(flatten)]
    pub signature: SignatureFields,
}

/// `POST /v1/chat/sessions/{session_id}/messages`.
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(session_id): Path<String>,
    Json(body): Json<SendMessageBody>,
) -> Result<Json<chat::SendMessageResult>> {
    let result = chat::send_message(
        &state,
        &principal,
        &session_id,
        SendMessageParams {
            message: body.message,
            hang_on: body.hang_on,
            leaving: body.leaving,
            wait_seconds: body.wait_seconds,
            signature: body.signature,
        },
    )
    .await?;
    Ok(Json(result))
}

/// Request body for `POST /v1/chat/sessions/{id}/read`.
#[derive(Debug, Deserialize)]
pub struct MarkReadBody {
    /// Message to advance the receipt to.
    pub up_to_message_id: String,
}

/// `POST /v1/chat/sessions/{session_id}/read`.
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(session_id): Path<String>,
    Json(body): Json<MarkReadBody>,
) -> Result<Json<chat::MarkReadResult>> {
    Ok(Json(
        chat::mark_read(&state, &principal, &session_id, &body.up_to_message_id).await?,
    ))
}

/// Query parameters for `GET /v1/chat/sessions/{id}/stream`.
#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    /// RFC 3339 instant the server closes the stream at. Required and
    /// must be in the future.
    pub deadline: String,
}

fn frame_for(event: &BusEvent) -> Option<Event> {
    let payload = match event {
        BusEvent::Message(m) => serde_json::json!({
            "type": "message",
            "session_id": m.session_id,
            "message_id": m.message_id,
            "from_agent": m.from_agent,
            "body": m.body,
            "sender_leaving": m.sender_leaving,
            "hang_on": m.hang_on,
            "extends_wait_seconds": m.extends_wait_seconds,
            "timestamp": fmt_ts(m.timestamp),
        }),
        BusEvent::ReadReceipt(r) => serde_json::json!({
            "type": "read_receipt",
            "session_id": r.session_id,
            "reader_alias": r.reader_alias,
            "extends_wait_seconds": r.extends_wait_seconds,
            "timestamp": fmt_ts(r.timestamp),
        }),
        BusEvent::MailArrived(_) => return None,
    };
    Some(
        Event::default()
            .event(event.frame_name())
            .data(payload.to_string()),
    )
}

/// `GET /v1/chat/sessions/{session_id}/stream` — server-push events.
///
/// Yields `message` and `read_receipt` frames for this session in commit
/// order until the requested deadline, an error, or client disconnect.
pub async fn stream(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    Path(session_id): Path<String>,
    Query(query): Query<StreamQuery>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, Infallible>>>> {
    let agent_id = principal.require_agent()?;
    let session = state
        .chat()
        .fetch_session(&principal.project_id, &session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("no such session".into()))?;
    if !state
        .chat()
        .is_participant(&session.session_id, agent_id)
        .await?
    {
        return Err(AppError::Forbidden(
            "not a participant of this session".into(),
        ));
    }

    let deadline = chrono::DateTime::parse_from_rfc3339(&query.deadline)
        .map_err(|e| AppError::InvalidArgument(format!("invalid deadline: {e}")))?
        .with_timezone(&Utc);
    let now = Utc::now();
    if deadline <= now {
        return Err(AppError::InvalidArgument(
            "stream deadline must be in the future".into(),
        ));
    }
    let deadline_at = tokio::time::Instant::now()
        + (deadline - now).to_std().unwrap_or(Duration::from_millis(0));

    let rx = state.bus.subscribe();
    let stream = futures_util::stream::unfold(
        (rx, session.session_id, deadline_at),
        |(mut rx, session_id, deadline_at)| async move {
            loop {
                tokio::select! {
                    () = tokio::time::sleep_until(deadline_at) => return None,
                    event = rx.recv() => match event {
                        Ok(event) => {
                            if event.session_id() != Some(session_id.as_str()) {
                                continue;
                            }
                            let Some(frame) = frame_for(&event) else {
                                continue;
                            };
                            return Some((Ok(frame), (rx, session_id, deadline_at)));
                        }
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                        Err(broadcast::error::RecvError::Closed) => return None,
                    },
                }
            }
        },
    );

    Ok(Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keepalive"),
    ))
}
