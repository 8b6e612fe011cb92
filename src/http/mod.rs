//! HTTP/SSE surface.
//!
//! Mounts the `/v1` REST API and the per-session SSE stream behind an
//! axum router. All responses are JSON; errors map onto the transport
//! taxonomy in [`crate::errors`].

pub mod chat_routes;
pub mod extract;
pub mod identity_routes;
pub mod mail_routes;
pub mod reservation_routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::state::AppState;
use crate::{AppError, Result};

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Self::Unauthenticated(_) => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Conflict { .. } => (StatusCode::CONFLICT, "conflict"),
            Self::InvalidArgument(_) => (StatusCode::BAD_REQUEST, "invalid_argument"),
            Self::Gone(_) => (StatusCode::GONE, "gone"),
            Self::Unavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            Self::Config(_) | Self::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        let mut body = serde_json::json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        });
        if let Self::Conflict {
            holder: Some(holder),
            ..
        } = &self
        {
            body["error"]["holder"] = serde_json::json!({
                "holder_agent_id": holder.holder_agent_id,
                "holder_alias": holder.holder_alias,
                "expires_at": holder.expires_at,
            });
        }

        (status, Json(body)).into_response()
    }
}

/// Build the full application router.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/init", post(identity_routes::init))
        .route("/v1/auth/introspect", get(identity_routes::introspect))
        .route("/v1/auth/rotate", post(identity_routes::rotate))
        .route("/v1/agents", get(identity_routes::list_agents))
        .route("/v1/agents/heartbeat", post(identity_routes::heartbeat))
        .route(
            "/v1/agents/alias-suggestion",
            get(identity_routes::alias_suggestion),
        )
        .route("/v1/agents/retire", post(identity_routes::retire))
        .route("/v1/agents/deregister", post(identity_routes::deregister))
        .route("/v1/agents/access-mode", post(identity_routes::access_mode))
        .route(
            "/v1/contacts",
            get(identity_routes::list_contacts).post(identity_routes::add_contact),
        )
        .route(
            "/v1/contacts/{address}",
            delete(identity_routes::remove_contact),
        )
        .route("/v1/messages", post(mail_routes::send))
        .route("/v1/messages/inbox", get(mail_routes::inbox))
        .route("/v1/messages/{message_id}/ack", post(mail_routes::ack))
        .route(
            "/v1/chat/sessions",
            post(chat_routes::create_session).get(chat_routes::list_sessions),
        )
        .route("/v1/chat/pending", get(chat_routes::pending))
        .route(
            "/v1/chat/sessions/{session_id}/messages",
            get(chat_routes::history).post(chat_routes::send_message),
        )
        .route(
            "/v1/chat/sessions/{session_id}/read",
            post(chat_routes::mark_read),
        )
        .route(
            "/v1/chat/sessions/{session_id}/stream",
            get(chat_routes::stream),
        )
        .route(
            "/v1/reservations",
            post(reservation_routes::acquire).get(reservation_routes::list),
        )
        .route("/v1/reservations/renew", post(reservation_routes::renew))
        .route(
            "/v1/reservations/release",
            post(reservation_routes::release),
        )
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

/// Serve the REST/SSE surface until cancellation.
///
/// # Errors
///
/// Returns `AppError::Config` if the listener fails to bind or the
/// server errors out.
pub async fn serve(state: Arc<AppState>, ct: CancellationToken) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.config.listen_addr, state.config.http_port)
        .parse()
        .map_err(|err| AppError::Config(format!("invalid listen address: {err}")))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Config(format!("failed to bind {addr}: {err}")))?;
    let bound = listener
        .local_addr()
        .map_err(|err| AppError::Config(format!("listener address: {err}")))?;

    info!(%bound, "starting HTTP/SSE surface");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            ct.cancelled().await;
        })
        .await
        .map_err(|err| AppError::Config(format!("http server error: {err}")))?;

    info!("HTTP/SSE surface shut down");
    Ok(())
}

/// Serve on an already-bound listener. Used by tests that need an
/// ephemeral port.
///
/// # Errors
///
/// Returns `AppError::Config` if the server errors out.
pub async fn serve_on(
    state: Arc<AppState>,
    listener: tokio::net::TcpListener,
    ct: CancellationToken,
) -> Result<()> {
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            ct.cancelled().await;
        })
        .await
        .map_err(|err| AppError::Config(format!("http server error: {err}")))?;
    Ok(())
}
