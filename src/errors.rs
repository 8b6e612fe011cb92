//! Error types shared across the application.

use std::fmt::{Display, Formatter};

/// Shared application result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Holder details attached to a reservation conflict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConflictHolder {
    /// Agent currently holding the reservation.
    pub holder_agent_id: String,
    /// Alias of the holding agent.
    pub holder_alias: String,
    /// RFC 3339 expiry of the live reservation.
    pub expires_at: String,
}

/// Application error enumeration covering all domain failure modes.
#[derive(Debug)]
pub enum AppError {
    /// Missing or invalid credentials, or failed proxy-context validation.
    Unauthenticated(String),
    /// Authenticated but not permitted to act on the target.
    Forbidden(String),
    /// Target entity absent or outside the caller's project scope.
    NotFound(String),
    /// Resource held by another live owner. Carries holder details when
    /// the conflict is a reservation.
    Conflict {
        /// Human-readable conflict description.
        message: String,
        /// Current reservation holder, when applicable.
        holder: Option<ConflictHolder>,
    },
    /// Malformed or out-of-range request field.
    InvalidArgument(String),
    /// Target agent is retired or deregistered and policy forbids the call.
    Gone(String),
    /// A required ephemeral collaborator (bus, KV) is not serviceable.
    Unavailable(String),
    /// Configuration parsing or validation failure.
    Config(String),
    /// Persistence failure when interacting with `SQLite`.
    Db(String),
}

impl AppError {
    /// Shorthand for a reservation conflict carrying holder details.
    #[must_use]
    pub fn held_by(holder: ConflictHolder) -> Self {
        Self::Conflict {
            message: format!(
                "resource held by {} until {}",
                holder.holder_alias, holder.expires_at
            ),
            holder: Some(holder),
        }
    }

    /// Shorthand for a conflict without holder details.
    #[must_use]
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
            holder: None,
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unauthenticated(msg) => write!(f, "unauthenticated: {msg}"),
            Self::Forbidden(msg) => write!(f, "forbidden: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Conflict { message, .. } => write!(f, "conflict: {message}"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Gone(msg) => write!(f, "gone: {msg}"),
            Self::Unavailable(msg) => write!(f, "unavailable: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Db(msg) => write!(f, "db: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        Self::Db(err.to_string())
    }
}
