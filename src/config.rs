//! Global configuration parsing and validation.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::{AppError, Result};

/// Proxy-trust settings for deployments behind a trusted gateway.
///
/// When enabled, requests authenticate via a signed internal context
/// instead of bearer tokens; bearer fallback is disabled terminally.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ProxyTrustConfig {
    /// Whether proxy-trust authentication is active.
    #[serde(default)]
    pub enabled: bool,
    /// Shared secret used to verify the proxy context signature.
    #[serde(default)]
    pub signing_secret: String,
}

impl Default for ProxyTrustConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            signing_secret: String::new(),
        }
    }
}

/// Configurable deadlines (seconds) for blocking chat interactions.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct TimeoutConfig {
    /// Default wait deadline when opening a conversation.
    pub conversation_start_wait_seconds: u64,
    /// Default wait deadline for an in-session send.
    pub quick_send_wait_seconds: u64,
    /// Extension granted by a hang-on message or a read receipt.
    pub wait_extension_seconds: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            conversation_start_wait_seconds: 120,
            quick_send_wait_seconds: 60,
            wait_extension_seconds: 300,
        }
    }
}

/// Reservation lease TTL settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct ReservationConfig {
    /// TTL applied when the acquire request omits one.
    pub default_ttl_seconds: u64,
    /// Ceiling that requested TTLs are clamped to.
    pub max_ttl_seconds: u64,
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self {
            default_ttl_seconds: 3600,
            max_ttl_seconds: 86_400,
        }
    }
}

/// Presence heartbeat settings.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", default)]
pub struct PresenceConfig {
    /// TTL for a heartbeat entry; absence of the key means offline.
    pub heartbeat_ttl_seconds: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            heartbeat_ttl_seconds: 120,
        }
    }
}

/// Global configuration parsed from `config.toml`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct GlobalConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// HTTP port for the REST/SSE surface.
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    /// Durable-store connection string (`SQLite` path or `sqlite::memory:`).
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Proxy-trust authentication settings.
    #[serde(default)]
    pub proxy_trust: ProxyTrustConfig,
    /// Blocking-wait deadlines.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    /// Reservation lease TTLs.
    #[serde(default)]
    pub reservations: ReservationConfig,
    /// Presence heartbeat TTL.
    #[serde(default)]
    pub presence: PresenceConfig,
}

fn default_listen_addr() -> String {
    "127.0.0.1".to_owned()
}

fn default_http_port() -> u16 {
    8420
}

fn default_database_path() -> String {
    "aweb.db".to_owned()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            http_port: default_http_port(),
            database_path: default_database_path(),
            proxy_trust: ProxyTrustConfig::default(),
            timeouts: TimeoutConfig::default(),
            reservations: ReservationConfig::default(),
            presence: PresenceConfig::default(),
        }
    }
}

impl GlobalConfig {
    /// Load and validate configuration from a TOML file path.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the file cannot be read or contains
    /// invalid TOML, or if validation fails.
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .map_err(|err| AppError::Config(format!("failed to read config: {err}")))?;
        Self::from_toml_str(&raw)
    }

    /// Parse configuration from a TOML string and validate it.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if parsing or validation fails.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.proxy_trust.enabled && self.proxy_trust.signing_secret.is_empty() {
            return Err(AppError::Config(
                "proxy_trust.signing_secret is required when proxy trust is enabled".into(),
            ));
        }

        if self.timeouts.wait_extension_seconds == 0 {
            return Err(AppError::Config(
                "timeouts.wait_extension_seconds must be greater than zero".into(),
            ));
        }

        if self.reservations.default_ttl_seconds == 0 {
            return Err(AppError::Config(
                "reservations.default_ttl_seconds must be greater than zero".into(),
            ));
        }

        if self.reservations.max_ttl_seconds < self.reservations.default_ttl_seconds {
            return Err(AppError::Config(
                "reservations.max_ttl_seconds must be at least default_ttl_seconds".into(),
            ));
        }

        if self.presence.heartbeat_ttl_seconds == 0 {
            return Err(AppError::Config(
                "presence.heartbeat_ttl_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }
}
