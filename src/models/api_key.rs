//! API key model and digest helpers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Prefix carried by every minted key. Cosmetic only — authentication
/// hashes the full key and never consults a prefix index.
pub const KEY_PREFIX: &str = "aweb_sk_";

/// API key record. The plaintext key is returned exactly once at mint
/// time; only the full-key digest is stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub struct ApiKey {
    /// Stable identifier.
    pub api_key_id: String,
    /// Owning project.
    pub project_id: String,
    /// Bound agent; keys without one authenticate a project only.
    pub agent_id: Option<String>,
    /// SHA-256 digest of the full key, hex-encoded.
    pub key_hash: String,
    /// Whether the key currently authenticates.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last successful authentication, updated opportunistically.
    pub last_used_at: Option<DateTime<Utc>>,
}

impl ApiKey {
    /// Construct an active key record for an already-hashed secret.
    #[must_use]
    pub fn new(project_id: String, agent_id: Option<String>, key_hash: String) -> Self {
        Self {
            api_key_id: Uuid::new_v4().to_string(),
            project_id,
            agent_id,
            key_hash,
            is_active: true,
            created_at: Utc::now(),
            last_used_at: None,
        }
    }
}

/// Mint a fresh plaintext key.
#[must_use]
pub fn mint_key() -> String {
    let a = Uuid::new_v4().simple().to_string();
    let b = Uuid::new_v4().simple().to_string();
    format!("{KEY_PREFIX}{a}{b}")
}

/// Digest a full key for storage or lookup.
#[must_use]
pub fn hash_key(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}
