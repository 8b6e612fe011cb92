//! Ephemeral TTL-keyed KV store.
//!
//! Backs presence heartbeats. Entries expire lazily on read; absence of a
//! key is meaningful (offline) and never treated as an error. Values here
//! are never authoritative for durability.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process TTL KV.
pub struct EphemeralKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl Default for EphemeralKv {
    fn default() -> Self {
        Self::new()
    }
}

impl EphemeralKv {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Store `value` under `key` for `ttl`.
    pub fn put(&self, key: &str, value: &str, ttl: Duration) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                expires_at: Instant::now() + ttl,
            },
        );
        // Opportunistic sweep so dead keys do not accumulate unboundedly.
        let now = Instant::now();
        entries.retain(|_, e| e.expires_at > now);
    }

    /// Fetch a live value. Expired entries read as absent.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Whether a live entry exists for `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove a key.
    pub fn remove(&self, key: &str) {
        let mut entries = match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.remove(key);
    }
}
