//! Unit tests for domain models and their invariants.

use aweb::models::agent::{validate_alias, Agent, AgentStatus};
use aweb::models::api_key::{hash_key, mint_key, KEY_PREFIX};
use aweb::models::mail::{parse_priority, priority_str, Priority};
use aweb::models::reservation::Reservation;
use chrono::Utc;

// ─── alias validation ─────────────────────────────────────────────────

#[test]
fn alias_with_slash_is_rejected() {
    assert!(validate_alias("team/alice").is_err());
}

#[test]
fn empty_alias_is_rejected() {
    assert!(validate_alias("").is_err());
}

#[test]
fn alias_with_control_character_is_rejected() {
    assert!(validate_alias("ali\nce").is_err());
}

#[test]
fn overlong_alias_is_rejected() {
    assert!(validate_alias(&"x".repeat(129)).is_err());
}

#[test]
fn ordinary_alias_is_accepted() {
    assert!(validate_alias("alice").is_ok());
    assert!(validate_alias("bold-falcon-7").is_ok());
}

// ─── agent construction ───────────────────────────────────────────────

#[test]
fn new_agent_is_active_and_live() {
    let agent = Agent::new("p1".into(), "alice".into(), None, None);
    assert_eq!(agent.status, AgentStatus::Active);
    assert!(agent.is_live());
    assert_eq!(agent.project_id, "p1");
}

// ─── api keys ─────────────────────────────────────────────────────────

#[test]
fn minted_keys_carry_prefix_and_are_unique() {
    let a = mint_key();
    let b = mint_key();
    assert!(a.starts_with(KEY_PREFIX));
    assert_ne!(a, b);
}

#[test]
fn key_digest_is_stable_and_full_key() {
    let key = "aweb_sk_example";
    assert_eq!(hash_key(key), hash_key(key));
    // Prefix alone must not collide with the full key digest.
    assert_ne!(hash_key(key), hash_key(KEY_PREFIX));
}

// ─── mail priority codec ──────────────────────────────────────────────

#[test]
fn priority_codec_round_trips() {
    for p in [
        Priority::Low,
        Priority::Normal,
        Priority::High,
        Priority::Urgent,
    ] {
        assert_eq!(parse_priority(priority_str(p)), Some(p));
    }
    assert_eq!(parse_priority("asap"), None);
}

// ─── reservation liveness ─────────────────────────────────────────────

#[test]
fn reservation_liveness_follows_expiry() {
    let now = Utc::now();
    let lease = Reservation {
        project_id: "p1".into(),
        resource_key: "build/main".into(),
        holder_agent_id: "a1".into(),
        holder_alias: "alice".into(),
        acquired_at: now,
        expires_at: now + chrono::Duration::seconds(60),
        metadata: serde_json::json!({}),
    };
    assert!(lease.is_live(now));
    assert!(!lease.is_live(now + chrono::Duration::seconds(61)));
    assert_eq!(lease.remaining_seconds(now + chrono::Duration::seconds(120)), 0);
}
