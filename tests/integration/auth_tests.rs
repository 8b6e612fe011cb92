//! Integration tests for bearer authentication.

use aweb::auth::{self, AuthInputs};
use aweb::AppError;

use super::test_helpers::{register, test_state};

fn bearer(token: &str) -> AuthInputs {
    AuthInputs {
        bearer: Some(token.to_owned()),
        ..AuthInputs::default()
    }
}

// ─── valid key resolves the principal ─────────────────────────────────

#[tokio::test]
async fn bearer_token_resolves_project_and_agent() {
    let state = test_state().await;
    let (_, init) = register(&state, "acme", "alice").await;

    let principal = auth::authenticate(&state, &bearer(&init.api_key))
        .await
        .expect("authenticate");
    assert_eq!(principal.project_id, init.project_id);
    assert_eq!(principal.agent_id.as_deref(), Some(init.agent_id.as_str()));
    assert!(principal.api_key_id.is_some());
}

// ─── invalid tokens fail uniformly ────────────────────────────────────

#[tokio::test]
async fn unknown_token_is_unauthenticated() {
    let state = test_state().await;
    register(&state, "acme", "alice").await;

    let err = auth::authenticate(&state, &bearer("aweb_sk_not_a_key"))
        .await
        .expect_err("must fail");
    assert!(matches!(err, AppError::Unauthenticated(_)));
}

#[tokio::test]
async fn missing_token_is_unauthenticated() {
    let state = test_state().await;
    let err = auth::authenticate(&state, &AuthInputs::default())
        .await
        .expect_err("must fail");
    assert!(matches!(err, AppError::Unauthenticated(_)));
}

// ─── prefix knowledge reveals nothing ─────────────────────────────────

#[tokio::test]
async fn key_prefix_alone_does_not_authenticate() {
    let state = test_state().await;
    let (_, init) = register(&state, "acme", "alice").await;

    // A truncated key shares the stored key's prefix but hashes apart.
    let truncated = &init.api_key[..init.api_key.len() - 4];
    let err = auth::authenticate(&state, &bearer(truncated))
        .await
        .expect_err("must fail");
    assert!(matches!(err, AppError::Unauthenticated(_)));
}

// ─── opportunistic bookkeeping ────────────────────────────────────────

#[tokio::test]
async fn successful_auth_stamps_last_used() {
    let state = test_state().await;
    let (_, init) = register(&state, "acme", "alice").await;

    auth::authenticate(&state, &bearer(&init.api_key))
        .await
        .expect("authenticate");

    let key = state
        .api_keys()
        .fetch_active_by_hash(&aweb::models::api_key::hash_key(&init.api_key))
        .await
        .expect("q")
        .expect("row");
    assert!(key.last_used_at.is_some());
}
