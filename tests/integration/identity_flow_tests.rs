//! Integration tests for bootstrap, introspection, rotation, and the
//! agent lifecycle.

use aweb::identity::{self, InitParams};
use aweb::models::agent::AgentStatus;
use aweb::{auth, AppError};

use super::test_helpers::{register, test_state};

// ─── init ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn init_creates_project_agent_and_key() {
    let state = test_state().await;
    let (_, init) = register(&state, "acme", "alice").await;

    assert!(init.api_key.starts_with("aweb_sk_"));
    assert_eq!(init.alias, "alice");

    let project = state
        .projects()
        .fetch(&init.project_id)
        .await
        .expect("q")
        .expect("row");
    assert_eq!(project.slug, "acme");
}

#[tokio::test]
async fn second_init_reuses_the_project() {
    let state = test_state().await;
    let (_, a) = register(&state, "acme", "alice").await;
    let (_, b) = register(&state, "acme", "bob").await;
    assert_eq!(a.project_id, b.project_id);
}

#[tokio::test]
async fn taken_alias_conflicts() {
    let state = test_state().await;
    register(&state, "acme", "alice").await;

    let err = identity::init(
        &state,
        InitParams {
            project_slug: "acme".to_owned(),
            tenant_id: None,
            alias: Some("alice".to_owned()),
            human_name: None,
            agent_type: None,
        },
    )
    .await
    .expect_err("must conflict");
    assert!(matches!(err, AppError::Conflict { .. }));
}

#[tokio::test]
async fn alias_with_slash_is_rejected_at_init() {
    let state = test_state().await;
    let err = identity::init(
        &state,
        InitParams {
            project_slug: "acme".to_owned(),
            tenant_id: None,
            alias: Some("team/alice".to_owned()),
            human_name: None,
            agent_type: None,
        },
    )
    .await
    .expect_err("must reject");
    assert!(matches!(err, AppError::InvalidArgument(_)));
}

#[tokio::test]
async fn omitted_alias_is_generated() {
    let state = test_state().await;
    let init = identity::init(
        &state,
        InitParams {
            project_slug: "acme".to_owned(),
            tenant_id: None,
            alias: None,
            human_name: None,
            agent_type: None,
        },
    )
    .await
    .expect("init");
    assert!(!init.alias.is_empty());
    assert!(!init.alias.contains('/'));
}

// ─── introspection ────────────────────────────────────────────────────

#[tokio::test]
async fn introspect_echoes_the_acting_agent() {
    let state = test_state().await;
    let init = identity::init(
        &state,
        InitParams {
            project_slug: "acme".to_owned(),
            tenant_id: None,
            alias: Some("alice".to_owned()),
            human_name: Some("Alice".to_owned()),
            agent_type: Some("claude".to_owned()),
        },
    )
    .await
    .expect("init");

    let principal = aweb::auth::Principal {
        project_id: init.project_id.clone(),
        agent_id: Some(init.agent_id.clone()),
        api_key_id: None,
    };
    let who = identity::introspect(&state, &principal).await.expect("introspect");
    assert_eq!(who.alias.as_deref(), Some("alice"));
    assert_eq!(who.human_name.as_deref(), Some("Alice"));
    assert_eq!(who.agent_type.as_deref(), Some("claude"));
}

// ─── rotation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn rotation_swaps_the_active_key_and_keeps_the_agent() {
    let state = test_state().await;
    let (principal, init) = register(&state, "acme", "alice").await;

    let rotated = identity::rotate_key(&state, &principal).await.expect("rotate");
    assert_eq!(rotated.rotated_out, 1);
    assert_ne!(rotated.api_key, init.api_key);

    // Old key no longer authenticates; the new one resolves the same agent.
    let old = auth::authenticate(
        &state,
        &aweb::auth::AuthInputs {
            bearer: Some(init.api_key.clone()),
            ..aweb::auth::AuthInputs::default()
        },
    )
    .await;
    assert!(old.is_err());

    let fresh = auth::authenticate(
        &state,
        &aweb::auth::AuthInputs {
            bearer: Some(rotated.api_key.clone()),
            ..aweb::auth::AuthInputs::default()
        },
    )
    .await
    .expect("new key");
    assert_eq!(fresh.agent_id.as_deref(), Some(init.agent_id.as_str()));
}

// ─── lifecycle ────────────────────────────────────────────────────────

#[tokio::test]
async fn retire_keeps_the_agent_addressable() {
    let state = test_state().await;
    let (principal, init) = register(&state, "acme", "alice").await;

    identity::retire(&state, &principal).await.expect("retire");
    let agent = state
        .agents()
        .fetch(&init.project_id, &init.agent_id)
        .await
        .expect("q")
        .expect("row");
    assert_eq!(agent.status, AgentStatus::Retired);
}

#[tokio::test]
async fn deregister_deactivates_keys() {
    let state = test_state().await;
    let (principal, init) = register(&state, "acme", "alice").await;

    identity::deregister(&state, &principal).await.expect("deregister");

    let err = auth::authenticate(
        &state,
        &aweb::auth::AuthInputs {
            bearer: Some(init.api_key.clone()),
            ..aweb::auth::AuthInputs::default()
        },
    )
    .await
    .expect_err("key must be dead");
    assert!(matches!(err, AppError::Unauthenticated(_)));
}

// ─── alias suggestion ─────────────────────────────────────────────────

#[tokio::test]
async fn suggestions_avoid_taken_aliases() {
    let state = test_state().await;
    let (principal, _) = register(&state, "acme", "alice").await;

    let suggested = identity::suggest_alias(&state, &principal.project_id)
        .await
        .expect("suggest");
    assert!(state
        .agents()
        .fetch_by_alias(&principal.project_id, &suggested)
        .await
        .expect("q")
        .is_none());
}

// ─── contacts ─────────────────────────────────────────────────────────

#[tokio::test]
async fn contact_set_round_trips() {
    let state = test_state().await;
    let (principal, _) = register(&state, "acme", "alice").await;

    identity::add_contact(&state, &principal, "bob").await.expect("add");
    identity::add_contact(&state, &principal, "bob").await.expect("idempotent");

    let listed = identity::list_contacts(&state, &principal).await.expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].contact_address, "bob");

    identity::remove_contact(&state, &principal, "bob").await.expect("remove");
    let err = identity::remove_contact(&state, &principal, "bob")
        .await
        .expect_err("second remove");
    assert!(matches!(err, AppError::NotFound(_)));
}
