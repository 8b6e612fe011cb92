//! Integration tests for the reservation lease manager.

use aweb::models::reservation::Reservation;
use aweb::reservations;
use aweb::AppError;
use chrono::{Duration, Utc};

use super::test_helpers::{register, test_state};

// ─── acquire and conflict ─────────────────────────────────────────────

#[tokio::test]
async fn acquire_grants_and_names_the_holder() {
    let state = test_state().await;
    let (alice, _) = register(&state, "acme", "alice").await;

    let granted = reservations::acquire(
        &state,
        &alice,
        "build/main",
        Some(60),
        serde_json::json!({"reason": "release prep"}),
    )
    .await
    .expect("acquire");

    assert_eq!(granted.holder_alias, "alice");
    assert_eq!(granted.resource_key, "build/main");
    let ttl = (granted.expires_at - granted.acquired_at).num_seconds();
    assert_eq!(ttl, 60);
}

#[tokio::test]
async fn conflicting_acquire_reports_the_current_holder() {
    let state = test_state().await;
    let (alice, _) = register(&state, "acme", "alice").await;
    let (bob, _) = register(&state, "acme", "bob").await;

    reservations::acquire(&state, &alice, "build/main", Some(60), serde_json::json!({}))
        .await
        .expect("alice");

    let err = reservations::acquire(&state, &bob, "build/main", Some(60), serde_json::json!({}))
        .await
        .expect_err("bob must lose");
    let AppError::Conflict { holder, .. } = err else {
        panic!("expected conflict");
    };
    assert_eq!(holder.expect("holder").holder_alias, "alice");
}

#[tokio::test]
async fn expired_lease_is_overwritten_by_the_next_acquirer() {
    let state = test_state().await;
    let (alice, _) = register(&state, "acme", "alice").await;
    let (bob, _) = register(&state, "acme", "bob").await;

    // Plant an already-expired row held by alice.
    let now = Utc::now();
    state
        .reservations()
        .try_acquire(&Reservation {
            project_id: alice.project_id.clone(),
            resource_key: "build/main".to_owned(),
            holder_agent_id: alice.agent_id.clone().expect("agent"),
            holder_alias: "alice".to_owned(),
            acquired_at: now - Duration::seconds(120),
            expires_at: now - Duration::seconds(60),
            metadata: serde_json::json!({}),
        })
        .await
        .expect("plant");

    let granted = reservations::acquire(&state, &bob, "build/main", Some(60), serde_json::json!({}))
        .await
        .expect("bob overwrites");
    assert_eq!(granted.holder_alias, "bob");
}

#[tokio::test]
async fn ttl_defaults_and_clamps() {
    let state = test_state().await;
    let (alice, _) = register(&state, "acme", "alice").await;

    // Default (60 in the test config).
    let default = reservations::acquire(&state, &alice, "k/default", None, serde_json::json!({}))
        .await
        .expect("default ttl");
    assert_eq!((default.expires_at - default.acquired_at).num_seconds(), 60);

    // Over-ceiling requests clamp to 120.
    let clamped = reservations::acquire(
        &state,
        &alice,
        "k/clamped",
        Some(9999),
        serde_json::json!({}),
    )
    .await
    .expect("clamped ttl");
    assert_eq!((clamped.expires_at - clamped.acquired_at).num_seconds(), 120);
}

#[tokio::test]
async fn empty_key_is_invalid() {
    let state = test_state().await;
    let (alice, _) = register(&state, "acme", "alice").await;

    let err = reservations::acquire(&state, &alice, "", None, serde_json::json!({}))
        .await
        .expect_err("must fail");
    assert!(matches!(err, AppError::InvalidArgument(_)));
}

// ─── renew ────────────────────────────────────────────────────────────

#[tokio::test]
async fn holder_renews_and_others_are_forbidden() {
    let state = test_state().await;
    let (alice, _) = register(&state, "acme", "alice").await;
    let (bob, _) = register(&state, "acme", "bob").await;

    let granted = reservations::acquire(&state, &alice, "build/main", Some(30), serde_json::json!({}))
        .await
        .expect("acquire");

    let renewed = reservations::renew(&state, &alice, "build/main", Some(90))
        .await
        .expect("renew");
    assert!(renewed.expires_at > granted.expires_at);

    let err = reservations::renew(&state, &bob, "build/main", Some(90))
        .await
        .expect_err("non-holder");
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn renew_of_absent_or_expired_is_not_found() {
    let state = test_state().await;
    let (alice, _) = register(&state, "acme", "alice").await;

    let err = reservations::renew(&state, &alice, "never/acquired", None)
        .await
        .expect_err("absent");
    assert!(matches!(err, AppError::NotFound(_)));

    // Plant an expired row held by alice herself; renew must still fail.
    let now = Utc::now();
    state
        .reservations()
        .try_acquire(&Reservation {
            project_id: alice.project_id.clone(),
            resource_key: "stale/key".to_owned(),
            holder_agent_id: alice.agent_id.clone().expect("agent"),
            holder_alias: "alice".to_owned(),
            acquired_at: now - Duration::seconds(120),
            expires_at: now - Duration::seconds(60),
            metadata: serde_json::json!({}),
        })
        .await
        .expect("plant");

    let err = reservations::renew(&state, &alice, "stale/key", None)
        .await
        .expect_err("expired");
    assert!(matches!(err, AppError::NotFound(_)));
}

// ─── release and liveness ─────────────────────────────────────────────

#[tokio::test]
async fn release_then_anyone_acquires() {
    let state = test_state().await;
    let (alice, _) = register(&state, "acme", "alice").await;
    let (bob, _) = register(&state, "acme", "bob").await;

    reservations::acquire(&state, &alice, "build/main", Some(60), serde_json::json!({}))
        .await
        .expect("acquire");

    let released = reservations::release(&state, &alice, "build/main")
        .await
        .expect("release");
    assert!(released.released);

    reservations::acquire(&state, &bob, "build/main", Some(60), serde_json::json!({}))
        .await
        .expect("liveness after release");
}

#[tokio::test]
async fn non_holder_release_of_a_live_lease_is_forbidden() {
    let state = test_state().await;
    let (alice, _) = register(&state, "acme", "alice").await;
    let (bob, _) = register(&state, "acme", "bob").await;

    reservations::acquire(&state, &alice, "build/main", Some(60), serde_json::json!({}))
        .await
        .expect("acquire");

    let err = reservations::release(&state, &bob, "build/main")
        .await
        .expect_err("must fail");
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn releasing_nothing_is_a_no_op() {
    let state = test_state().await;
    let (alice, _) = register(&state, "acme", "alice").await;

    let released = reservations::release(&state, &alice, "never/held")
        .await
        .expect("no-op");
    assert!(!released.released);
}

// ─── listing ──────────────────────────────────────────────────────────

#[tokio::test]
async fn list_filters_by_prefix_and_project() {
    let state = test_state().await;
    let (alice, _) = register(&state, "acme", "alice").await;
    let (eve, _) = register(&state, "rival", "eve").await;

    reservations::acquire(&state, &alice, "build/main", Some(60), serde_json::json!({}))
        .await
        .expect("a");
    reservations::acquire(&state, &alice, "deploy/prod", Some(60), serde_json::json!({}))
        .await
        .expect("b");
    reservations::acquire(&state, &eve, "build/main", Some(60), serde_json::json!({}))
        .await
        .expect("other project, same key");

    let build = reservations::list(&state, &alice, Some("build/"))
        .await
        .expect("list");
    assert_eq!(build.len(), 1);
    assert_eq!(build[0].resource_key, "build/main");
    assert_eq!(build[0].holder_alias, "alice");

    let all = reservations::list(&state, &alice, None).await.expect("list");
    assert_eq!(all.len(), 2);
}
