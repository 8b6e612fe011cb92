//! Integration tests for best-effort presence.
//!
//! The test config uses a 1-second heartbeat TTL so expiry is
//! observable without long sleeps.

use std::time::Duration;

use aweb::chat::{self, CreateSessionParams};
use aweb::models::mail::SignatureFields;
use aweb::{identity, presence};

use super::test_helpers::{register, test_state};

// ─── heartbeat and listing ────────────────────────────────────────────

#[tokio::test]
async fn heartbeat_marks_the_agent_online() {
    let state = test_state().await;
    let (alice, init) = register(&state, "acme", "alice").await;

    assert!(!presence::is_online(&state, &init.project_id, &init.agent_id));

    presence::heartbeat(&state, &alice).expect("heartbeat");
    assert!(presence::is_online(&state, &init.project_id, &init.agent_id));

    let listed = identity::list_agents(&state, &alice).await.expect("list");
    let row = listed.iter().find(|a| a.alias == "alice").expect("row");
    assert!(row.online);
}

#[tokio::test]
async fn presence_lapses_after_the_ttl() {
    let state = test_state().await;
    let (alice, init) = register(&state, "acme", "alice").await;

    presence::heartbeat(&state, &alice).expect("heartbeat");
    tokio::time::sleep(Duration::from_millis(1100)).await;
    assert!(!presence::is_online(&state, &init.project_id, &init.agent_id));
}

// ─── chat surfaces presence without gating on it ──────────────────────

#[tokio::test]
async fn connected_targets_reflect_heartbeats() {
    let state = test_state().await;
    let (alice, _) = register(&state, "acme", "alice").await;
    let (bob, _) = register(&state, "acme", "bob").await;

    presence::heartbeat(&state, &bob).expect("heartbeat");

    let result = chat::create_session(
        &state,
        &alice,
        CreateSessionParams {
            to: vec!["bob".to_owned()],
            message: "hi".to_owned(),
            leaving: false,
            wait_seconds: Some(0),
            signature: SignatureFields::default(),
        },
    )
    .await
    .expect("create");
    assert_eq!(result.targets_connected, vec!["bob".to_owned()]);
    assert!(result.targets_left.is_empty());
}

#[tokio::test]
async fn offline_targets_still_receive_messages() {
    let state = test_state().await;
    let (alice, _) = register(&state, "acme", "alice").await;
    let (bob, _) = register(&state, "acme", "bob").await;

    let result = chat::create_session(
        &state,
        &alice,
        CreateSessionParams {
            to: vec!["bob".to_owned()],
            message: "hi while you are away".to_owned(),
            leaving: false,
            wait_seconds: Some(0),
            signature: SignatureFields::default(),
        },
    )
    .await
    .expect("create");
    assert!(result.targets_connected.is_empty());

    // Delivery is not gated on presence: the message is in history.
    let history = chat::history(&state, &bob, &result.session_id, false, 50)
        .await
        .expect("history");
    assert_eq!(history.len(), 1);
}
