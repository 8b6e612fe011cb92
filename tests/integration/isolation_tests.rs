//! Integration tests for cross-project isolation.
//!
//! Projects are hard boundaries: no lookup, listing, or mutation may
//! cross them, even when identifiers collide.

use aweb::chat::{self, CreateSessionParams, SendMessageParams};
use aweb::mail::{self, SendMailParams};
use aweb::models::mail::{Priority, SignatureFields};
use aweb::AppError;

use super::test_helpers::{register, test_state};

// ─── mail ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn inbox_is_scoped_to_the_principal_project() {
    let state = test_state().await;
    let (p_alice, _) = register(&state, "project-p", "alice").await;
    let (p_bob, _) = register(&state, "project-p", "bob").await;
    let (q_alice, _) = register(&state, "project-q", "alice").await;
    let (q_bob, _) = register(&state, "project-q", "bob").await;

    mail::send(
        &state,
        &q_alice,
        SendMailParams {
            to_agent: None,
            to_alias: Some("bob".to_owned()),
            subject: "q internal".to_owned(),
            body: "for q's bob only".to_owned(),
            priority: Priority::Normal,
            thread_id: None,
            signature: SignatureFields::default(),
        },
    )
    .await
    .expect("send within q");

    // P's bob sees nothing; Q's bob sees the message.
    assert!(mail::inbox(&state, &p_bob, false, 50).await.expect("p inbox").is_empty());
    assert_eq!(mail::inbox(&state, &q_bob, false, 50).await.expect("q inbox").len(), 1);

    // P's alice cannot address Q's agents beyond alias collision either:
    // the alias resolves within P only.
    let sent = mail::send(
        &state,
        &p_alice,
        SendMailParams {
            to_agent: None,
            to_alias: Some("bob".to_owned()),
            subject: "p internal".to_owned(),
            body: "for p's bob".to_owned(),
            priority: Priority::Normal,
            thread_id: None,
            signature: SignatureFields::default(),
        },
    )
    .await
    .expect("send within p");
    let q_inbox = mail::inbox(&state, &q_bob, false, 50).await.expect("q inbox");
    assert!(q_inbox.iter().all(|m| m.message_id != sent.message_id));
}

#[tokio::test]
async fn ack_cannot_cross_projects() {
    let state = test_state().await;
    let (p_alice, _) = register(&state, "project-p", "alice").await;
    register(&state, "project-p", "bob").await;
    let (q_bob, _) = register(&state, "project-q", "bob").await;

    let sent = mail::send(
        &state,
        &p_alice,
        SendMailParams {
            to_agent: None,
            to_alias: Some("bob".to_owned()),
            subject: "s".to_owned(),
            body: "b".to_owned(),
            priority: Priority::Normal,
            thread_id: None,
            signature: SignatureFields::default(),
        },
    )
    .await
    .expect("send");

    let err = mail::ack(&state, &q_bob, &sent.message_id)
        .await
        .expect_err("foreign project ack");
    assert!(matches!(err, AppError::NotFound(_)));
}

// ─── chat ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn sessions_are_invisible_across_projects() {
    let state = test_state().await;
    let (p_alice, _) = register(&state, "project-p", "alice").await;
    register(&state, "project-p", "bob").await;
    let (q_alice, _) = register(&state, "project-q", "alice").await;

    let session = chat::create_session(
        &state,
        &p_alice,
        CreateSessionParams {
            to: vec!["bob".to_owned()],
            message: "p talk".to_owned(),
            leaving: false,
            wait_seconds: Some(0),
            signature: SignatureFields::default(),
        },
    )
    .await
    .expect("create in p");

    // Q's alice cannot read, send, or list it.
    let err = chat::history(&state, &q_alice, &session.session_id, false, 50)
        .await
        .expect_err("foreign history");
    assert!(matches!(err, AppError::NotFound(_)));

    let err = chat::send_message(
        &state,
        &q_alice,
        &session.session_id,
        SendMessageParams {
            message: "intrusion".to_owned(),
            hang_on: false,
            leaving: false,
            wait_seconds: Some(0),
            signature: SignatureFields::default(),
        },
    )
    .await
    .expect_err("foreign send");
    assert!(matches!(err, AppError::NotFound(_)));

    assert!(chat::list_sessions(&state, &q_alice).await.expect("list").is_empty());
}

#[tokio::test]
async fn same_participants_in_different_projects_get_distinct_sessions() {
    let state = test_state().await;
    let (p_alice, _) = register(&state, "project-p", "alice").await;
    register(&state, "project-p", "bob").await;
    let (q_alice, _) = register(&state, "project-q", "alice").await;
    register(&state, "project-q", "bob").await;

    let params = || CreateSessionParams {
        to: vec!["bob".to_owned()],
        message: "hi".to_owned(),
        leaving: false,
        wait_seconds: Some(0),
        signature: SignatureFields::default(),
    };
    let p = chat::create_session(&state, &p_alice, params()).await.expect("p");
    let q = chat::create_session(&state, &q_alice, params()).await.expect("q");
    assert_ne!(p.session_id, q.session_id);
}
