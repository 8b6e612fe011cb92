//! Unit tests for `ContactRepo`.

use std::sync::Arc;

use aweb::models::contact::Contact;
use aweb::persistence::{contact_repo::ContactRepo, db};

fn contact(agent_id: &str, address: &str) -> Contact {
    Contact::new("p1".to_owned(), agent_id.to_owned(), address.to_owned())
}

// ─── membership checks ────────────────────────────────────────────────

#[tokio::test]
async fn add_then_contains() {
    let db = db::connect_memory().await.expect("db");
    let repo = ContactRepo::new(Arc::new(db));

    repo.add(&contact("a1", "alice")).await.expect("add");

    assert!(repo.contains("p1", "a1", "alice").await.expect("q"));
    assert!(!repo.contains("p1", "a1", "bob").await.expect("q"));
    assert!(!repo.contains("p2", "a1", "alice").await.expect("q"));
}

#[tokio::test]
async fn add_is_idempotent() {
    let db = db::connect_memory().await.expect("db");
    let repo = ContactRepo::new(Arc::new(db));

    repo.add(&contact("a1", "alice")).await.expect("first");
    repo.add(&contact("a1", "alice")).await.expect("repeat");

    let listed = repo.list("p1", "a1").await.expect("list");
    assert_eq!(listed.len(), 1);
}

// ─── removal ──────────────────────────────────────────────────────────

#[tokio::test]
async fn remove_reports_whether_a_row_existed() {
    let db = db::connect_memory().await.expect("db");
    let repo = ContactRepo::new(Arc::new(db));

    repo.add(&contact("a1", "alice")).await.expect("add");
    assert!(repo.remove("p1", "a1", "alice").await.expect("remove"));
    assert!(!repo.remove("p1", "a1", "alice").await.expect("repeat"));
}

// ─── listing order ────────────────────────────────────────────────────

#[tokio::test]
async fn list_is_address_ordered() {
    let db = db::connect_memory().await.expect("db");
    let repo = ContactRepo::new(Arc::new(db));

    repo.add(&contact("a1", "zoe")).await.expect("add");
    repo.add(&contact("a1", "alice")).await.expect("add");

    let listed = repo.list("p1", "a1").await.expect("list");
    let addresses: Vec<_> = listed.iter().map(|c| c.contact_address.as_str()).collect();
    assert_eq!(addresses, vec!["alice", "zoe"]);
}
