//! Unit tests for `AgentRepo` CRUD and lifecycle operations.

use std::sync::Arc;

use aweb::models::agent::{AccessMode, Agent, AgentStatus};
use aweb::persistence::{agent_repo::AgentRepo, db};

fn sample_agent(project_id: &str, alias: &str) -> Agent {
    Agent::new(
        project_id.to_owned(),
        alias.to_owned(),
        Some("Test Agent".to_owned()),
        Some("claude".to_owned()),
    )
}

// ─── insert stores all fields ─────────────────────────────────────────

#[tokio::test]
async fn insert_and_fetch_round_trip() {
    let db = db::connect_memory().await.expect("db");
    let repo = AgentRepo::new(Arc::new(db));

    let agent = sample_agent("p1", "alice");
    repo.insert(&agent).await.expect("insert");

    let fetched = repo
        .fetch("p1", &agent.agent_id)
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(fetched.alias, "alice");
    assert_eq!(fetched.access_mode, AccessMode::Open);
    assert_eq!(fetched.status, AgentStatus::Active);
    assert_eq!(fetched.human_name.as_deref(), Some("Test Agent"));
}

// ─── alias lookup is project-scoped ───────────────────────────────────

#[tokio::test]
async fn fetch_by_alias_does_not_cross_projects() {
    let db = db::connect_memory().await.expect("db");
    let repo = AgentRepo::new(Arc::new(db));

    repo.insert(&sample_agent("p1", "alice")).await.expect("insert");

    assert!(repo.fetch_by_alias("p1", "alice").await.expect("q").is_some());
    assert!(repo.fetch_by_alias("p2", "alice").await.expect("q").is_none());
}

// ─── live alias uniqueness ────────────────────────────────────────────

#[tokio::test]
async fn duplicate_live_alias_is_rejected() {
    let db = db::connect_memory().await.expect("db");
    let repo = AgentRepo::new(Arc::new(db));

    repo.insert(&sample_agent("p1", "alice")).await.expect("first");
    let err = repo.insert(&sample_agent("p1", "alice")).await;
    assert!(err.is_err(), "second live alias must violate the index");
}

#[tokio::test]
async fn tombstoned_alias_is_reusable() {
    let db = db::connect_memory().await.expect("db");
    let repo = AgentRepo::new(Arc::new(db));

    let first = sample_agent("p1", "alice");
    repo.insert(&first).await.expect("insert");
    assert!(repo.tombstone("p1", &first.agent_id).await.expect("tombstone"));

    repo.insert(&sample_agent("p1", "alice"))
        .await
        .expect("alias free again");
    // The tombstoned row no longer resolves.
    let resolved = repo.fetch_by_alias("p1", "alice").await.expect("q").expect("live");
    assert_ne!(resolved.agent_id, first.agent_id);
}

// ─── lifecycle status ─────────────────────────────────────────────────

#[tokio::test]
async fn set_status_persists() {
    let db = db::connect_memory().await.expect("db");
    let repo = AgentRepo::new(Arc::new(db));

    let agent = sample_agent("p1", "bob");
    repo.insert(&agent).await.expect("insert");

    assert!(repo
        .set_status("p1", &agent.agent_id, AgentStatus::Retired)
        .await
        .expect("update"));
    let fetched = repo.fetch("p1", &agent.agent_id).await.expect("q").expect("row");
    assert_eq!(fetched.status, AgentStatus::Retired);
}

#[tokio::test]
async fn set_access_mode_persists() {
    let db = db::connect_memory().await.expect("db");
    let repo = AgentRepo::new(Arc::new(db));

    let agent = sample_agent("p1", "carol");
    repo.insert(&agent).await.expect("insert");

    assert!(repo
        .set_access_mode("p1", &agent.agent_id, AccessMode::ContactsOnly)
        .await
        .expect("update"));
    let fetched = repo.fetch("p1", &agent.agent_id).await.expect("q").expect("row");
    assert_eq!(fetched.access_mode, AccessMode::ContactsOnly);
}

// ─── listing ──────────────────────────────────────────────────────────

#[tokio::test]
async fn list_returns_live_agents_in_alias_order() {
    let db = db::connect_memory().await.expect("db");
    let repo = AgentRepo::new(Arc::new(db));

    repo.insert(&sample_agent("p1", "zoe")).await.expect("insert");
    repo.insert(&sample_agent("p1", "alice")).await.expect("insert");
    let gone = sample_agent("p1", "mallory");
    repo.insert(&gone).await.expect("insert");
    repo.tombstone("p1", &gone.agent_id).await.expect("tombstone");

    let listed = repo.list("p1").await.expect("list");
    let aliases: Vec<_> = listed.iter().map(|a| a.alias.as_str()).collect();
    assert_eq!(aliases, vec!["alice", "zoe"]);
}
