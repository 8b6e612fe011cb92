//! Unit tests for database connection and schema bootstrap.

use std::sync::Arc;

use aweb::models::project::Project;
use aweb::persistence::{db, project_repo::ProjectRepo, schema};

// ─── file-backed store ────────────────────────────────────────────────

#[tokio::test]
async fn file_backed_store_persists_across_reconnects() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("aweb.db");
    let path = path.to_str().expect("utf8");

    let project = Project::new("acme".to_owned(), None);
    {
        let pool = db::connect(path).await.expect("connect");
        ProjectRepo::new(Arc::new(pool.clone()))
            .insert(&project)
            .await
            .expect("insert");
        pool.close().await;
    }

    let pool = db::connect(path).await.expect("reconnect");
    let fetched = ProjectRepo::new(Arc::new(pool))
        .fetch(&project.project_id)
        .await
        .expect("q")
        .expect("row survived reconnect");
    assert_eq!(fetched.slug, "acme");
}

#[tokio::test]
async fn missing_parent_directories_are_created() {
    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("state").join("db").join("aweb.db");
    db::connect(nested.to_str().expect("utf8"))
        .await
        .expect("connect creates parents");
}

// ─── bootstrap idempotence ────────────────────────────────────────────

#[tokio::test]
async fn bootstrap_is_safe_to_re_run() {
    let pool = db::connect_memory().await.expect("db");
    schema::bootstrap_schema(&pool).await.expect("first re-run");
    schema::bootstrap_schema(&pool).await.expect("second re-run");
}
