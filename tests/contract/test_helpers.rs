//! Shared helpers for HTTP contract tests.
//!
//! Spawns the real axum surface on an ephemeral port and registers
//! agents through the public `/v1/init` route, so every assertion runs
//! against the wire format.

use std::sync::Arc;

use aweb::config::GlobalConfig;
use aweb::persistence::db;
use aweb::state::AppState;
use tokio_util::sync::CancellationToken;

/// Config with short deadlines suitable for contract tests.
pub fn test_config() -> GlobalConfig {
    let toml = r#"
listen_addr = "127.0.0.1"
http_port = 0
database_path = "sqlite::memory:"

[timeouts]
conversation_start_wait_seconds = 2
quick_send_wait_seconds = 2
wait_extension_seconds = 2

[reservations]
default_ttl_seconds = 60
max_ttl_seconds = 120

[presence]
heartbeat_ttl_seconds = 2
"#;
    GlobalConfig::from_toml_str(toml).expect("valid test config")
}

/// Spawn the HTTP surface on an ephemeral port.
///
/// Caller must cancel `ct` to shut the server down.
pub async fn spawn_server() -> (String, Arc<AppState>, CancellationToken) {
    let pool = db::connect_memory().await.expect("db");
    let state = Arc::new(AppState::new(Arc::new(test_config()), Arc::new(pool)));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral");
    let addr = listener.local_addr().expect("local addr");

    let ct = CancellationToken::new();
    let server_ct = ct.clone();
    let server_state = Arc::clone(&state);
    tokio::spawn(async move {
        let _ = aweb::http::serve_on(server_state, listener, server_ct).await;
    });

    (format!("http://{addr}"), state, ct)
}

/// Register an agent over the wire; returns `(api_key, agent_id, project_id)`.
pub async fn register_http(base: &str, project: &str, alias: &str) -> (String, String, String) {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{base}/v1/init"))
        .json(&serde_json::json!({
            "project_slug": project,
            "alias": alias,
        }))
        .send()
        .await
        .expect("init request");
    assert!(resp.status().is_success(), "init must succeed");
    let body: serde_json::Value = resp.json().await.expect("init body");
    (
        body["api_key"].as_str().expect("api_key").to_owned(),
        body["agent_id"].as_str().expect("agent_id").to_owned(),
        body["project_id"].as_str().expect("project_id").to_owned(),
    )
}
