//! Contract tests for the SSE stream: frame naming, payload keys,
//! deadline validation, and participant gating.

use std::time::Duration;

use futures_util::StreamExt;

use super::test_helpers::{register_http, spawn_server};

async fn create_session(base: &str, key: &str, to: &str) -> String {
    let client = reqwest::Client::new();
    let created: serde_json::Value = client
        .post(format!("{base}/v1/chat/sessions"))
        .bearer_auth(key)
        .json(&serde_json::json!({
            "to": [to],
            "message": "opening",
            "wait_seconds": 0,
        }))
        .send()
        .await
        .expect("create")
        .json()
        .await
        .expect("json");
    created["session_id"].as_str().expect("id").to_owned()
}

fn future_deadline(seconds: i64) -> String {
    (chrono::Utc::now() + chrono::Duration::seconds(seconds))
        .to_rfc3339()
        .replace('+', "%2B")
}

/// Read from an SSE byte stream until `needle` appears or the timeout
/// elapses; returns the collected transcript.
async fn read_until(resp: reqwest::Response, needle: &str, timeout: Duration) -> String {
    let mut stream = resp.bytes_stream();
    let mut transcript = String::new();
    let result = tokio::time::timeout(timeout, async {
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.expect("chunk");
            transcript.push_str(&String::from_utf8_lossy(&chunk));
            if transcript.contains(needle) {
                break;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "timed out waiting for {needle:?}; got: {transcript}");
    transcript
}

// ─── message frames ───────────────────────────────────────────────────

#[tokio::test]
async fn message_frame_carries_the_wire_payload() {
    let (base, _state, ct) = spawn_server().await;
    let (alice_key, _, _) = register_http(&base, "acme", "alice").await;
    let (bob_key, _, _) = register_http(&base, "acme", "bob").await;
    let session_id = create_session(&base, &alice_key, "bob").await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!(
            "{base}/v1/chat/sessions/{session_id}/stream?deadline={}",
            future_deadline(10)
        ))
        .bearer_auth(&alice_key)
        .send()
        .await
        .expect("open stream");
    assert_eq!(resp.status(), 200);

    // Publish a message while the stream is attached.
    client
        .post(format!("{base}/v1/chat/sessions/{session_id}/messages"))
        .bearer_auth(&bob_key)
        .json(&serde_json::json!({"message": "streamed hello", "wait_seconds": 0}))
        .send()
        .await
        .expect("send");

    let transcript = read_until(resp, "streamed hello", Duration::from_secs(5)).await;
    assert!(transcript.contains("event: message"));
    let data_line = transcript
        .lines()
        .find(|l| l.starts_with("data: ") && l.contains("streamed hello"))
        .expect("data line");
    let payload: serde_json::Value =
        serde_json::from_str(data_line.trim_start_matches("data: ")).expect("payload json");
    assert_eq!(payload["type"], "message");
    assert_eq!(payload["session_id"], session_id.as_str());
    assert_eq!(payload["from_agent"], "bob");
    assert_eq!(payload["body"], "streamed hello");
    assert_eq!(payload["sender_leaving"], false);
    assert_eq!(payload["hang_on"], false);
    assert_eq!(payload["extends_wait_seconds"], 0);
    assert!(payload["message_id"].is_string());
    assert!(payload["timestamp"].is_string());

    ct.cancel();
}

// ─── read receipt frames ──────────────────────────────────────────────

#[tokio::test]
async fn read_receipt_frame_names_the_reader() {
    let (base, _state, ct) = spawn_server().await;
    let (alice_key, _, _) = register_http(&base, "acme", "alice").await;
    let (bob_key, _, _) = register_http(&base, "acme", "bob").await;
    let session_id = create_session(&base, &alice_key, "bob").await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!(
            "{base}/v1/chat/sessions/{session_id}/stream?deadline={}",
            future_deadline(10)
        ))
        .bearer_auth(&alice_key)
        .send()
        .await
        .expect("open stream");

    // Bob reads the opening message.
    let history: serde_json::Value = client
        .get(format!("{base}/v1/chat/sessions/{session_id}/messages"))
        .bearer_auth(&bob_key)
        .send()
        .await
        .expect("history")
        .json()
        .await
        .expect("json");
    let message_id = history[0]["message_id"].as_str().expect("id").to_owned();
    client
        .post(format!("{base}/v1/chat/sessions/{session_id}/read"))
        .bearer_auth(&bob_key)
        .json(&serde_json::json!({"up_to_message_id": message_id}))
        .send()
        .await
        .expect("read");

    let transcript = read_until(resp, "read_receipt", Duration::from_secs(5)).await;
    assert!(transcript.contains("event: read_receipt"));
    let data_line = transcript
        .lines()
        .find(|l| l.starts_with("data: ") && l.contains("read_receipt"))
        .expect("data line");
    let payload: serde_json::Value =
        serde_json::from_str(data_line.trim_start_matches("data: ")).expect("payload json");
    assert_eq!(payload["reader_alias"], "bob");
    assert_eq!(payload["session_id"], session_id.as_str());

    ct.cancel();
}

// ─── deadline validation ──────────────────────────────────────────────

#[tokio::test]
async fn past_deadline_maps_to_400() {
    let (base, _state, ct) = spawn_server().await;
    let (alice_key, _, _) = register_http(&base, "acme", "alice").await;
    register_http(&base, "acme", "bob").await;
    let session_id = create_session(&base, &alice_key, "bob").await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!(
            "{base}/v1/chat/sessions/{session_id}/stream?deadline={}",
            future_deadline(-5)
        ))
        .bearer_auth(&alice_key)
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 400);

    let resp = client
        .get(format!(
            "{base}/v1/chat/sessions/{session_id}/stream?deadline=not-a-timestamp"
        ))
        .bearer_auth(&alice_key)
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 400);

    ct.cancel();
}

// ─── participant gating ───────────────────────────────────────────────

#[tokio::test]
async fn outsiders_cannot_attach_a_stream() {
    let (base, _state, ct) = spawn_server().await;
    let (alice_key, _, _) = register_http(&base, "acme", "alice").await;
    register_http(&base, "acme", "bob").await;
    let (carol_key, _, _) = register_http(&base, "acme", "carol").await;
    let session_id = create_session(&base, &alice_key, "bob").await;

    let client = reqwest::Client::new();
    let resp = client
        .get(format!(
            "{base}/v1/chat/sessions/{session_id}/stream?deadline={}",
            future_deadline(10)
        ))
        .bearer_auth(&carol_key)
        .send()
        .await
        .expect("request");
    assert_eq!(resp.status(), 403);

    ct.cancel();
}
