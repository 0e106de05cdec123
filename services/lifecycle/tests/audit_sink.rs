//! Audit dispatch wire contract and isolation from the caller.

use std::time::Duration;
use std::time::Instant;

use lockbox_lifecycle::audit::AuditDispatcher;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_emit_posts_expected_wire_record() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audit"))
        .and(body_json(json!({
            "action": "secret.rotated",
            "secretKey": "DB_PASSWORD",
            "username": "alice",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = AuditDispatcher::new(
        Some(format!("{}/audit", server.uri())),
        Duration::from_millis(5000),
    );
    dispatcher.emit("secret.rotated", "DB_PASSWORD", "alice");

    // The POST runs on a detached task; poll until the mock sees it.
    for _ in 0..50 {
        if !server.received_requests().await.unwrap_or_default().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.verify().await;
}

#[tokio::test]
async fn test_emit_returns_immediately_and_does_not_retry_on_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/audit"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let dispatcher = AuditDispatcher::new(
        Some(format!("{}/audit", server.uri())),
        Duration::from_millis(100),
    );

    let started = Instant::now();
    dispatcher.emit("secret.rotated", "DB_PASSWORD", "alice");
    assert!(
        started.elapsed() < Duration::from_millis(50),
        "emit must not block on the sink"
    );

    // Give the detached task time to hit its timeout and give up.
    tokio::time::sleep(Duration::from_millis(400)).await;
    let requests = server.received_requests().await.unwrap_or_default();
    assert!(requests.len() <= 1, "a timed-out dispatch must not retry");
}

#[tokio::test]
async fn test_unreachable_sink_is_swallowed() {
    // Nothing listens here; the dispatch fails and is discarded.
    let dispatcher = AuditDispatcher::new(
        Some("http://127.0.0.1:9".to_string()),
        Duration::from_millis(200),
    );
    dispatcher.emit("secret.rotated", "DB_PASSWORD", "alice");

    // The failure must not surface anywhere; just let the task finish.
    tokio::time::sleep(Duration::from_millis(300)).await;
}

#[tokio::test]
async fn test_rejected_response_is_swallowed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let dispatcher = AuditDispatcher::new(
        Some(format!("{}/audit", server.uri())),
        Duration::from_millis(5000),
    );
    dispatcher.emit("secret.rotated", "DB_PASSWORD", "alice");

    for _ in 0..50 {
        if !server.received_requests().await.unwrap_or_default().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    server.verify().await;
}

#[tokio::test]
async fn test_disabled_dispatcher_drops_silently() {
    let dispatcher = AuditDispatcher::disabled();
    dispatcher.emit("secret.rotated", "DB_PASSWORD", "alice");
}
