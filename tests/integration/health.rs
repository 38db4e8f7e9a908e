//! Health and metrics endpoint integration tests

use serde_json::Value;

use crate::common::test_server;
use crate::mocks::MockDify;

#[tokio::test]
async fn test_health_reports_ok() {
    let dify = MockDify::start().await;
    let (server, _) = test_server(&dify.uri());

    let response = server.get("/health").await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(body["conversations"], 0);
    assert!(body["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn test_health_counts_tracked_conversations() {
    let dify = MockDify::start().await;
    dify.mock_blocking_reply("m1", "c1", "Hello!").await;
    let (server, _) = test_server(&dify.uri());

    server
        .post("/v1/chat/completions")
        .json(&serde_json::json!({"messages": [{"role": "user", "content": "Hi"}]}))
        .await
        .assert_status_ok();

    let body: Value = server.get("/health").await.json();
    assert_eq!(body["conversations"], 1);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let dify = MockDify::start().await;
    let (server, _) = test_server(&dify.uri());

    let response = server.get("/metrics").await;

    response.assert_status_ok();
}
