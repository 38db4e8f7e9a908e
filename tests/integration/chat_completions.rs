//! Chat completions endpoint integration tests
//!
//! Blocking mode and request validation:
//! - POST /v1/chat/completions with `stream` absent or false
//! - Missing / non-array `messages`, missing user message
//! - Dify error propagation

use axum::http::StatusCode;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use crate::common::{constants, test_server};
use crate::mocks::MockDify;

#[tokio::test]
async fn test_blocking_completion() {
    let dify = MockDify::start().await;
    dify.mock_blocking_reply("m1", "c1", "Hello!").await;
    let (server, _) = test_server(&dify.uri());

    let response = server
        .post("/v1/chat/completions")
        .json(&json!({
            "model": "gpt-4o",
            "messages": [
                {"role": "system", "content": "Be brief"},
                {"role": "user", "content": "Hi"}
            ]
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["id"], "m1");
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["model"], "gpt-4o");
    assert_eq!(body["created"], 1705395332);
    assert_eq!(
        body["choices"],
        json!([{
            "index": 0,
            "message": {"role": "assistant", "content": "Hello!"},
            "finish_reason": "stop"
        }])
    );
    assert_eq!(
        body["usage"],
        json!({"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15})
    );
    assert_eq!(body["conversation_id"], "c1");
}

#[tokio::test]
async fn test_backend_request_shape() {
    let dify = MockDify::start().await;
    dify.mock_blocking_reply("m1", "c1", "Hello!").await;
    let (server, _) = test_server(&dify.uri());

    server
        .post("/v1/chat/completions")
        .json(&json!({
            "messages": [
                {"role": "system", "content": "Be brief"},
                {"role": "user", "content": [{"type": "text", "text": "Hi"}]}
            ]
        }))
        .await
        .assert_status_ok();

    let bodies = dify.received_bodies().await;
    assert_eq!(bodies.len(), 1);
    let sent = &bodies[0];
    assert_eq!(sent["query"], "Hi");
    assert_eq!(sent["response_mode"], "blocking");
    assert_eq!(sent["conversation_id"], "");
    assert_eq!(sent["user"], constants::TEST_DEFAULT_USER);
    assert_eq!(sent["inputs"], json!({}));
    assert_eq!(
        sent["conversation_history"],
        json!([{"role": "user", "content": "Hi"}])
    );
}

#[tokio::test]
async fn test_default_model_and_client_user() {
    let dify = MockDify::start().await;
    dify.mock_blocking_reply("m1", "c1", "Hello!").await;
    let (server, _) = test_server(&dify.uri());

    let body: Value = server
        .post("/v1/chat/completions")
        .json(&json!({
            "user": "alice",
            "messages": [{"role": "user", "content": "Hi"}]
        }))
        .await
        .json();

    assert_eq!(body["model"], constants::TEST_DEFAULT_MODEL);
    assert_eq!(dify.received_bodies().await[0]["user"], "alice");
}

#[tokio::test]
async fn test_missing_messages() {
    let dify = MockDify::start().await;
    let (server, _) = test_server(&dify.uri());

    let response = server
        .post("/v1/chat/completions")
        .json(&json!({"model": "gpt-4o"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "invalid_request_error");
    assert_eq!(body["error"]["status"], 400);
    assert_eq!(body["error"]["message"], "'messages' is required");
    assert!(dify.received_bodies().await.is_empty());
}

#[tokio::test]
async fn test_messages_not_an_array() {
    let dify = MockDify::start().await;
    let (server, _) = test_server(&dify.uri());

    let response = server
        .post("/v1/chat/completions")
        .json(&json!({"messages": "Hi"}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "'messages' must be an array");
}

#[tokio::test]
async fn test_invalid_json_body() {
    let dify = MockDify::start().await;
    let (server, _) = test_server(&dify.uri());

    let response = server
        .post("/v1/chat/completions")
        .text("{not json")
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "invalid_request_error");
}

#[tokio::test]
async fn test_unknown_role_is_rejected() {
    let dify = MockDify::start().await;
    let (server, _) = test_server(&dify.uri());

    let response = server
        .post("/v1/chat/completions")
        .json(&json!({"messages": [{"role": "wizard", "content": "Hi"}]}))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_no_user_message() {
    let dify = MockDify::start().await;
    let (server, _) = test_server(&dify.uri());

    let response = server
        .post("/v1/chat/completions")
        .json(&json!({
            "messages": [
                {"role": "system", "content": "Be brief"},
                {"role": "assistant", "content": "Hello"}
            ]
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "invalid_request_error");
    assert_eq!(body["error"]["message"], "No user message found in 'messages'");
    assert!(dify.received_bodies().await.is_empty());
}

#[tokio::test]
async fn test_dify_error_status_is_propagated() {
    let dify = MockDify::start().await;
    dify.mock_error(404, "not_found", "Conversation Not Exists.").await;
    let (server, _) = test_server(&dify.uri());

    let response = server
        .post("/v1/chat/completions")
        .json(&json!({"messages": [{"role": "user", "content": "Hi"}]}))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "upstream_error");
    assert_eq!(body["error"]["status"], 404);
    let message = body["error"]["message"].as_str().unwrap();
    assert!(message.contains("Conversation Not Exists."), "{}", message);
}

#[tokio::test]
async fn test_dify_unreachable_is_500() {
    // Nothing listens on port 1
    let (server, _) = test_server("http://127.0.0.1:1");

    let response = server
        .post("/v1/chat/completions")
        .json(&json!({"messages": [{"role": "user", "content": "Hi"}]}))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "upstream_error");
}
