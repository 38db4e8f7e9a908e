//! Streaming chat completions integration tests
//!
//! Verifies SSE headers, chunk translation and the terminal sentinel for
//! POST /v1/chat/completions with `"stream": true`.

use axum::http::StatusCode;
use serde_json::{json, Value};

use crate::common::test_server;
use crate::mocks::{DifyEvent, MockDify};

/// Split an SSE body into its `data:` payloads
fn data_frames(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .map(str::to_string)
        .collect()
}

fn chunks(frames: &[String]) -> Vec<Value> {
    frames
        .iter()
        .filter(|f| f.as_str() != "[DONE]")
        .map(|f| serde_json::from_str(f).expect("chunk should be JSON"))
        .collect()
}

fn stream_request() -> Value {
    json!({
        "model": "gpt-4o",
        "stream": true,
        "messages": [{"role": "user", "content": "Hi"}]
    })
}

#[tokio::test]
async fn test_streaming_headers_and_chunks() {
    let dify = MockDify::start().await;
    dify.mock_stream(vec![
        DifyEvent::message("Hi", "c1"),
        DifyEvent::message(" there", "c1"),
        DifyEvent::message_end("c1"),
    ])
    .await;
    let (server, _) = test_server(&dify.uri());

    let response = server
        .post("/v1/chat/completions")
        .json(&stream_request())
        .await;

    response.assert_status_ok();
    let headers = response.headers();
    assert_eq!(headers.get("content-type").unwrap(), "text/event-stream");
    assert_eq!(headers.get("cache-control").unwrap(), "no-cache");
    assert_eq!(headers.get("x-accel-buffering").unwrap(), "no");

    let frames = data_frames(&response.text());
    assert_eq!(frames.len(), 4);
    assert_eq!(frames.last().unwrap(), "[DONE]");

    let chunks = chunks(&frames);
    assert_eq!(chunks.len(), 3);
    assert!(chunks
        .iter()
        .all(|c| c["object"] == "chat.completion.chunk" && c["model"] == "gpt-4o"));
    assert_eq!(chunks[0]["choices"][0]["delta"]["content"], "Hi");
    assert!(chunks[0]["choices"][0]["finish_reason"].is_null());
    assert_eq!(chunks[1]["choices"][0]["delta"]["content"], " there");
    assert!(chunks[1]["choices"][0]["finish_reason"].is_null());
    assert_eq!(chunks[2]["choices"][0]["finish_reason"], "stop");
    assert_eq!(chunks[2]["choices"][0]["delta"]["role"], "assistant");
    assert_eq!(chunks[2]["usage"]["total_tokens"], 15);
    assert_eq!(chunks[2]["conversation_id"], "c1");

    let sent = dify.received_bodies().await;
    assert_eq!(sent[0]["response_mode"], "streaming");
}

#[tokio::test]
async fn test_streaming_skips_ignored_and_malformed_events() {
    let dify = MockDify::start().await;
    dify.mock_stream(vec![
        DifyEvent::Ping,
        DifyEvent::message("A", "c1"),
        DifyEvent::Raw("{this is not json".to_string()),
        DifyEvent::Raw(r#"{"event":"workflow_started","conversation_id":"c1"}"#.to_string()),
        DifyEvent::message("B", "c1"),
    ])
    .await;
    let (server, _) = test_server(&dify.uri());

    let response = server
        .post("/v1/chat/completions")
        .json(&stream_request())
        .await;

    response.assert_status_ok();
    let frames = data_frames(&response.text());
    let chunks = chunks(&frames);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0]["choices"][0]["delta"]["content"], "A");
    assert_eq!(chunks[1]["choices"][0]["delta"]["content"], "B");
    assert_eq!(frames.last().unwrap(), "[DONE]");
}

#[tokio::test]
async fn test_streaming_repairs_missing_separator() {
    let dify = MockDify::start().await;
    dify.mock_stream(vec![DifyEvent::Raw(
        r#"{"event":"message""answer":"Fixed""conversation_id":"c7"}"#.to_string(),
    )])
    .await;
    let (server, state) = test_server(&dify.uri());

    let response = server
        .post("/v1/chat/completions")
        .json(&stream_request())
        .await;

    let chunks = chunks(&data_frames(&response.text()));
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0]["choices"][0]["delta"]["content"], "Fixed");
    assert_eq!(state.registry.len(), 1);
}

#[tokio::test]
async fn test_streaming_empty_backend_stream() {
    let dify = MockDify::start().await;
    dify.mock_stream(vec![]).await;
    let (server, _) = test_server(&dify.uri());

    let response = server
        .post("/v1/chat/completions")
        .json(&stream_request())
        .await;

    response.assert_status_ok();
    assert_eq!(response.text(), "data: [DONE]\n\n");
}

#[tokio::test]
async fn test_streaming_dify_error_before_stream() {
    let dify = MockDify::start().await;
    dify.mock_error(400, "invalid_param", "Query is required").await;
    let (server, _) = test_server(&dify.uri());

    let response = server
        .post("/v1/chat/completions")
        .json(&stream_request())
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["type"], "upstream_error");
    assert_eq!(body["error"]["status"], 400);
}

#[tokio::test]
async fn test_streaming_without_user_message() {
    let dify = MockDify::start().await;
    let (server, _) = test_server(&dify.uri());

    let response = server
        .post("/v1/chat/completions")
        .json(&json!({
            "stream": true,
            "messages": [{"role": "system", "content": "Be brief"}]
        }))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(dify.received_bodies().await.is_empty());
}
