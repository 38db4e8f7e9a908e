//! Chat completions endpoint
//!
//! OpenAI-compatible chat completions API endpoint backed by Dify.
//! Handles both streaming and non-streaming responses.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tokio::sync::mpsc;
use tracing::{debug, Instrument};

use crate::{
    conversation::ConversationKey,
    dify::ResponseMode,
    error::{AppError, AppResult},
    logging::RequestContext,
    openai::{parse_request, ChatCompletionRequest},
    routes::metrics::{record_request, record_tokens},
    streaming::{body_stream, relay::RELAY_CHANNEL_CAPACITY, StreamRelay},
    translate::StreamContext,
    AppState,
};

/// Header carrying an explicit conversation correlation id
pub const SESSION_ID_HEADER: &str = "x-session-id";

const ENDPOINT: &str = "/v1/chat/completions";

/// Explicit session id from the header, else from the request body
fn session_id(headers: &HeaderMap, request: &ChatCompletionRequest) -> Option<String> {
    headers
        .get(SESSION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .or_else(|| request.session_id.clone())
}

/// Handle chat completion requests
///
/// Translates the full client-side message history into one Dify
/// chat-messages call, correlated to the backend conversation through the
/// registry, and translates the reply back.
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let request = parse_request(&body).map_err(|e| {
        debug!(error = %e, "Rejected chat completion request");
        record_request("invalid", e.status_code().as_u16(), 0.0);
        e
    })?;

    let key = ConversationKey::derive(session_id(&headers, &request).as_deref(), &request.messages);
    let model = request
        .model
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| state.config.default_model.clone());

    let ctx = RequestContext::new(state.backend.name(), ENDPOINT)
        .with_model(model.clone())
        .with_streaming(request.stream)
        .with_conversation_key(&key);
    ctx.log_request_start(request.messages.len());

    let result = if request.stream {
        handle_streaming_chat(&state, &request, key, model, &ctx).await
    } else {
        handle_non_streaming_chat(&state, &request, &key, &model, &ctx).await
    };

    result.map_err(|e| {
        ctx.log_error(&e.to_string());
        record_request(ctx.mode(), e.status_code().as_u16(), ctx.elapsed_secs());
        e
    })
}

/// Handle non-streaming chat completion
async fn handle_non_streaming_chat(
    state: &AppState,
    request: &ChatCompletionRequest,
    key: &ConversationKey,
    model: &str,
    ctx: &RequestContext,
) -> AppResult<Response> {
    let backend_request = state.request_translator.translate(
        &request.messages,
        key,
        request.user.as_deref(),
        ResponseMode::Blocking,
    )?;

    let reply = state.backend.send_blocking(&backend_request).await?;
    let completion = state
        .response_translator
        .translate_blocking(reply, key, model);

    record_request(ctx.mode(), StatusCode::OK.as_u16(), ctx.elapsed_secs());
    record_tokens("prompt", u64::from(completion.usage.prompt_tokens));
    record_tokens("completion", u64::from(completion.usage.completion_tokens));
    ctx.log_request_complete(
        completion.conversation_id.as_deref(),
        Some(u64::from(completion.usage.total_tokens)),
    );

    Ok((StatusCode::OK, Json(completion)).into_response())
}

/// Handle streaming chat completion
///
/// Errors before the backend stream is established are returned as normal
/// error responses. After that the relay owns the stream and always ends the
/// client stream with the terminal sentinel.
async fn handle_streaming_chat(
    state: &AppState,
    request: &ChatCompletionRequest,
    key: ConversationKey,
    model: String,
    ctx: &RequestContext,
) -> AppResult<Response> {
    let backend_request = state.request_translator.translate(
        &request.messages,
        &key,
        request.user.as_deref(),
        ResponseMode::Streaming,
    )?;

    let backend_stream = state.backend.send_streaming(&backend_request).await?;

    // Duration covers time to stream start; the relay logs the rest
    record_request(ctx.mode(), StatusCode::OK.as_u16(), ctx.elapsed_secs());
    ctx.log_stream_started();

    let (tx, rx) = mpsc::channel(RELAY_CHANNEL_CAPACITY);
    let relay = StreamRelay::new(
        state.response_translator.clone(),
        key,
        StreamContext::new(model),
    );

    let span = ctx.create_span();
    let relay_ctx = ctx.clone();
    tokio::spawn(
        async move {
            let summary = relay.run(backend_stream, tx).await;
            relay_ctx.log_stream_ended(summary.chunks, summary.reason.as_str());
        }
        .instrument(span),
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(body_stream(rx)))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build response: {}", e)))
}
