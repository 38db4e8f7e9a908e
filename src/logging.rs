//! Request logging utilities
//!
//! Structured logging with a short correlation id so one chat request can be
//! followed from arrival through the backend call to the end of its stream.

use std::time::Instant;
use tracing::{error, info, Span};
use uuid::Uuid;

use crate::{conversation::ConversationKey, dify::ResponseMode};

/// Context for tracking a request through the bridge
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Unique identifier for this request (for log correlation)
    pub trace_id: String,
    pub start_time: Instant,
    /// Backend handling this request
    pub backend: String,
    pub endpoint: String,
    /// Model name echoed back to the client
    pub model: Option<String>,
    pub streaming: bool,
    /// Conversation key the request was correlated under
    pub conversation_key: Option<String>,
    /// Whether the key came from a client session id rather than message content
    pub explicit_session: bool,
}

impl RequestContext {
    pub fn new(backend: &str, endpoint: &str) -> Self {
        Self {
            trace_id: Uuid::new_v4().simple().to_string()[..8].to_string(),
            start_time: Instant::now(),
            backend: backend.to_string(),
            endpoint: endpoint.to_string(),
            model: None,
            streaming: false,
            conversation_key: None,
            explicit_session: false,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    pub fn with_conversation_key(mut self, key: &ConversationKey) -> Self {
        self.conversation_key = Some(key.to_string());
        self.explicit_session = key.is_explicit();
        self
    }

    pub fn response_mode(&self) -> ResponseMode {
        if self.streaming {
            ResponseMode::Streaming
        } else {
            ResponseMode::Blocking
        }
    }

    /// Mode label used in logs and metrics
    pub fn mode(&self) -> &'static str {
        self.response_mode().as_str()
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn log_request_start(&self, message_count: usize) {
        info!(
            trace_id = %self.trace_id,
            backend = %self.backend,
            endpoint = %self.endpoint,
            model = ?self.model,
            streaming = %self.streaming,
            conversation_key = ?self.conversation_key,
            explicit_session = %self.explicit_session,
            messages = %message_count,
            "Request started"
        );
    }

    /// Log successful completion of a blocking request
    pub fn log_request_complete(&self, conversation_id: Option<&str>, tokens: Option<u64>) {
        info!(
            trace_id = %self.trace_id,
            backend = %self.backend,
            model = ?self.model,
            conversation_id = ?conversation_id,
            tokens = ?tokens,
            elapsed_ms = %self.elapsed_ms(),
            "Request completed successfully"
        );
    }

    pub fn log_stream_started(&self) {
        info!(
            trace_id = %self.trace_id,
            backend = %self.backend,
            endpoint = %self.endpoint,
            elapsed_ms = %self.elapsed_ms(),
            "Streaming response started"
        );
    }

    pub fn log_stream_ended(&self, chunks: usize, reason: &str) {
        info!(
            trace_id = %self.trace_id,
            backend = %self.backend,
            chunks = %chunks,
            reason = %reason,
            elapsed_ms = %self.elapsed_ms(),
            "Streaming response ended"
        );
    }

    pub fn log_error(&self, error: &str) {
        error!(
            trace_id = %self.trace_id,
            backend = %self.backend,
            endpoint = %self.endpoint,
            model = ?self.model,
            streaming = %self.streaming,
            conversation_key = ?self.conversation_key,
            elapsed_ms = %self.elapsed_ms(),
            error = %error,
            "Request failed"
        );
    }

    /// Span that the relay task runs under
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "chat_stream",
            trace_id = %self.trace_id,
            backend = %self.backend,
            model = ?self.model,
        )
    }
}
