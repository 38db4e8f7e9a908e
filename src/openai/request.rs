//! Request types for the client-facing protocol

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::types::ChatMessage;
use crate::error::{AppError, AppResult};

/// Chat completion request
///
/// Sampling parameters (`temperature`, `top_p`, ...) are accepted and ignored:
/// the backend app owns its model configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatCompletionRequest {
    /// Messages in the conversation
    pub messages: Vec<ChatMessage>,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
    /// Model name, only echoed back in responses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// End-user identifier forwarded to the backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Explicit conversation correlation id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Parse and validate a raw request body.
///
/// `messages` must be present and be an array; anything else is a client fault.
pub fn parse_request(body: &[u8]) -> AppResult<ChatCompletionRequest> {
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON in request body: {}", e)))?;

    match value.get("messages") {
        None | Some(Value::Null) => {
            return Err(AppError::BadRequest(
                "'messages' is required".to_string(),
            ))
        }
        Some(messages) if !messages.is_array() => {
            return Err(AppError::BadRequest(
                "'messages' must be an array".to_string(),
            ))
        }
        Some(_) => {}
    }

    serde_json::from_value(value)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {}", e)))
}
