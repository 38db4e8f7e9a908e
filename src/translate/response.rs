//! Outbound translation: backend replies and stream events to client units
//!
//! Whenever a backend unit reveals a conversation id, it is written to the
//! registry under the active key and echoed to the client as `conversation_id`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use super::repair::repair_missing_separators;
use crate::{
    conversation::{ConversationKey, ConversationRegistry},
    dify::{BlockingReply, StreamEvent},
    openai::{
        ChatCompletion, ChatCompletionChunk, Choice, ChoiceMessage, Delta, Role, StreamChoice,
        Usage,
    },
    routes::metrics::{record_json_repair, record_stream_event},
};

/// Mint a completion id for replies the backend did not identify
fn mint_completion_id() -> String {
    format!("chatcmpl-{}", Uuid::new_v4().simple())
}

/// Metadata shared by every chunk of one stream
#[derive(Debug, Clone)]
pub struct StreamContext {
    /// Fallback chunk id when an event carries no `message_id`
    pub id: String,
    pub model: String,
    pub created: i64,
}

impl StreamContext {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            id: mint_completion_id(),
            model: model.into(),
            created: Utc::now().timestamp(),
        }
    }
}

/// Strip an SSE `data:` field prefix if present
pub fn strip_data_prefix(line: &str) -> &str {
    line.strip_prefix("data:")
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
        .unwrap_or(line)
        .trim()
}

/// Parse one event payload, falling back to the separator repair
fn parse_event(payload: &str) -> Option<StreamEvent> {
    let strict_err = match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => return Some(event),
        Err(e) => e,
    };

    let Some(repaired) = repair_missing_separators(payload) else {
        debug!(error = %strict_err, "Backend event is not valid JSON");
        return None;
    };

    match serde_json::from_str::<StreamEvent>(&repaired) {
        Ok(event) => {
            record_json_repair("repaired");
            warn!(
                event = %event.event,
                error = %strict_err,
                "Repaired malformed backend event"
            );
            Some(event)
        }
        Err(e) => {
            record_json_repair("failed");
            debug!(error = %e, "Backend event could not be repaired");
            None
        }
    }
}

/// Maps backend output into OpenAI-shaped responses
pub struct ResponseTranslator {
    registry: Arc<ConversationRegistry>,
}

impl ResponseTranslator {
    pub fn new(registry: Arc<ConversationRegistry>) -> Self {
        Self { registry }
    }

    /// Register a revealed conversation id and return it for attachment
    fn remember(&self, key: &ConversationKey, conversation_id: Option<&str>) -> Option<String> {
        let id = conversation_id.filter(|id| !id.is_empty())?;
        self.registry.set(key, id);
        Some(id.to_string())
    }

    /// Translate a complete blocking-mode reply
    pub fn translate_blocking(
        &self,
        reply: BlockingReply,
        key: &ConversationKey,
        model: &str,
    ) -> ChatCompletion {
        let conversation_id = self.remember(key, reply.conversation_id.as_deref());
        let usage = reply.usage().map(Usage::from).unwrap_or_default();

        ChatCompletion {
            id: reply
                .message_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(mint_completion_id),
            object: "chat.completion".to_string(),
            created: reply.created_at.unwrap_or_else(|| Utc::now().timestamp()),
            model: model.to_string(),
            choices: vec![Choice {
                index: 0,
                message: ChoiceMessage {
                    role: Role::Assistant,
                    content: reply.answer,
                },
                finish_reason: Some("stop".to_string()),
            }],
            usage,
            conversation_id,
        }
    }

    /// Translate one raw stream event.
    ///
    /// Returns `None` for ignored event kinds and for payloads that cannot be
    /// parsed even after repair. Never fails.
    pub fn translate_stream_event(
        &self,
        raw: &str,
        key: &ConversationKey,
        ctx: &StreamContext,
    ) -> Option<ChatCompletionChunk> {
        let payload = strip_data_prefix(raw);
        if payload.is_empty() {
            return None;
        }

        let Some(event) = parse_event(payload) else {
            record_stream_event("dropped");
            warn!(
                payload_len = payload.len(),
                payload = %truncate(payload, 200),
                "Dropping unparseable backend event"
            );
            return None;
        };

        let (delta, finish_reason, usage) = match event.event.as_str() {
            "message" | "agent_message" => (
                Delta {
                    role: None,
                    content: Some(event.answer.clone().unwrap_or_default()),
                },
                None,
                None,
            ),
            "message_end" => (
                Delta {
                    role: Some(Role::Assistant),
                    content: None,
                },
                Some("stop".to_string()),
                event.usage().map(Usage::from),
            ),
            "error" => {
                record_stream_event("ignored");
                warn!(
                    code = ?event.code,
                    message = ?event.message,
                    "Backend reported an error event in stream"
                );
                return None;
            }
            other => {
                record_stream_event("ignored");
                debug!(event = %other, "Ignoring backend event");
                return None;
            }
        };

        let conversation_id = self.remember(key, event.conversation_id());
        record_stream_event("translated");

        Some(ChatCompletionChunk {
            id: event
                .message_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| ctx.id.clone()),
            object: "chat.completion.chunk".to_string(),
            created: ctx.created,
            model: ctx.model.clone(),
            choices: vec![StreamChoice {
                index: 0,
                delta,
                finish_reason,
            }],
            usage,
            conversation_id,
        })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
