//! Inbound translation: client message list to one backend request

use std::sync::Arc;

use serde_json::Map;
use tracing::debug;

use super::TranslateError;
use crate::{
    conversation::{ConversationKey, ConversationRegistry},
    dify::{BackendRequest, HistoryEntry, ResponseMode},
    openai::{ChatMessage, Role},
};

/// Builds backend requests from full client-side message histories
pub struct RequestTranslator {
    registry: Arc<ConversationRegistry>,
    default_user: String,
}

impl RequestTranslator {
    pub fn new(registry: Arc<ConversationRegistry>, default_user: impl Into<String>) -> Self {
        Self {
            registry,
            default_user: default_user.into(),
        }
    }

    /// Translate a message list into a backend request.
    ///
    /// The query is the most recent user turn. The conversation id comes from the
    /// registry, overridden by the last assistant turn that carries one. Only the
    /// registry is read; nothing is written.
    pub fn translate(
        &self,
        messages: &[ChatMessage],
        key: &ConversationKey,
        user: Option<&str>,
        response_mode: ResponseMode,
    ) -> Result<BackendRequest, TranslateError> {
        let query = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(ChatMessage::text)
            .ok_or(TranslateError::MissingUserMessage)?;

        let mut conversation_id = self.registry.get(key).unwrap_or_default();

        let mut history: Vec<HistoryEntry> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let own_conversation_id = match m.role {
                    Role::Assistant => m.conversation_id.clone().filter(|id| !id.is_empty()),
                    _ => None,
                };
                if let Some(ref id) = own_conversation_id {
                    conversation_id = id.clone();
                }
                HistoryEntry {
                    role: m.role,
                    content: m.text(),
                    message_id: m.message_id.clone().filter(|id| !id.is_empty()),
                    conversation_id: own_conversation_id,
                }
            })
            .collect();

        if !conversation_id.is_empty() {
            for entry in history.iter_mut().filter(|e| e.conversation_id.is_none()) {
                entry.conversation_id = Some(conversation_id.clone());
            }
        }

        debug!(
            key = %key,
            conversation_id = %conversation_id,
            history_len = history.len(),
            "Translated chat request"
        );

        Ok(BackendRequest {
            inputs: Map::new(),
            query,
            response_mode,
            conversation_id,
            user: user
                .filter(|u| !u.is_empty())
                .unwrap_or(&self.default_user)
                .to_string(),
            conversation_history: history,
        })
    }
}
