//! Conversation key derivation
//!
//! A key names one logical client conversation across stateless calls. An explicit
//! session id supplied by the client is preferred. Without one, the key falls back
//! to a hash of the first message's content, which collides when two conversations
//! open with identical text and breaks when a client trims or reorders history.

use std::fmt;

use sha2::{Digest, Sha256};

use crate::openai::ChatMessage;

const SESSION_PREFIX: &str = "session:";
const CONTENT_PREFIX: &str = "content:";

/// Registry lookup key for one logical conversation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Key from an explicit client-supplied session id
    pub fn from_session(session_id: &str) -> Self {
        Self(format!("{}{}", SESSION_PREFIX, session_id.trim()))
    }

    /// Legacy key from the content of the first message
    pub fn from_first_message(messages: &[ChatMessage]) -> Self {
        let first = messages.first().map(ChatMessage::text).unwrap_or_default();
        let digest = Sha256::digest(first.as_bytes());
        Self(format!("{}{}", CONTENT_PREFIX, hex::encode(digest)))
    }

    /// Pick the explicit session id when present and non-blank, else the content fallback
    pub fn derive(session_id: Option<&str>, messages: &[ChatMessage]) -> Self {
        match session_id.filter(|id| !id.trim().is_empty()) {
            Some(id) => Self::from_session(id),
            None => Self::from_first_message(messages),
        }
    }

    /// Whether this key came from an explicit session id
    pub fn is_explicit(&self) -> bool {
        self.0.starts_with(SESSION_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
