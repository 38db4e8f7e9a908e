//! Dify chat-messages API data models
//!
//! Types for request/response payloads exchanged with `POST /chat-messages`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::openai::{Role, Usage};

/// How the backend should deliver its answer
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ResponseMode {
    /// One JSON object with the complete answer
    Blocking,
    /// Server-sent `data:` lines with incremental events
    Streaming,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::Blocking => "blocking",
            ResponseMode::Streaming => "streaming",
        }
    }
}

/// A non-system turn of the client's history, annotated for the backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// Outbound request body for `POST /chat-messages`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendRequest {
    /// App input variables; always sent, empty for chat apps without inputs
    pub inputs: Map<String, Value>,
    /// Latest user content
    pub query: String,
    pub response_mode: ResponseMode,
    /// Empty string starts a new backend conversation
    pub conversation_id: String,
    pub user: String,
    pub conversation_history: Vec<HistoryEntry>,
}

/// Token usage as reported by Dify
///
/// Dify also reports prices and latency; only the token counts are kept.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct DifyUsage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl From<DifyUsage> for Usage {
    fn from(usage: DifyUsage) -> Self {
        Usage {
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
            total_tokens: usage.total_tokens,
        }
    }
}

/// Metadata block attached to blocking replies and `message_end` events
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DifyMetadata {
    #[serde(default)]
    pub usage: Option<DifyUsage>,
}

/// Blocking-mode reply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct BlockingReply {
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub metadata: Option<DifyMetadata>,
    /// Some deployments report usage at the top level
    #[serde(default)]
    pub usage: Option<DifyUsage>,
}

impl BlockingReply {
    /// Usage from `metadata.usage`, falling back to top-level `usage`
    pub fn usage(&self) -> Option<DifyUsage> {
        self.metadata
            .as_ref()
            .and_then(|m| m.usage.clone())
            .or_else(|| self.usage.clone())
    }
}

/// One parsed streaming event
///
/// Only the fields the translator reads are modelled; unknown fields are ignored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StreamEvent {
    pub event: String,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub metadata: Option<DifyMetadata>,
    /// Present on `error` events
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
}

impl StreamEvent {
    /// The backend conversation id, ignoring empty strings
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref().filter(|id| !id.is_empty())
    }

    pub fn usage(&self) -> Option<DifyUsage> {
        self.metadata.as_ref().and_then(|m| m.usage.clone())
    }
}

/// Error body returned by Dify on non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub struct DifyErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
