//! OpenAI-compatible client protocol types
//!
//! The shapes this proxy accepts and emits on `/v1/chat/completions`.

pub mod request;
pub mod response;
pub mod types;

// Re-export key types for convenience
pub use request::{parse_request, ChatCompletionRequest};
pub use response::{
    ChatCompletion, ChatCompletionChunk, Choice, ChoiceMessage, Delta, StreamChoice, Usage,
};
pub use types::{ChatMessage, Content, ContentPart, Role};
