//! Protocol translation between OpenAI-style chat completions and Dify chat-messages
//!
//! Requests flow through [`RequestTranslator`]; replies and stream events flow back
//! through [`ResponseTranslator`]. Both share the conversation registry.

pub mod repair;
pub mod request;
pub mod response;

use thiserror::Error;

pub use request::RequestTranslator;
pub use response::{ResponseTranslator, StreamContext};

/// Client faults detected while translating a request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("No user message found in 'messages'")]
    MissingUserMessage,
}
