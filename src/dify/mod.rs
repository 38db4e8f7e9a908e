//! Dify backend integration
//!
//! Wire models for the chat-messages API and the HTTP client that calls it.

pub mod client;
pub mod models;

pub use client::{ByteStream, ChatBackend, DifyClient};
pub use models::{
    BackendRequest, BlockingReply, DifyMetadata, DifyUsage, HistoryEntry, ResponseMode,
    StreamEvent,
};
