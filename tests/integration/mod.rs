//! Integration tests for the Dify Bridge
//!
//! These drive the real router end to end against a mocked Dify API.

mod chat_completions;
mod health;
mod streaming;
