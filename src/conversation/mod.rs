//! Conversation identity tracking
//!
//! Correlates stateless client calls with the backend's server-side conversations.

pub mod key;
pub mod registry;

pub use key::ConversationKey;
pub use registry::{ConversationRegistry, RegistryPolicy};
