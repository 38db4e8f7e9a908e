//! Mock infrastructure for testing external services
//!
//! Only the Dify chat-messages API is mocked; it is the bridge's sole
//! external dependency.


pub use dify::*;
