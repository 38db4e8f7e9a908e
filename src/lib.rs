//! Dify Bridge - OpenAI-compatible chat completions in front of Dify
//!
//! Accepts stateless OpenAI-style requests carrying the full message history,
//! correlates them with Dify's server-side conversations and translates
//! replies and event streams back into the OpenAI wire format.

pub mod config;
pub mod conversation;
pub mod dify;
pub mod error;
pub mod logging;
pub mod openai;
pub mod routes;
pub mod streaming;
pub mod translate;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

pub use crate::config::Config;
pub use crate::conversation::{ConversationKey, ConversationRegistry, RegistryPolicy};
pub use crate::dify::{ChatBackend, DifyClient};
pub use crate::translate::{RequestTranslator, ResponseTranslator};

/// Application state shared across all request handlers
pub struct AppState {
    pub config: Config,
    pub start_time: Instant,
    /// Conversational backend requests are forwarded to
    pub backend: Arc<dyn ChatBackend>,
    /// Client conversation key to backend conversation id
    pub registry: Arc<ConversationRegistry>,
    pub request_translator: RequestTranslator,
    pub response_translator: Arc<ResponseTranslator>,
}

impl AppState {
    /// Create a new application state talking to the configured Dify app
    pub fn new(config: Config) -> Result<Self> {
        // No overall timeout here: streams may run longer than any fixed bound
        let http_client = reqwest::Client::builder()
            .pool_max_idle_per_host(100)
            .connect_timeout(config.dify_timeout())
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;

        let backend: Arc<dyn ChatBackend> = Arc::new(DifyClient::new(http_client, &config));
        Ok(Self::with_backend(config, backend))
    }

    /// Create application state around an existing backend
    pub fn with_backend(config: Config, backend: Arc<dyn ChatBackend>) -> Self {
        let registry = Arc::new(ConversationRegistry::new(RegistryPolicy {
            max_entries: config.registry_max_entries,
            ttl: config.registry_ttl(),
        }));
        let request_translator = RequestTranslator::new(registry.clone(), config.default_user.clone());
        let response_translator = Arc::new(ResponseTranslator::new(registry.clone()));

        Self {
            config,
            start_time: Instant::now(),
            backend,
            registry,
            request_translator,
            response_translator,
        }
    }
}
