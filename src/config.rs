//! Configuration management for the bridge
//!
//! Configuration is loaded from environment variables.

use std::env;
use std::time::Duration;

use anyhow::{ensure, Context, Result};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,

    /// Dify API base URL (without trailing slash)
    pub dify_api_url: String,
    /// Static Dify app credential, sent as a bearer token
    pub dify_api_key: String,
    /// Connect and first-byte timeout for backend calls (in seconds)
    pub dify_timeout_seconds: u64,

    /// Model name reported back when the client does not send one
    pub default_model: String,
    /// Backend user identifier when the client does not send one
    pub default_user: String,

    /// Maximum number of tracked conversations before LRU eviction
    pub registry_max_entries: usize,
    /// Idle expiry for tracked conversations (in seconds, 0 disables)
    pub registry_ttl_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let dify_timeout_seconds: u64 = env::var("DIFY_TIMEOUT_SECONDS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .context("Invalid DIFY_TIMEOUT_SECONDS")?;
        ensure!(
            dify_timeout_seconds > 0,
            "Invalid DIFY_TIMEOUT_SECONDS: must be greater than 0"
        );

        Ok(Self {
            host: env::var("BRIDGE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env::var("BRIDGE_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("Invalid BRIDGE_PORT")?,

            dify_api_url: env::var("DIFY_API_URL")
                .context("DIFY_API_URL must be set")?
                .trim_end_matches('/')
                .to_string(),
            dify_api_key: env::var("DIFY_API_KEY").context("DIFY_API_KEY must be set")?,
            dify_timeout_seconds,

            default_model: env::var("DEFAULT_MODEL").unwrap_or_else(|_| "dify".to_string()),
            default_user: env::var("DEFAULT_USER")
                .unwrap_or_else(|_| "default-user".to_string()),

            registry_max_entries: env::var("REGISTRY_MAX_ENTRIES")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .context("Invalid REGISTRY_MAX_ENTRIES")?,
            registry_ttl_seconds: env::var("REGISTRY_TTL_SECONDS")
                .unwrap_or_else(|_| "86400".to_string())
                .parse()
                .context("Invalid REGISTRY_TTL_SECONDS")?,
        })
    }

    /// Backend timeout as a `Duration`
    pub fn dify_timeout(&self) -> Duration {
        Duration::from_secs(self.dify_timeout_seconds)
    }

    /// Registry TTL, `None` when expiry is disabled
    pub fn registry_ttl(&self) -> Option<Duration> {
        (self.registry_ttl_seconds > 0).then(|| Duration::from_secs(self.registry_ttl_seconds))
    }
}
