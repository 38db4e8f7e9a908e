//! Common test utilities for the Dify Bridge
//!
//! Builds the real router against a mocked Dify server.

#![allow(dead_code)]

use std::sync::Arc;

use axum_test::TestServer;
use dify_bridge::{routes::create_router, AppState, Config};

/// Test configuration constants
pub mod constants {
    pub const TEST_DIFY_API_KEY: &str = "test-dify-api-key";
    pub const TEST_DEFAULT_MODEL: &str = "dify";
    pub const TEST_DEFAULT_USER: &str = "bridge-test-user";
}

/// Config pointing at a mock Dify server
pub fn test_config(dify_url: &str) -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        dify_api_url: dify_url.trim_end_matches('/').to_string(),
        dify_api_key: constants::TEST_DIFY_API_KEY.to_string(),
        dify_timeout_seconds: 5,
        default_model: constants::TEST_DEFAULT_MODEL.to_string(),
        default_user: constants::TEST_DEFAULT_USER.to_string(),
        registry_max_entries: 100,
        registry_ttl_seconds: 3600,
    }
}

/// Application state wired to a mock Dify server
pub fn test_state(dify_url: &str) -> Arc<AppState> {
    Arc::new(AppState::new(test_config(dify_url)).expect("Failed to create app state"))
}

/// Test server running the real router against a mock Dify server
pub fn test_server(dify_url: &str) -> (TestServer, Arc<AppState>) {
    let state = test_state(dify_url);
    let app = create_router(state.clone());
    let server = TestServer::new(app).expect("Failed to create test server");
    (server, state)
}
