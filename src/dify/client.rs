//! Dify API client
//!
//! Forwards translated requests to `POST {base}/chat-messages` with the static
//! app credential, in blocking or streaming mode.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use tracing::{debug, error, instrument};

use super::models::{BackendRequest, BlockingReply, DifyErrorBody};
use crate::{
    config::Config,
    error::{AppError, AppResult},
};

/// Stream type for streaming responses from the backend
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// Interface the request handlers use to reach the conversational backend
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Backend name for logging and metrics
    fn name(&self) -> &'static str;

    /// Send a blocking-mode request and wait for the complete reply
    async fn send_blocking(&self, request: &BackendRequest) -> AppResult<BlockingReply>;

    /// Send a streaming-mode request and return the raw event byte stream
    ///
    /// Errors are only returned before the stream is established; failures
    /// after that surface as items of the stream.
    async fn send_streaming(&self, request: &BackendRequest) -> AppResult<ByteStream>;
}

/// HTTP client for the Dify chat-messages API
pub struct DifyClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl DifyClient {
    /// Create a new Dify client
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            base_url: config.dify_api_url.clone(),
            api_key: config.dify_api_key.clone(),
            timeout: config.dify_timeout(),
        }
    }

    fn chat_messages_url(&self) -> String {
        format!("{}/chat-messages", self.base_url)
    }

    /// Build default headers for backend requests
    fn default_headers(&self, accept: &'static str) -> AppResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|e| {
            AppError::Internal(anyhow::anyhow!("Invalid DIFY_API_KEY header value: {}", e))
        })?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static(accept));
        Ok(headers)
    }

    /// Turn a non-2xx backend response into an upstream error
    async fn upstream_error(response: reqwest::Response) -> AppError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<DifyErrorBody>(&text)
            .ok()
            .and_then(|body| match (body.code, body.message) {
                (Some(code), Some(message)) => Some(format!("{} ({})", message, code)),
                (None, Some(message)) => Some(message),
                _ => None,
            })
            .unwrap_or(text);

        error!(status = %status, message = %message, "Dify returned an error");
        AppError::upstream(
            Some(status.as_u16()),
            format!("Dify error {}: {}", status.as_u16(), message),
        )
    }
}

#[async_trait]
impl ChatBackend for DifyClient {
    fn name(&self) -> &'static str {
        "dify"
    }

    #[instrument(skip(self, request), fields(conversation_id = %request.conversation_id))]
    async fn send_blocking(&self, request: &BackendRequest) -> AppResult<BlockingReply> {
        let url = self.chat_messages_url();
        debug!(url = %url, "Sending blocking request to Dify");

        let response = self
            .client
            .post(&url)
            .headers(self.default_headers("application/json")?)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(url = %url, error = %e, "Failed to send request to Dify");
                e
            })?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let reply = response.json::<BlockingReply>().await?;
        Ok(reply)
    }

    #[instrument(skip(self, request), fields(conversation_id = %request.conversation_id))]
    async fn send_streaming(&self, request: &BackendRequest) -> AppResult<ByteStream> {
        let url = self.chat_messages_url();
        debug!(url = %url, "Sending streaming request to Dify");

        // Only the wait for response headers is bounded; the stream itself may run long.
        let send = self
            .client
            .post(&url)
            .headers(self.default_headers("text/event-stream")?)
            .json(request)
            .send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| {
                error!(url = %url, timeout_secs = self.timeout.as_secs(), "Dify stream did not start in time");
                AppError::upstream(None, "Timed out waiting for Dify to start streaming")
            })?
            .map_err(|e| {
                error!(url = %url, error = %e, "Failed to send request to Dify");
                e
            })?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        Ok(Box::pin(response.bytes_stream()))
    }
}
