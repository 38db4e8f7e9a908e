//! Stream relay
//!
//! Drives one backend event stream to one client stream as an explicit state
//! machine: `Open -> Closing(reason) -> Closed`. The relay runs in its own task
//! and delivers frames through a bounded channel whose receiving end is the HTTP
//! response body. When the client goes away the body is dropped, the channel
//! closes, and the relay drops the backend stream on its next poll.

use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{data_payload, format_sse_chunk, format_sse_done, SseLineBuffer};
use crate::{
    conversation::ConversationKey,
    routes::metrics::record_stream_closed,
    translate::{ResponseTranslator, StreamContext},
};

/// Frames buffered between the relay task and the response body
pub const RELAY_CHANNEL_CAPACITY: usize = 16;

/// Why a relayed stream stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// Backend finished its stream normally
    BackendEnded,
    /// Backend connection failed mid-stream
    BackendError,
    /// Client stopped reading
    ClientDisconnected,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::BackendEnded => "backend_ended",
            CloseReason::BackendError => "backend_error",
            CloseReason::ClientDisconnected => "client_disconnected",
        }
    }
}

/// Lifecycle of a relayed stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    Open,
    Closing(CloseReason),
    Closed(CloseReason),
}

/// Outcome of a finished relay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelaySummary {
    pub reason: CloseReason,
    /// Translated chunks produced, excluding the terminal sentinel
    pub chunks: usize,
}

/// Translates backend frames into client frames for one stream
pub struct StreamRelay {
    translator: Arc<ResponseTranslator>,
    key: ConversationKey,
    ctx: StreamContext,
    buffer: SseLineBuffer,
    state: RelayState,
    chunks: usize,
}

impl StreamRelay {
    pub fn new(translator: Arc<ResponseTranslator>, key: ConversationKey, ctx: StreamContext) -> Self {
        Self {
            translator,
            key,
            ctx,
            buffer: SseLineBuffer::new(),
            state: RelayState::Open,
            chunks: 0,
        }
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Translate one complete line into at most one client frame
    fn translate_line(&mut self, line: &str) -> Option<Bytes> {
        let payload = data_payload(line)?;
        if payload.is_empty() || payload == "[DONE]" {
            return None;
        }

        let chunk = self
            .translator
            .translate_stream_event(payload, &self.key, &self.ctx)?;

        match format_sse_chunk(&chunk) {
            Ok(frame) => {
                self.chunks += 1;
                Some(frame)
            }
            Err(e) => {
                warn!(error = %e, "Failed to serialize stream chunk");
                None
            }
        }
    }

    /// Handle one raw data frame from the backend.
    ///
    /// A frame may hold several events, or part of one. Each translated event
    /// becomes its own client frame, in order.
    pub fn on_frame(&mut self, bytes: &[u8]) -> Vec<Bytes> {
        if self.state != RelayState::Open {
            return Vec::new();
        }
        self.buffer
            .feed(bytes)
            .iter()
            .filter_map(|line| self.translate_line(line))
            .collect()
    }

    /// Backend stream ended: flush a trailing unterminated event, then the sentinel
    pub fn on_end(&mut self) -> Vec<Bytes> {
        if self.state != RelayState::Open {
            return Vec::new();
        }
        let mut frames: Vec<Bytes> = self
            .buffer
            .take_remaining()
            .and_then(|line| self.translate_line(&line))
            .into_iter()
            .collect();
        frames.push(format_sse_done());
        self.state = RelayState::Closing(CloseReason::BackendEnded);
        frames
    }

    /// Backend stream failed: terminate the client stream gracefully
    pub fn on_error(&mut self, error: &dyn Display) -> Vec<Bytes> {
        if self.state != RelayState::Open {
            return Vec::new();
        }
        warn!(error = %error, chunks = self.chunks, "Backend stream failed, closing client stream");
        self.state = RelayState::Closing(CloseReason::BackendError);
        vec![format_sse_done()]
    }

    /// Client went away: nothing more is written
    pub fn on_disconnect(&mut self) {
        if self.state == RelayState::Open {
            debug!(chunks = self.chunks, "Client disconnected from stream");
            self.state = RelayState::Closing(CloseReason::ClientDisconnected);
        }
    }

    /// Finish the relay, recording how it ended
    fn close(&mut self) -> RelaySummary {
        let reason = match self.state {
            RelayState::Closing(reason) | RelayState::Closed(reason) => reason,
            RelayState::Open => CloseReason::BackendEnded,
        };
        self.state = RelayState::Closed(reason);
        record_stream_closed(reason.as_str());
        RelaySummary {
            reason,
            chunks: self.chunks,
        }
    }

    /// Drive `backend` to completion, delivering frames to `tx`.
    ///
    /// The backend stream is dropped before this returns, whatever the outcome.
    pub async fn run<S, E>(mut self, mut backend: S, tx: mpsc::Sender<Bytes>) -> RelaySummary
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: Display,
    {
        loop {
            tokio::select! {
                biased;

                _ = tx.closed() => {
                    self.on_disconnect();
                    break;
                }

                item = backend.next() => match item {
                    Some(Ok(bytes)) => {
                        let frames = self.on_frame(&bytes);
                        if !deliver(&tx, frames).await {
                            self.on_disconnect();
                            break;
                        }
                    }
                    Some(Err(err)) => {
                        let frames = self.on_error(&err);
                        deliver(&tx, frames).await;
                        break;
                    }
                    None => {
                        let frames = self.on_end();
                        deliver(&tx, frames).await;
                        break;
                    }
                },
            }
        }

        drop(backend);
        self.close()
    }
}

/// Send frames one at a time; `false` once the client is gone
async fn deliver(tx: &mpsc::Sender<Bytes>, frames: Vec<Bytes>) -> bool {
    for frame in frames {
        if tx.send(frame).await.is_err() {
            return false;
        }
    }
    true
}

/// Adapt the relay's receiving channel into a response body stream
pub fn body_stream(
    mut rx: mpsc::Receiver<Bytes>,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    async_stream::stream! {
        while let Some(frame) = rx.recv().await {
            yield Ok(frame);
        }
    }
}
