//! SSE (Server-Sent Events) streaming utilities
//!
//! Line buffering for the backend's event stream, frame formatting for the
//! client stream, and the [`relay::StreamRelay`] that connects the two.

pub mod relay;

use bytes::{Bytes, BytesMut};

use crate::openai::ChatCompletionChunk;

pub use relay::{body_stream, CloseReason, RelayState, RelaySummary, StreamRelay};

/// Buffer for accumulating incomplete SSE lines across chunk boundaries.
///
/// # Example
/// ```
/// use dify_bridge::streaming::SseLineBuffer;
///
/// let mut buffer = SseLineBuffer::new();
///
/// let lines1 = buffer.feed(b"data: {\"answer\":\"hel");
/// assert!(lines1.is_empty());
///
/// let lines2 = buffer.feed(b"lo\"}\n");
/// assert_eq!(lines2, vec!["data: {\"answer\":\"hello\"}"]);
/// ```
#[derive(Debug, Default)]
pub struct SseLineBuffer {
    /// Raw bytes of the unterminated trailing line
    incomplete: BytesMut,
}

impl SseLineBuffer {
    /// Create a new empty buffer
    pub fn new() -> Self {
        Self {
            incomplete: BytesMut::new(),
        }
    }

    /// Feed bytes into the buffer and return any complete lines.
    ///
    /// Lines are split on `\n` before decoding, so a multi-byte character cut
    /// by a frame boundary is reassembled intact. A trailing `\r` is stripped
    /// and blank lines are skipped. Incomplete trailing data is kept for the
    /// next call.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.incomplete.extend_from_slice(bytes);

        let mut complete_lines = Vec::new();

        while let Some(newline_pos) = self.incomplete.iter().position(|&b| b == b'\n') {
            let raw = self.incomplete.split_to(newline_pos + 1);
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);

            if !line.is_empty() {
                complete_lines.push(line.to_string());
            }
        }

        complete_lines
    }

    /// Check if there's any incomplete data remaining in the buffer.
    pub fn has_incomplete(&self) -> bool {
        !self.incomplete.is_empty()
    }

    /// Take the unterminated trailing line, if any, leaving the buffer empty.
    ///
    /// Call this at end of stream so a final event without a newline is not lost.
    pub fn take_remaining(&mut self) -> Option<String> {
        let rest = self.incomplete.split();
        let rest = String::from_utf8_lossy(&rest);
        let rest = rest.trim_end_matches('\r');
        (!rest.trim().is_empty()).then(|| rest.to_string())
    }
}

/// Payload of an SSE `data:` line, `None` for any other field or comment
pub fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// Format a chunk as an SSE data event: `data: {json}\n\n`
pub fn format_sse_chunk(chunk: &ChatCompletionChunk) -> Result<Bytes, serde_json::Error> {
    let json = serde_json::to_string(chunk)?;
    Ok(Bytes::from(format!("data: {}\n\n", json)))
}

/// The terminal sentinel frame: `data: [DONE]\n\n`
pub fn format_sse_done() -> Bytes {
    Bytes::from_static(b"data: [DONE]\n\n")
}
