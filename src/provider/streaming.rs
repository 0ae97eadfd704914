//! Client-side stream consumption engine.
//!
//! Consumes a byte stream from a streaming HTTP response, decodes UTF-8
//! incrementally, splits on SSE frame boundaries, and routes each `data:`
//! payload through the active provider's response parser. Normalized text
//! deltas are pushed to a caller-supplied sink. Incomplete frames and split
//! multi-byte characters are buffered across reads; a single bad payload is
//! skipped, never fatal.

use super::parse::parse_chunk;
use super::types::ProviderId;
use crate::error::{Error, Result};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt;
use tokio_util::sync::CancellationToken;

/// A single decoded SSE frame (text between two blank-line separators).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    raw: String,
}

impl SseFrame {
    /// The `event:` field, if the frame has one.
    pub fn event(&self) -> Option<&str> {
        self.raw
            .lines()
            .find_map(|line| line.strip_prefix("event: "))
            .map(str::trim)
    }

    /// All `data:` payloads in the frame.
    pub fn data_lines(&self) -> impl Iterator<Item = &str> {
        self.raw
            .lines()
            .filter_map(|line| line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")))
            .map(str::trim)
    }

    /// True for comment/heartbeat frames (`: text`).
    pub fn is_comment(&self) -> bool {
        self.raw.lines().all(|line| line.starts_with(':'))
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }
}

/// Incremental SSE frame decoder.
///
/// Byte chunks may end in the middle of a multi-byte UTF-8 character or an
/// SSE frame; both are buffered until completed by a later read.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending_bytes: Vec<u8>,
    pending_text: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes in, get completed frames out.
    pub fn push(&mut self, input: &[u8]) -> Vec<SseFrame> {
        self.pending_bytes.extend_from_slice(input);
        self.decode_pending();

        let mut frames = Vec::new();
        while let Some(pos) = self.pending_text.find("\n\n") {
            let raw = self.pending_text[..pos].to_string();
            self.pending_text.drain(..pos + 2);
            if !raw.trim().is_empty() {
                frames.push(SseFrame { raw });
            }
        }
        frames
    }

    fn decode_pending(&mut self) {
        loop {
            match std::str::from_utf8(&self.pending_bytes) {
                Ok(text) => {
                    self.pending_text.push_str(text);
                    self.pending_bytes.clear();
                    return;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    // Safe: from_utf8 validated the prefix.
                    self.pending_text
                        .push_str(std::str::from_utf8(&self.pending_bytes[..valid]).unwrap());
                    match e.error_len() {
                        Some(bad) => {
                            // Truly invalid sequence; replace and move on.
                            self.pending_text.push(char::REPLACEMENT_CHARACTER);
                            self.pending_bytes.drain(..valid + bad);
                        }
                        None => {
                            // Incomplete trailing character, wait for more bytes.
                            self.pending_bytes.drain(..valid);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// True for both `[DONE]` sentinel encodings: the bare OpenAI-compatible form
/// and the JSON-quoted form written by `SseConnection::end`.
pub fn is_done_sentinel(data: &str) -> bool {
    data == "[DONE]" || data == "\"[DONE]\""
}

/// How a consumed stream finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Stream ended normally (reader exhausted or `[DONE]` observed).
    Completed,
    /// Cancelled by the caller; the sink saw no content after the abort.
    Aborted,
}

/// Reads vendor-formatted SSE chunks and emits normalized content deltas.
pub struct ChatStreamHandler {
    provider: ProviderId,
    cancel: CancellationToken,
}

impl ChatStreamHandler {
    pub fn new(provider: ProviderId, cancel: CancellationToken) -> Self {
        Self { provider, cancel }
    }

    /// Consume the byte stream, invoking `on_content` for every non-empty
    /// normalized delta, strictly in arrival order.
    pub async fn process_stream<S, E, F>(&self, mut stream: S, mut on_content: F) -> Result<StreamOutcome>
    where
        S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
        E: fmt::Display,
        F: FnMut(&str),
    {
        let mut decoder = SseDecoder::new();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Ok(StreamOutcome::Aborted),
                next = stream.next() => next,
            };

            let bytes = match next {
                None => return Ok(StreamOutcome::Completed),
                Some(Err(e)) => {
                    return Err(Error::Transport {
                        status: None,
                        message: e.to_string(),
                    })
                }
                Some(Ok(bytes)) => bytes,
            };

            for frame in decoder.push(&bytes) {
                for data in frame.data_lines() {
                    if self.cancel.is_cancelled() {
                        return Ok(StreamOutcome::Aborted);
                    }
                    if is_done_sentinel(data) {
                        return Ok(StreamOutcome::Completed);
                    }

                    let value: serde_json::Value = match serde_json::from_str(data) {
                        Ok(value) => value,
                        Err(e) => {
                            // Partial or malformed payload: skip the chunk,
                            // keep the stream alive.
                            tracing::debug!(error = %e, "skipping unparseable SSE payload");
                            continue;
                        }
                    };

                    let chunk = parse_chunk(self.provider, &value);
                    if !chunk.content.is_empty() {
                        on_content(&chunk.content);
                    }
                    if chunk.done {
                        return Ok(StreamOutcome::Completed);
                    }
                }
            }
        }
    }
}
