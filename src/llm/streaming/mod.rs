//! Chat stream decoding
//!
//! Turns the raw text fragments of a chat response body into Deltas. The
//! body is line oriented: lines of interest start with `data:` and carry one
//! JSON record each. Fragments arrive in arbitrary sizes, so any trailing
//! text not yet terminated by a newline is buffered until the next fragment
//! (or until the body ends).

mod utf8;

pub use utf8::Utf8Carry;

use std::collections::VecDeque;

use futures::{Stream, StreamExt};

use super::error::TransportError;
use super::types::{Delta, StreamRecord};
use crate::core::errors::ProtocolError;

const DATA_MARKER: &str = "data:";
const DONE_MARKER: &str = "[DONE]";

/// Line-buffering decoder for the chat response body
///
/// # Example
/// ```
/// use bota_cli::llm::streaming::StreamDecoder;
///
/// let mut decoder = StreamDecoder::new();
///
/// // a record split across two fragments
/// assert!(decoder.feed("data: {\"choices\":[{\"delta\":{\"content\":\"hel").is_empty());
/// let deltas = decoder.feed("lo\"}}]}\n\n");
/// assert_eq!(deltas[0].text, "hello");
///
/// // last line without a trailing newline is flushed at the end
/// decoder.feed("data: {\"choices\":[{\"delta\":{\"content\":\"!\"}}]}");
/// decoder.finish();
/// assert_eq!(decoder.accumulator(), "hello!");
/// ```
#[derive(Debug, Default)]
pub struct StreamDecoder {
    /// Text after the last newline seen so far
    partial_line: String,
    /// Concatenation of every emitted delta
    accumulator: String,
    diagnostics: Vec<ProtocolError>,
    upstream_errors: Vec<String>,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one fragment and return the deltas of every line it completed
    ///
    /// An unterminated tail stays buffered and is not emitted on this call.
    pub fn feed(&mut self, fragment: &str) -> Vec<Delta> {
        self.partial_line.push_str(fragment);

        let Some(last_newline) = self.partial_line.rfind('\n') else {
            return Vec::new();
        };
        let rest = self.partial_line.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.partial_line, rest);

        complete
            .split('\n')
            .filter_map(|line| self.process_line(line))
            .collect()
    }

    /// Flush the buffered tail as a final line once the body has ended
    pub fn finish(&mut self) -> Vec<Delta> {
        let tail = std::mem::take(&mut self.partial_line);
        if !tail.is_empty() {
            tracing::debug!("Flushing unterminated final line ({} bytes)", tail.len());
        }
        self.process_line(&tail).into_iter().collect()
    }

    fn process_line(&mut self, line: &str) -> Option<Delta> {
        let line = line.trim_end();
        if line.is_empty() {
            return None;
        }

        let Some(payload) = line.strip_prefix(DATA_MARKER) else {
            tracing::trace!("Ignoring non-data line: {}", line);
            return None;
        };
        let payload = payload.trim_start();
        if payload == DONE_MARKER {
            return None;
        }

        let record = match serde_json::from_str::<StreamRecord>(payload) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!("Dropping malformed stream record: {}", e);
                self.diagnostics.push(ProtocolError {
                    line: payload.to_string(),
                    reason: e.to_string(),
                });
                return None;
            }
        };

        if let Some(error) = record.upstream_error() {
            tracing::warn!("Chat service reported an upstream error: {}", error);
            self.upstream_errors.push(error);
        }

        let delta = record.delta()?;
        tracing::debug!("Delta: {} bytes via {:?}", delta.text.len(), delta.source);
        self.accumulator.push_str(&delta.text);
        Some(delta)
    }

    /// Running concatenation of all deltas
    pub fn accumulator(&self) -> &str {
        &self.accumulator
    }

    /// Text received but not yet terminated by a newline
    pub fn partial_line(&self) -> &str {
        &self.partial_line
    }

    /// Lines that were dropped because their record failed to parse
    pub fn diagnostics(&self) -> &[ProtocolError] {
        &self.diagnostics
    }

    /// Error texts reported in-band by the chat service
    pub fn upstream_errors(&self) -> &[String] {
        &self.upstream_errors
    }

    fn summary(&mut self) -> StreamSummary {
        StreamSummary {
            accumulated: self.accumulator.clone(),
            diagnostics: std::mem::take(&mut self.diagnostics),
            upstream_errors: std::mem::take(&mut self.upstream_errors),
        }
    }
}

/// Final bookkeeping of a stream that ended normally
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamSummary {
    pub accumulated: String,
    pub diagnostics: Vec<ProtocolError>,
    pub upstream_errors: Vec<String>,
}

/// Items produced by [`decode_fragments`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    Delta(Delta),
    /// The transport reported end of body; no further items follow
    End(StreamSummary),
    /// The transport failed; no further items follow
    Failed(TransportError),
}

struct DecodeState<S> {
    fragments: S,
    decoder: StreamDecoder,
    ready: VecDeque<StreamItem>,
    finished: bool,
}

/// Adapt a stream of text fragments into a stream of decoded items
///
/// Suspends exactly once per awaited fragment. Dropping the returned stream
/// drops the underlying transport stream.
pub fn decode_fragments<S>(fragments: S) -> impl Stream<Item = StreamItem>
where
    S: Stream<Item = Result<String, TransportError>> + Unpin,
{
    let state = DecodeState {
        fragments,
        decoder: StreamDecoder::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.ready.pop_front() {
                return Some((item, state));
            }
            if state.finished {
                return None;
            }

            match state.fragments.next().await {
                Some(Ok(fragment)) => {
                    let deltas = state.decoder.feed(&fragment);
                    state.ready.extend(deltas.into_iter().map(StreamItem::Delta));
                }
                Some(Err(err)) => {
                    state.finished = true;
                    state.ready.push_back(StreamItem::Failed(err));
                }
                None => {
                    state.finished = true;
                    let deltas = state.decoder.finish();
                    state.ready.extend(deltas.into_iter().map(StreamItem::Delta));
                    let summary = state.decoder.summary();
                    state.ready.push_back(StreamItem::End(summary));
                }
            }
        }
    })
}
