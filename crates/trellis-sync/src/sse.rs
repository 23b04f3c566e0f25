//! Incremental `text/event-stream` decoder.
//!
//! Bytes arrive in arbitrary chunks; the decoder buffers partial lines and
//! emits one [`SseFrame`] per blank-line-terminated event. Supported fields
//! are `event`, `data` (multi-line, joined with `\n`) and `id`. Comment lines
//! (`:`) and unknown fields such as `retry` are ignored. Events with no data
//! are dropped. An incomplete trailing event at end of stream is discarded.

use std::collections::VecDeque;

use futures::{Stream, StreamExt};

use crate::error::SyncError;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name; `None` for the generic `message` event.
    pub event: Option<String>,
    pub data: String,
    /// Last event id seen on the stream.
    pub id: Option<String>,
}

impl SseFrame {
    /// A generic (unnamed) frame.
    #[must_use]
    pub fn message(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
            id: None,
        }
    }

    /// A named frame.
    #[must_use]
    pub fn named(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: Some(event.into()),
            data: data.into(),
            id: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
    last_id: Option<String>,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event it completes.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=newline).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            let line = String::from_utf8_lossy(&line);
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        frames
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            "id" => self.last_id = Some(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take().filter(|name| !name.is_empty());
        if self.data.is_empty() {
            return None;
        }
        Some(SseFrame {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
            id: self.last_id.clone(),
        })
    }
}

struct FrameState<S> {
    bytes: S,
    decoder: SseDecoder,
    pending: VecDeque<SseFrame>,
    done: bool,
}

/// Adapt a byte-chunk stream into a stream of decoded frames.
///
/// A transport error is yielded once and ends the stream.
pub fn decode_frames<S, B, E>(bytes: S) -> impl Stream<Item = Result<SseFrame, SyncError>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + Unpin + 'static,
    B: AsRef<[u8]> + Send,
    E: Into<SyncError> + Send,
{
    let state = FrameState {
        bytes,
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(frame) = state.pending.pop_front() {
                return Some((Ok(frame), state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    let frames = state.decoder.feed(chunk.as_ref());
                    state.pending.extend(frames);
                }
                Some(Err(error)) => {
                    state.done = true;
                    return Some((Err(error.into()), state));
                }
                None => state.done = true,
            }
        }
    })
}
