//! # trellis-sync
//!
//! Keeps a [`trellis_cache::LogCache`] current from two channels:
//! - a push channel over `text/event-stream` that delivers new records and
//!   "diff available" hints, with bounded fixed-interval reconnection
//! - a poll scheduler that fetches incremental diffs on a fixed cadence and
//!   fills whatever the push channel missed
//!
//! [`LogSync`] composes both around one cache per scope. The network
//! collaborators sit behind [`DiffSource`] and [`EventTransport`] so the
//! scheduling logic can be driven by in-memory fakes.

mod coordinator;
mod error;
mod http;
mod poll;
mod push;
mod source;
mod sse;
mod status;
mod transport;
mod wire;

pub use coordinator::{LogSync, SyncOptions, SyncStatus};
pub use error::SyncError;
pub use http::{check_response, diff_url, events_url};
pub use poll::{PollHandle, PollOutcome, PollTrigger, Poller};
pub use push::{PushChannel, PushChannelBuilder, PushSettings};
pub use source::{DiffSource, HttpDiffSource};
pub use sse::{SseDecoder, SseFrame, decode_frames};
pub use status::{ConnectionPhase, ConnectionStatus};
pub use transport::{EventStream, EventTransport, HttpEventTransport};
pub use wire::{decode_diff, decode_event};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
