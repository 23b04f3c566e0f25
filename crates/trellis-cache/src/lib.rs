//! # trellis-cache
//!
//! The bounded, ordered view of log records kept on the client.
//!
//! - [`diff`]: pure state transformations (apply a diff, upsert, remove,
//!   derive the next poll cursor, evict by age and count). No I/O, no clocks
//!   except where a caller passes `now`.
//! - [`LogCache`]: owns one [`LogState`](trellis_core::entities::LogState),
//!   replaces it atomically on every mutation, serves read-only lookups and
//!   notifies observers of each change.
//!
//! One cache exists per [`LogScope`](trellis_core::enums::LogScope); caches
//! never share state.

pub mod diff;

mod cache;
mod stats;

pub use cache::{CacheEvent, CacheSettings, LogCache};
pub use stats::CacheStats;
