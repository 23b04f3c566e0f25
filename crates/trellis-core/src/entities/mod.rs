//! Entity structs for the log view.
//!
//! Records and diffs derive `Serialize` and `Deserialize` for the wire formats
//! of the fetch-diff endpoint and the push channel. [`LogRecord`] also derives
//! `JsonSchema` so the record wire schema can be validated in tests.

mod diff;
mod event;
mod record;
mod state;

pub use diff::{DiffQuery, DiffSize, LogDiff, QueryFilters};
pub use event::PushEvent;
pub use record::{LogRecord, parse_timestamp};
pub use state::LogState;
