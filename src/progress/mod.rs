//! Progress Reporting Module
//!
//! Everything the engine tells the outside world goes through this
//! module.
//!
//! # Structure
//!
//! - [`sink`]: The [`ProgressSink`] observer interface and its vocabulary
//! - [`events`]: Queue-backed sink for marshaling onto a UI event thread

pub mod events;
pub mod sink;

pub use events::{progress_channel, ProgressEvent, QueueSink};
pub use sink::{NodeState, NoticeKind, NullSink, ProgressSink, RunOutcome};
