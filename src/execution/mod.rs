//! Flow Execution Module
//!
//! Provides the core execution machinery: the per-step process runner,
//! the sequential run-loop engine and the controller that gates user
//! intents around an active run.
//!
//! # Architecture
//!
//! - [`state`]: Shared run state (start index, disabled edges, current step)
//! - [`process`]: Launches one step script and streams its output
//! - [`engine`]: The run loop and its stop / edge-cut / failure policy
//! - [`controller`]: UI-facing intents and the background worker thread

pub mod controller;
pub mod engine;
pub mod process;
pub mod state;

pub use controller::RunController;
pub use engine::Engine;
pub use process::{ProcessError, ScriptRunner};
pub use state::RunState;
