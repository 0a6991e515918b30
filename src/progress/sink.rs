//! Progress Sink Interface
//!
//! The engine reports everything it does through this interface: node
//! state transitions, the animated edge, log lines, view recentering and
//! end-of-run dialogs. The presentation layer implements it once; the
//! engine never touches concrete widgets.
//!
//! Implementations must be callable from the worker thread. The bundled
//! [`QueueSink`](super::events::QueueSink) marshals calls onto an event
//! queue for single-threaded UIs.

use std::fmt;

/// Visual state of a graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Not yet reached in this run
    Pending,
    /// Selected start node, ready to run
    Start,
    /// Step currently executing
    Running,
    /// Step completed successfully this run
    Finished,
    /// Step before the start index, never executed
    Skipped,
    /// Step failed; left on screen after the run
    Error,
}

/// Severity of a user-facing notice dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Info,
    Error,
}

/// Terminal outcome of a run.
///
/// `Stopped` covers both an explicit user stop and an edge-cut
/// short-circuit: neither marks an error node nor raises a failure
/// dialog, only the log wording differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step from the start index onward ran and exited zero
    Completed,
    /// The run halted early without an error (user stop or cut edge)
    Stopped,
    /// A step failed to launch or exited non-zero
    Failed,
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RunOutcome::Completed => "completed",
            RunOutcome::Stopped => "stopped",
            RunOutcome::Failed => "failed",
        };
        f.write_str(text)
    }
}

/// Observer interface the engine reports progress through.
///
/// Calls arrive on the worker thread, in the order the engine produced
/// them. Implementations must not block for long; the worker does not
/// proceed to process output while a callback runs.
pub trait ProgressSink: Send + Sync {
    /// A run entered running mode.
    fn on_run_started(&self);

    /// The run reached a terminal outcome. Always the final call of a run.
    fn on_run_finished(&self, outcome: RunOutcome);

    /// A node changed visual state.
    fn on_node_state(&self, index: usize, state: NodeState);

    /// The animated edge changed; `None` clears it.
    fn on_active_edge(&self, edge: Option<usize>);

    /// A timestamped log line was produced.
    fn on_log_line(&self, line: &str);

    /// The view should recenter on the given node.
    fn on_center_view(&self, index: usize);

    /// A transient dialog should be shown to the user.
    fn on_user_notice(&self, kind: NoticeKind, message: &str);
}

/// Sink that discards every event.
///
/// Useful for tests and for embedding the engine without a UI.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn on_run_started(&self) {}
    fn on_run_finished(&self, _outcome: RunOutcome) {}
    fn on_node_state(&self, _index: usize, _state: NodeState) {}
    fn on_active_edge(&self, _edge: Option<usize>) {}
    fn on_log_line(&self, _line: &str) {}
    fn on_center_view(&self, _index: usize) {}
    fn on_user_notice(&self, _kind: NoticeKind, _message: &str) {}
}
