//! Progress Event Queue
//!
//! Marshals sink calls from the worker thread onto a single-consumer
//! event queue. The worker enqueues and moves on; it never waits for the
//! consumer. Events from one run are delivered in the order they were
//! enqueued. No ordering is promised across two runs, but a new run
//! cannot start while the previous one is still running, so the receiver
//! never sees interleaved runs.

use std::sync::mpsc::{channel, Receiver, Sender};

use super::sink::{NodeState, NoticeKind, ProgressSink, RunOutcome};

/// One sink call, reified for queue transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    RunStarted,
    RunFinished(RunOutcome),
    NodeState { index: usize, state: NodeState },
    ActiveEdge(Option<usize>),
    LogLine(String),
    CenterView(usize),
    UserNotice { kind: NoticeKind, message: String },
}

/// Sink half of the progress queue.
///
/// Sends are fire-and-forget: a disconnected receiver (the UI went away)
/// silently drops the event, matching the fire-and-forget contract.
#[derive(Clone)]
pub struct QueueSink {
    tx: Sender<ProgressEvent>,
}

impl QueueSink {
    fn emit(&self, event: ProgressEvent) {
        let _ = self.tx.send(event);
    }
}

impl ProgressSink for QueueSink {
    fn on_run_started(&self) {
        self.emit(ProgressEvent::RunStarted);
    }

    fn on_run_finished(&self, outcome: RunOutcome) {
        self.emit(ProgressEvent::RunFinished(outcome));
    }

    fn on_node_state(&self, index: usize, state: NodeState) {
        self.emit(ProgressEvent::NodeState { index, state });
    }

    fn on_active_edge(&self, edge: Option<usize>) {
        self.emit(ProgressEvent::ActiveEdge(edge));
    }

    fn on_log_line(&self, line: &str) {
        self.emit(ProgressEvent::LogLine(line.to_string()));
    }

    fn on_center_view(&self, index: usize) {
        self.emit(ProgressEvent::CenterView(index));
    }

    fn on_user_notice(&self, kind: NoticeKind, message: &str) {
        self.emit(ProgressEvent::UserNotice {
            kind,
            message: message.to_string(),
        });
    }
}

/// Creates a progress queue.
///
/// The [`QueueSink`] goes to the engine/controller; the receiver is
/// drained by the UI or event thread.
pub fn progress_channel() -> (QueueSink, Receiver<ProgressEvent>) {
    let (tx, rx) = channel();
    (QueueSink { tx }, rx)
}
