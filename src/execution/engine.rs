//! Flow Execution Engine
//!
//! The core state machine that walks an ordered list of steps from the
//! selected start index, launches each step as a child process, streams
//! its output to the progress sink and applies the stop / edge-cut /
//! failure policy.
//!
//! Runs are strictly sequential: one worker thread executes the whole
//! loop, one child process exists at a time. Cancellation is cooperative
//! and deferred; the stop flag is sampled only at the top of the loop, so
//! an in-flight step is never killed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{error, info};

use crate::progress::{NodeState, NoticeKind, ProgressSink, RunOutcome};

use super::process::ScriptRunner;
use super::state::RunState;

/// Formats the current wall-clock time for log lines, second precision.
pub(crate) fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S").to_string()
}

/// Flow execution engine.
///
/// Owns the run policy; shares [`RunState`] and the two run flags with
/// the controller that spawned it. All sink notifications happen on the
/// thread that calls [`run`](Self::run) - marshaling onto a UI thread is
/// the sink's concern.
pub struct Engine {
    state: Arc<Mutex<RunState>>,
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    runner: ScriptRunner,
    sink: Arc<dyn ProgressSink>,
}

impl Engine {
    /// Creates an engine over shared run state and flags.
    pub fn new(
        state: Arc<Mutex<RunState>>,
        running: Arc<AtomicBool>,
        stop_requested: Arc<AtomicBool>,
        runner: ScriptRunner,
        sink: Arc<dyn ProgressSink>,
    ) -> Self {
        Self {
            state,
            running,
            stop_requested,
            runner,
            sink,
        }
    }

    /// Executes the step loop on the calling thread.
    ///
    /// The caller (the run controller) has already claimed the running
    /// flag and guaranteed a non-empty step snapshot. The snapshot taken
    /// here is immutable for the run's duration; catalog edits cannot
    /// affect a run in flight.
    ///
    /// Always clears the running flag before returning, regardless of
    /// outcome, and finishes with exactly one `on_run_finished` call.
    pub fn run(&self) -> RunOutcome {
        let (steps, start_index, disabled_edges) = {
            let state = self.lock_state();
            (
                state.steps.clone(),
                state.start_index,
                state.disabled_edges.clone(),
            )
        };

        self.sink.on_run_started();
        // Clear any animation cursor left over from a previous run.
        self.sink.on_active_edge(None);
        info!(
            "Run started: {} steps, starting at index {}",
            steps.len(),
            start_index
        );

        let mut outcome = RunOutcome::Completed;

        for i in start_index..steps.len() {
            // Stop checkpoint: honored before launching the next step,
            // never by interrupting the one in flight.
            if self.stop_requested.load(Ordering::SeqCst) {
                self.sink.on_log_line(&format!(
                    "[{}] User stop honored: step {} \"{}\" and later steps will not run",
                    timestamp(),
                    i + 1,
                    steps[i].name
                ));
                self.sink.on_user_notice(NoticeKind::Info, "Flow stopped");
                info!("Run stopped by user before step {}", i + 1);
                outcome = RunOutcome::Stopped;
                break;
            }

            // Edge-cut checkpoint: the edge out of the previously
            // executed step was disabled.
            if i > start_index && disabled_edges.contains(&(i - 1)) {
                self.sink.on_log_line(&format!(
                    "[{}] Flow stopped at step {} because the incoming edge was cut",
                    timestamp(),
                    i
                ));
                self.sink.on_user_notice(NoticeKind::Info, "Flow stopped");
                info!("Run stopped at step index {} by a cut edge", i);
                outcome = RunOutcome::Stopped;
                break;
            }

            self.lock_state().current_step = Some(i);
            self.paint_running(i, start_index);
            // The edge into this step animates; the very first executed
            // step has no incoming edge.
            if i > start_index {
                self.sink.on_active_edge(Some(i - 1));
            }
            self.sink.on_center_view(i);

            info!("Executing step {}: {}", i + 1, steps[i].name);

            let result = self.runner.run(&steps[i].module, |line| {
                self.sink
                    .on_log_line(&format!("[{}] {}", timestamp(), line));
            });

            match result {
                Ok(0) => {}
                Ok(code) => {
                    self.fail_step(
                        i,
                        &steps[i].name,
                        &format!("script exited with code: {}", code),
                    );
                    outcome = RunOutcome::Failed;
                    break;
                }
                Err(e) => {
                    self.fail_step(i, &steps[i].name, &e.to_string());
                    outcome = RunOutcome::Failed;
                    break;
                }
            }
        }

        if outcome == RunOutcome::Completed {
            self.sink
                .on_log_line(&format!("[{}] Flow completed successfully", timestamp()));
            self.sink
                .on_user_notice(NoticeKind::Info, "Flow completed successfully!");
            info!("Run completed");
        }

        self.running.store(false, Ordering::SeqCst);

        // A failed run keeps the error depiction on screen so the user
        // can see where it broke; otherwise return to the idle look.
        if outcome != RunOutcome::Failed {
            self.paint_idle(start_index, steps.len());
            self.sink.on_active_edge(None);
        }

        self.sink.on_run_finished(outcome);
        outcome
    }

    /// Marks step `i` running, earlier executed steps finished and
    /// pre-start steps skipped.
    fn paint_running(&self, i: usize, start_index: usize) {
        for j in 0..start_index {
            self.sink.on_node_state(j, NodeState::Skipped);
        }
        for j in start_index..i {
            self.sink.on_node_state(j, NodeState::Finished);
        }
        self.sink.on_node_state(i, NodeState::Running);
    }

    /// Restores the idle depiction: the start node ready to run, every
    /// other node pending.
    fn paint_idle(&self, start_index: usize, len: usize) {
        for j in 0..len {
            let state = if j == start_index {
                NodeState::Start
            } else {
                NodeState::Pending
            };
            self.sink.on_node_state(j, state);
        }
    }

    /// Applies the failure policy for step `i`: log entry, error node,
    /// blocking notice. The caller terminates the loop.
    fn fail_step(&self, i: usize, name: &str, reason: &str) {
        self.sink.on_log_line(&format!(
            "[{}] [ERROR] Step {} failed: {}",
            timestamp(),
            i + 1,
            reason
        ));
        error!("Step {} \"{}\" failed: {}", i + 1, name, reason);

        self.sink.on_node_state(i, NodeState::Error);
        self.sink.on_user_notice(
            NoticeKind::Error,
            &format!("Step {} \"{}\" execution failed: {}", i + 1, name, reason),
        );
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
