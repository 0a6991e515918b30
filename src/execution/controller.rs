//! Run Controller
//!
//! Accepts user intents from the presentation layer and forwards them
//! into engine state under one rule: while a run is active, every
//! mutating intent is a silent no-op and only a stop request gets
//! through. Launches each run as a single background worker thread so
//! the calling (UI) thread never blocks on process I/O.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

use log::{info, warn};

use crate::catalog::FlowDefinition;
use crate::progress::{ProgressSink, RunOutcome};

use super::engine::{timestamp, Engine};
use super::process::ScriptRunner;
use super::state::RunState;

/// Drives the engine on behalf of the presentation layer.
///
/// All methods take `&self`; the controller is shared freely with UI
/// callbacks. One run may be active at a time per controller.
pub struct RunController {
    state: Arc<Mutex<RunState>>,
    running: Arc<AtomicBool>,
    stop_requested: Arc<AtomicBool>,
    runner: ScriptRunner,
    sink: Arc<dyn ProgressSink>,
    worker: Mutex<Option<JoinHandle<RunOutcome>>>,
}

impl RunController {
    /// Creates a controller with no flow selected.
    pub fn new(runner: ScriptRunner, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(RunState::new())),
            running: Arc::new(AtomicBool::new(false)),
            stop_requested: Arc::new(AtomicBool::new(false)),
            runner,
            sink,
            worker: Mutex::new(None),
        }
    }

    /// True strictly between run start and run teardown.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns a copy of the current run state for redraws.
    pub fn snapshot(&self) -> RunState {
        self.lock_state().clone()
    }

    /// Selects the active flow, seeding the run state with its steps.
    ///
    /// Rejected while a run is active. Returns true if the selection was
    /// applied.
    pub fn select_flow(&self, key: &str, flow: &FlowDefinition) -> bool {
        if self.is_running() {
            warn!("Flow selection ignored while a run is active");
            return false;
        }

        self.lock_state().seed_flow(key, flow.steps.clone());
        info!("Selected flow \"{}\" ({} steps)", key, flow.steps.len());
        true
    }

    /// Sets the step the next run starts from. No-op while running.
    pub fn select_start(&self, index: usize) {
        if self.is_running() {
            return;
        }
        self.lock_state().select_start(index);
    }

    /// Cuts the edge between step `index` and step `index + 1`.
    /// Idempotent; no-op while running.
    pub fn disable_edge(&self, index: usize) {
        if self.is_running() {
            return;
        }
        self.lock_state().disable_edge(index);
    }

    /// Clears disabled edges and the start selection. No-op while
    /// running. The accumulated log panel is presentation-owned; clearing
    /// it is the caller's concern.
    pub fn reset(&self) {
        if self.is_running() {
            return;
        }
        self.lock_state().reset();
        info!("Run state reset");
    }

    /// Requests a cooperative stop of the active run.
    ///
    /// Never interrupts the step in flight; the engine honors the flag
    /// before launching the next step. No-op when nothing is running.
    pub fn request_stop(&self) {
        if !self.is_running() {
            return;
        }

        self.stop_requested.store(true, Ordering::SeqCst);

        let current = self.lock_state().current_step;
        let line = match current {
            Some(i) => format!(
                "[{}] Stop requested: step {} is still running; execution halts before step {}",
                timestamp(),
                i + 1,
                i + 2
            ),
            None => format!("[{}] Stop requested before the first step", timestamp()),
        };
        self.sink.on_log_line(&line);
        info!("Stop requested");
    }

    /// Starts executing the active flow from the selected start index.
    ///
    /// Rejected (returns false) when no steps are loaded or a run is
    /// already active. On success the whole step loop runs on one
    /// detached worker thread and this call returns immediately.
    pub fn start_run(&self) -> bool {
        // Claim the running flag first so no mutating intent can slip in
        // between validation and launch.
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Run request ignored: a run is already active");
            return false;
        }

        if self.lock_state().is_empty() {
            self.running.store(false, Ordering::SeqCst);
            warn!("Run request ignored: no flow steps loaded");
            return false;
        }

        self.stop_requested.store(false, Ordering::SeqCst);

        let engine = Engine::new(
            Arc::clone(&self.state),
            Arc::clone(&self.running),
            Arc::clone(&self.stop_requested),
            self.runner.clone(),
            Arc::clone(&self.sink),
        );

        let spawned = std::thread::Builder::new()
            .name("stepflow-worker".to_string())
            .spawn(move || engine.run());

        match spawned {
            Ok(handle) => {
                *self.lock_worker() = Some(handle);
                true
            }
            Err(e) => {
                warn!("Failed to spawn worker thread: {}", e);
                self.running.store(false, Ordering::SeqCst);
                false
            }
        }
    }

    /// Blocks until the active run finishes and returns its outcome.
    ///
    /// Returns `None` when no run was started since the last wait. Used
    /// by the CLI and by tests; a GUI would instead react to
    /// `on_run_finished`.
    pub fn wait(&self) -> Option<RunOutcome> {
        let handle = self.lock_worker().take()?;
        handle.join().ok()
    }

    fn lock_state(&self) -> MutexGuard<'_, RunState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_worker(&self) -> MutexGuard<'_, Option<JoinHandle<RunOutcome>>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StepDescriptor;
    use crate::progress::{progress_channel, NodeState, ProgressEvent};
    use std::fs;
    use std::path::Path;
    use std::sync::mpsc::Receiver;
    use std::time::Duration;
    use tempfile::{tempdir, TempDir};

    fn write_script(dir: &Path, module: &str, body: &str) {
        fs::write(dir.join(format!("{}.sh", module)), body).unwrap();
    }

    fn flow(names: &[&str]) -> FlowDefinition {
        FlowDefinition::new(
            "test flow",
            names
                .iter()
                .map(|n| StepDescriptor::new(*n, n.to_lowercase()))
                .collect(),
        )
    }

    fn controller_with(
        scripts: &[(&str, &str)],
    ) -> (RunController, Receiver<ProgressEvent>, TempDir) {
        let dir = tempdir().unwrap();
        for (name, body) in scripts {
            write_script(dir.path(), &name.to_lowercase(), body);
        }

        let runner = ScriptRunner::new("sh")
            .with_scripts_dir(dir.path())
            .with_extension("sh");
        let (sink, rx) = progress_channel();
        let controller = RunController::new(runner, Arc::new(sink));

        let names: Vec<&str> = scripts.iter().map(|(n, _)| *n).collect();
        assert!(controller.select_flow("test", &flow(&names)));

        (controller, rx, dir)
    }

    fn wait_until_running(controller: &RunController) {
        for _ in 0..100 {
            if controller.is_running() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("run never started");
    }

    #[test]
    fn test_start_run_rejects_empty_flow() {
        let runner = ScriptRunner::new("sh");
        let (sink, _rx) = progress_channel();
        let controller = RunController::new(runner, Arc::new(sink));

        assert!(!controller.start_run());
        assert!(!controller.is_running());
    }

    #[test]
    fn test_start_run_completes() {
        let (controller, rx, _dir) = controller_with(&[("A", "echo a\n"), ("B", "echo b\n")]);

        assert!(controller.start_run());
        assert_eq!(controller.wait(), Some(RunOutcome::Completed));
        assert!(!controller.is_running());

        let events: Vec<_> = rx.try_iter().collect();
        assert!(events.contains(&ProgressEvent::RunStarted));
        assert_eq!(
            events.last(),
            Some(&ProgressEvent::RunFinished(RunOutcome::Completed))
        );
    }

    #[test]
    fn test_second_start_while_running_is_rejected() {
        let (controller, _rx, _dir) = controller_with(&[("Slow", "sleep 0.3\n")]);

        assert!(controller.start_run());
        wait_until_running(&controller);

        assert!(!controller.start_run());

        assert_eq!(controller.wait(), Some(RunOutcome::Completed));
    }

    #[test]
    fn test_runs_are_repeatable_after_wait() {
        let (controller, rx, _dir) = controller_with(&[("A", "echo a\n")]);

        assert!(controller.start_run());
        assert_eq!(controller.wait(), Some(RunOutcome::Completed));

        assert!(controller.start_run());
        assert_eq!(controller.wait(), Some(RunOutcome::Completed));

        let finishes = rx
            .try_iter()
            .filter(|e| matches!(e, ProgressEvent::RunFinished(_)))
            .count();
        assert_eq!(finishes, 2);
    }

    #[test]
    fn test_mutating_intents_ignored_while_running() {
        let (controller, _rx, _dir) = controller_with(&[("Slow", "sleep 0.3\n"), ("B", "echo b\n")]);

        assert!(controller.start_run());
        wait_until_running(&controller);

        controller.select_start(1);
        controller.disable_edge(0);
        controller.reset();
        assert!(!controller.select_flow("other", &flow(&["X"])));

        let state = controller.snapshot();
        assert_eq!(state.start_index, 0);
        assert!(state.disabled_edges.is_empty());
        assert_eq!(state.flow_key.as_deref(), Some("test"));

        assert_eq!(controller.wait(), Some(RunOutcome::Completed));
    }

    #[test]
    fn test_request_stop_defers_to_next_step() {
        let (controller, rx, _dir) =
            controller_with(&[("Slow", "echo begun\nsleep 0.3\necho done\n"), ("B", "echo b\n")]);

        assert!(controller.start_run());
        wait_until_running(&controller);
        std::thread::sleep(Duration::from_millis(50));
        controller.request_stop();

        assert_eq!(controller.wait(), Some(RunOutcome::Stopped));

        let events: Vec<_> = rx.try_iter().collect();
        let ran: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::NodeState {
                    index,
                    state: NodeState::Running,
                } => Some(*index),
                _ => None,
            })
            .collect();

        // Step 0 ran to completion, step 1 was never launched.
        assert_eq!(ran, vec![0]);
        assert!(events
            .iter()
            .any(|e| matches!(e, ProgressEvent::LogLine(l) if l.contains("done"))));
        assert!(events
            .iter()
            .any(|e| matches!(e, ProgressEvent::LogLine(l) if l.contains("Stop requested"))));
    }

    #[test]
    fn test_request_stop_when_idle_is_noop() {
        let (controller, rx, _dir) = controller_with(&[("A", "echo a\n")]);

        controller.request_stop();

        assert!(rx.try_iter().next().is_none());
        assert!(!controller.stop_requested.load(Ordering::SeqCst));
    }

    #[test]
    fn test_reset_restores_first_run_behavior() {
        let (controller, rx, _dir) = controller_with(&[("A", "echo a\n"), ("B", "echo b\n")]);

        controller.disable_edge(0);
        assert!(controller.start_run());
        assert_eq!(controller.wait(), Some(RunOutcome::Stopped));
        let _drained: Vec<_> = rx.try_iter().collect();

        controller.reset();
        assert!(controller.start_run());
        assert_eq!(controller.wait(), Some(RunOutcome::Completed));

        let events: Vec<_> = rx.try_iter().collect();
        let ran: Vec<usize> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::NodeState {
                    index,
                    state: NodeState::Running,
                } => Some(*index),
                _ => None,
            })
            .collect();
        assert_eq!(ran, vec![0, 1]);
    }

    #[test]
    fn test_select_flow_reseeds_state() {
        let (controller, _rx, dir) = controller_with(&[("A", "echo a\n")]);
        write_script(dir.path(), "x", "echo x\n");
        write_script(dir.path(), "y", "echo y\n");

        controller.disable_edge(0);
        assert!(controller.select_flow("other", &flow(&["X", "Y"])));

        let state = controller.snapshot();
        assert_eq!(state.flow_key.as_deref(), Some("other"));
        assert_eq!(state.steps.len(), 2);
        // New flow key clears prior cuts.
        assert!(state.disabled_edges.is_empty());
    }

    #[test]
    fn test_wait_without_run_returns_none() {
        let (controller, _rx, _dir) = controller_with(&[("A", "echo a\n")]);
        assert_eq!(controller.wait(), None);
    }

    #[test]
    fn test_start_after_stop_clears_stop_flag() {
        let (controller, rx, _dir) = controller_with(&[("Slow", "sleep 0.2\n"), ("B", "echo b\n")]);

        assert!(controller.start_run());
        wait_until_running(&controller);
        controller.request_stop();
        assert_eq!(controller.wait(), Some(RunOutcome::Stopped));
        let _drained: Vec<_> = rx.try_iter().collect();

        // The stale stop request must not bleed into the next run.
        assert!(controller.start_run());
        assert_eq!(controller.wait(), Some(RunOutcome::Completed));
    }
}
