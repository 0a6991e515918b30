//! Run State
//!
//! The mutable state of one engine instance: the active flow's step
//! snapshot, the chosen start index, the disabled-edge set and the index
//! of the step currently in flight.
//!
//! Edge `i` connects step `i` to step `i + 1`; disabling it means "do not
//! proceed past step `i`". The running and stop-requested flags live
//! outside this struct as atomics so the UI thread can read them without
//! taking the lock.

use std::collections::HashSet;

use crate::catalog::StepDescriptor;

/// State of one engine instance.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    /// Key of the active flow, if one is selected
    pub flow_key: Option<String>,

    /// Steps of the active flow, snapshotted at selection time
    pub steps: Vec<StepDescriptor>,

    /// Index the next run starts from
    pub start_index: usize,

    /// Index of the step currently (or last) in flight
    pub current_step: Option<usize>,

    /// Edges execution must not cross
    pub disabled_edges: HashSet<usize>,
}

impl RunState {
    /// Creates an empty state with no flow selected.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the state for a flow selection.
    ///
    /// Selecting a different flow discards the previous flow's state
    /// entirely. Re-selecting the currently active key keeps the
    /// disabled edges so a refresh does not wipe the user's cuts.
    pub fn seed_flow(&mut self, key: impl Into<String>, steps: Vec<StepDescriptor>) {
        let key = key.into();
        let same_flow = self.flow_key.as_deref() == Some(key.as_str());

        if !same_flow {
            self.disabled_edges.clear();
        }

        self.flow_key = Some(key);
        self.steps = steps;
        self.start_index = 0;
        self.current_step = None;
    }

    /// Sets the step the next run begins from.
    ///
    /// Out-of-range indices are ignored; the caller only offers valid
    /// ones.
    pub fn select_start(&mut self, index: usize) {
        if index < self.steps.len() {
            self.start_index = index;
        }
    }

    /// Disables the edge between step `index` and step `index + 1`.
    /// Idempotent.
    pub fn disable_edge(&mut self, index: usize) {
        self.disabled_edges.insert(index);
    }

    /// Returns true if the edge into step `index + 1` is cut.
    pub fn edge_disabled(&self, index: usize) -> bool {
        self.disabled_edges.contains(&index)
    }

    /// Clears disabled edges and the start selection.
    ///
    /// The step snapshot is untouched; resetting does not reload the
    /// catalog.
    pub fn reset(&mut self) {
        self.disabled_edges.clear();
        self.start_index = 0;
        self.current_step = None;
    }

    /// Returns the number of steps in the active flow.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no flow is active or the flow has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}
