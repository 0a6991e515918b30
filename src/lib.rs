//! StepFlow - Sequential Workflow Execution Engine
//!
//! A desktop tool core for composing a named sequence of steps (each
//! step one external script) and executing it while streaming output and
//! progress to an observer. The presentation layer renders nodes and
//! edges; this library owns the run semantics: start-index selection,
//! edge cutting, cooperative stop and the step failure policy.
//!
//! # Architecture
//!
//! The library is organized into three main modules:
//!
//! - [`catalog`]: Flow/step definitions and their JSON-backed store
//! - [`execution`]: Core execution engine, process runner and controller
//! - [`progress`]: The progress sink interface and its event queue
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stepflow::catalog::CatalogStore;
//! use stepflow::execution::{RunController, ScriptRunner};
//! use stepflow::progress::progress_channel;
//!
//! let store = CatalogStore::new();
//! let catalog = store.load_flows();
//! let flow = catalog.get_flow("nightly_import").expect("flow exists");
//!
//! let runner = ScriptRunner::new(store.load_settings().interpreter_path);
//! let (sink, events) = progress_channel();
//!
//! let controller = RunController::new(runner, Arc::new(sink));
//! controller.select_flow("nightly_import", flow);
//! controller.start_run();
//!
//! for event in events {
//!     // forward to the UI; RunFinished is the last event of the run
//!     println!("{:?}", event);
//!     if matches!(event, stepflow::progress::ProgressEvent::RunFinished(_)) {
//!         break;
//!     }
//! }
//! ```

pub mod catalog;
pub mod execution;
pub mod progress;

// Re-export commonly used types
pub use catalog::{FlowCatalog, FlowDefinition, StepDescriptor};
pub use execution::{RunController, ScriptRunner};
pub use progress::{ProgressSink, RunOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "StepFlow";
