//! Flow Catalog Data Model
//!
//! Core data structures describing the flows a user can execute and the
//! steps inside them.
//!
//! # Example JSON Format
//!
//! ```json
//! {
//!   "nightly_import": {
//!     "description": "Pull, clean and load the nightly data drop",
//!     "steps": [
//!       { "name": "Fetch", "module": "fetch_drop", "overview": "Download the drop archive" },
//!       { "name": "Clean", "module": "clean_drop", "overview": "Normalize column names" },
//!       { "name": "Load", "module": "load_drop", "overview": "Insert into the warehouse" }
//!     ]
//!   }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One unit of work inside a flow, backed by an external script.
///
/// The `module` field names the script without directory or extension;
/// the process runner resolves it against the scripts directory.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StepDescriptor {
    /// Display name shown on the graph node
    pub name: String,

    /// Script module reference (file stem, no extension)
    pub module: String,

    /// Human-readable summary shown in tooltips
    #[serde(default)]
    pub overview: String,
}

impl StepDescriptor {
    /// Creates a new step descriptor.
    pub fn new(name: impl Into<String>, module: impl Into<String>) -> Self {
        Self {
            name: name.into().trim().to_string(),
            module: module.into().trim().to_string(),
            overview: String::new(),
        }
    }

    /// Sets the overview text for this step.
    pub fn with_overview(mut self, overview: impl Into<String>) -> Self {
        self.overview = overview.into();
        self
    }
}

/// A named, ordered sequence of steps.
///
/// The flow's title is the key it is stored under in the [`FlowCatalog`];
/// the definition itself carries only the description and the steps.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowDefinition {
    /// Human-readable description shown when the flow is selected
    #[serde(default)]
    pub description: String,

    /// Ordered list of steps executed top to bottom
    #[serde(default)]
    pub steps: Vec<StepDescriptor>,
}

impl FlowDefinition {
    /// Creates a flow definition from a description and its steps.
    pub fn new(description: impl Into<String>, steps: Vec<StepDescriptor>) -> Self {
        Self {
            description: description.into(),
            steps,
        }
    }

    /// Returns the number of steps in the flow.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if the flow has no steps.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Mapping from flow key to flow definition.
///
/// Keys double as display titles. The map is ordered so the UI combo box
/// and `--list` output are stable across loads.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
#[serde(transparent)]
pub struct FlowCatalog {
    flows: BTreeMap<String, FlowDefinition>,
}

impl FlowCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            flows: BTreeMap::new(),
        }
    }

    /// Looks up a flow by key. Absent keys return `None`.
    pub fn get_flow(&self, key: &str) -> Option<&FlowDefinition> {
        self.flows.get(key)
    }

    /// Inserts or replaces a flow definition.
    pub fn set_flow(&mut self, key: impl Into<String>, flow: FlowDefinition) {
        self.flows.insert(key.into(), flow);
    }

    /// Removes a flow. Returns the removed definition if it existed.
    pub fn remove_flow(&mut self, key: &str) -> Option<FlowDefinition> {
        self.flows.remove(key)
    }

    /// Returns all flow keys in stable order.
    pub fn flow_keys(&self) -> Vec<&str> {
        self.flows.keys().map(String::as_str).collect()
    }

    /// Iterates over (key, definition) pairs in stable order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &FlowDefinition)> {
        self.flows.iter()
    }

    /// Returns the number of flows in the catalog.
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    /// Returns true if the catalog has no flows.
    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_flow() -> FlowDefinition {
        FlowDefinition::new(
            "Test flow",
            vec![
                StepDescriptor::new("Fetch", "fetch_drop").with_overview("Download"),
                StepDescriptor::new("Load", "load_drop"),
            ],
        )
    }

    #[test]
    fn test_step_creation_trims_fields() {
        let step = StepDescriptor::new("  Fetch ", " fetch_drop ");
        assert_eq!(step.name, "Fetch");
        assert_eq!(step.module, "fetch_drop");
        assert!(step.overview.is_empty());
    }

    #[test]
    fn test_flow_len() {
        let flow = sample_flow();
        assert_eq!(flow.len(), 2);
        assert!(!flow.is_empty());
        assert!(FlowDefinition::default().is_empty());
    }

    #[test]
    fn test_catalog_get_flow_absent() {
        let catalog = FlowCatalog::new();
        assert!(catalog.get_flow("missing").is_none());
    }

    #[test]
    fn test_catalog_set_and_get() {
        let mut catalog = FlowCatalog::new();
        catalog.set_flow("nightly", sample_flow());

        let flow = catalog.get_flow("nightly").unwrap();
        assert_eq!(flow.steps[0].module, "fetch_drop");
        assert_eq!(catalog.len(), 1);
    }

    #[test]
    fn test_catalog_remove_flow() {
        let mut catalog = FlowCatalog::new();
        catalog.set_flow("nightly", sample_flow());

        assert!(catalog.remove_flow("nightly").is_some());
        assert!(catalog.remove_flow("nightly").is_none());
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_catalog_keys_are_ordered() {
        let mut catalog = FlowCatalog::new();
        catalog.set_flow("zeta", FlowDefinition::default());
        catalog.set_flow("alpha", FlowDefinition::default());

        assert_eq!(catalog.flow_keys(), vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_catalog_json_roundtrip() {
        let mut catalog = FlowCatalog::new();
        catalog.set_flow("nightly", sample_flow());

        let json = serde_json::to_string_pretty(&catalog).unwrap();
        let loaded: FlowCatalog = serde_json::from_str(&json).unwrap();

        assert_eq!(loaded, catalog);
    }

    #[test]
    fn test_catalog_parses_original_shape() {
        // The on-disk shape is a plain object keyed by flow title.
        let json = r#"{
            "demo": {
                "description": "Demo flow",
                "steps": [
                    { "name": "A", "module": "a" },
                    { "name": "B", "module": "b", "overview": "second" }
                ]
            }
        }"#;

        let catalog: FlowCatalog = serde_json::from_str(json).unwrap();
        let flow = catalog.get_flow("demo").unwrap();

        assert_eq!(flow.description, "Demo flow");
        assert_eq!(flow.steps.len(), 2);
        assert_eq!(flow.steps[1].overview, "second");
    }
}
