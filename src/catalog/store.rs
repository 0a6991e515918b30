//! Catalog Persistence
//!
//! File-backed CRUD for the flow catalog and the global settings,
//! mirroring the two JSON files the settings editor maintains:
//!
//! - `config.json` - the flow catalog
//! - `global_config.json` - interpreter path and help manual text
//!
//! Read errors are deliberately soft: a missing or corrupt file loads as
//! an empty catalog / default settings with a logged warning, so the UI
//! always has something to show.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{info, warn};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::model::FlowCatalog;

/// File name of the flow catalog inside the config directory.
const FLOWS_FILE: &str = "config.json";

/// File name of the global settings inside the config directory.
const SETTINGS_FILE: &str = "global_config.json";

/// Default interpreter used when the settings file does not name one.
const DEFAULT_INTERPRETER: &str = "python";

/// Default configuration directory.
///
/// Resolution order:
/// 1. `configs/` next to the executable (packaged installs)
/// 2. `configs/` under the current working directory
pub static DEFAULT_CONFIG_DIR: Lazy<PathBuf> = Lazy::new(|| {
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            let packaged = exe_dir.join("configs");
            if packaged.exists() {
                info!("Using packaged config dir: {}", packaged.display());
                return packaged;
            }
        }
    }

    let cwd_path = PathBuf::from("configs");
    info!("Using CWD config dir: {}", cwd_path.display());
    cwd_path
});

/// Errors raised by catalog write and import operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialize catalog data: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("script not found: {0}")]
    ScriptMissing(PathBuf),

    #[error("unsupported script extension on {path}: expected .{expected}")]
    BadExtension { path: PathBuf, expected: String },

    #[error("failed to copy script to {path}: {source}")]
    Copy {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Global options shared by every flow.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct GlobalSettings {
    /// Interpreter used to launch step scripts
    #[serde(default = "default_interpreter")]
    pub interpreter_path: String,

    /// Help manual text shown by the presentation layer
    #[serde(default)]
    pub manual: String,
}

fn default_interpreter() -> String {
    DEFAULT_INTERPRETER.to_string()
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            interpreter_path: default_interpreter(),
            manual: String::new(),
        }
    }
}

/// File-backed store for the flow catalog and global settings.
pub struct CatalogStore {
    config_dir: PathBuf,
    scripts_dir: PathBuf,
    script_extension: String,
}

impl CatalogStore {
    /// Creates a store over the default config directory and `tasks/`
    /// scripts directory.
    pub fn new() -> Self {
        Self::with_config_dir(DEFAULT_CONFIG_DIR.clone())
    }

    /// Creates a store over an explicit config directory.
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            scripts_dir: PathBuf::from("tasks"),
            script_extension: "py".to_string(),
        }
    }

    /// Sets the directory imported scripts are copied into.
    pub fn with_scripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scripts_dir = dir.into();
        self
    }

    /// Sets the script extension accepted by [`import_script`](Self::import_script).
    pub fn with_script_extension(mut self, ext: impl Into<String>) -> Self {
        self.script_extension = ext.into();
        self
    }

    /// Path of the flow catalog file.
    pub fn flows_path(&self) -> PathBuf {
        self.config_dir.join(FLOWS_FILE)
    }

    /// Path of the global settings file.
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE)
    }

    /// Loads the flow catalog.
    ///
    /// A missing or unreadable file yields an empty catalog.
    pub fn load_flows(&self) -> FlowCatalog {
        load_json_or_default(&self.flows_path())
    }

    /// Saves the flow catalog as pretty-printed JSON.
    pub fn save_flows(&self, catalog: &FlowCatalog) -> Result<(), CatalogError> {
        self.write_json(&self.flows_path(), catalog)
    }

    /// Loads the global settings.
    ///
    /// A missing or unreadable file yields default settings.
    pub fn load_settings(&self) -> GlobalSettings {
        load_json_or_default(&self.settings_path())
    }

    /// Saves the global settings as pretty-printed JSON.
    pub fn save_settings(&self, settings: &GlobalSettings) -> Result<(), CatalogError> {
        self.write_json(&self.settings_path(), settings)
    }

    /// Imports a script file into the scripts directory.
    ///
    /// Validates the extension, copies the file (no-op when source and
    /// target are the same path) and returns the module stem used to
    /// reference the script from step descriptors.
    pub fn import_script(&self, source: &Path) -> Result<String, CatalogError> {
        if !source.exists() {
            return Err(CatalogError::ScriptMissing(source.to_path_buf()));
        }

        let matches_ext = source
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e == self.script_extension)
            .unwrap_or(false);
        if !matches_ext {
            return Err(CatalogError::BadExtension {
                path: source.to_path_buf(),
                expected: self.script_extension.clone(),
            });
        }

        let file_name = source
            .file_name()
            .ok_or_else(|| CatalogError::ScriptMissing(source.to_path_buf()))?;
        let target = self.scripts_dir.join(file_name);

        fs::create_dir_all(&self.scripts_dir).map_err(|source| CatalogError::Copy {
            path: target.clone(),
            source,
        })?;

        let same_file = source
            .canonicalize()
            .ok()
            .zip(target.canonicalize().ok())
            .map(|(a, b)| a == b)
            .unwrap_or(false);

        if !same_file {
            fs::copy(source, &target).map_err(|source| CatalogError::Copy {
                path: target.clone(),
                source,
            })?;
            info!("Imported script to {}", target.display());
        }

        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        Ok(stem.to_string())
    }

    fn write_json<T: Serialize>(&self, path: &Path, value: &T) -> Result<(), CatalogError> {
        fs::create_dir_all(&self.config_dir).map_err(|source| CatalogError::Write {
            path: self.config_dir.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(value)?;
        fs::write(path, json).map_err(|source| CatalogError::Write {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Saved {}", path.display());
        Ok(())
    }
}

impl Default for CatalogStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Reads and parses a JSON file, falling back to `T::default()` on any
/// failure. Absence is expected on first launch and not logged.
fn load_json_or_default<T: for<'de> Deserialize<'de> + Default>(path: &Path) -> T {
    if !path.exists() {
        return T::default();
    }

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            warn!("Failed to read {}: {}", path.display(), e);
            return T::default();
        }
    };

    match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(e) => {
            warn!("Failed to parse {}: {}", path.display(), e);
            T::default()
        }
    }
}
