//! Configuration file handling.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::lua::taxonomy::{EventTaxonomy, DEFAULT_NAMESPACE};
use crate::script::{InstanceOptions, RegistrySettings};

const APPLICATION: &str = "scriptbridge";
const CONFIG_FILE: &str = "config.yaml";

/// Settings read from `config.yaml`. Missing keys take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scripts are loaded from and bundled defaults copied into.
    pub script_dir: PathBuf,
    /// Extension appended to script names given without one.
    pub default_extension: String,
    /// Pending callbacks each instance buffers before dropping new ones.
    pub queue_capacity: usize,
    /// Namespace bare event type names are qualified into.
    pub event_namespace: String,
    /// Log filter directive, overridden by `RUST_LOG`.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        let script_dir = project_dirs()
            .map(|dirs| dirs.data_dir().join("scripts"))
            .unwrap_or_else(|| PathBuf::from("scripts"));

        Self {
            script_dir,
            default_extension: "lua".to_string(),
            queue_capacity: 1024,
            event_namespace: DEFAULT_NAMESPACE.to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    /// Platform config file location, e.g. `~/.config/scriptbridge/config.yaml`.
    pub fn default_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
    }

    /// Load from `path`, or from the default location when `None`. An explicit
    /// path must exist; a missing default file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.is_file() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid config: {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        // An empty document deserializes to unit, not a mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).context("Failed to parse config YAML")
    }

    pub fn registry_settings(&self) -> RegistrySettings {
        RegistrySettings {
            script_dir: self.script_dir.clone(),
            default_extension: self.default_extension.clone(),
            instance: InstanceOptions {
                taxonomy: Arc::new(EventTaxonomy::new(self.event_namespace.clone())),
                queue_capacity: self.queue_capacity,
            },
        }
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", APPLICATION)
}
