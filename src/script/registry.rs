//! Live script instances and what each operator has selected.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::dispatch::{self, InstanceId};
use super::instance::{InstanceOptions, ScriptInstance};
use super::source::{with_default_extension, ScriptSource};
use crate::error::{BridgeError, Result};
use crate::host::bus::lock;
use crate::host::{AssetSource, Host};

/// Where scripts live and how new instances are configured.
#[derive(Debug, Clone)]
pub struct RegistrySettings {
    pub script_dir: PathBuf,
    pub default_extension: String,
    pub instance: InstanceOptions,
}

impl RegistrySettings {
    pub fn new(script_dir: impl Into<PathBuf>) -> Self {
        Self {
            script_dir: script_dir.into(),
            default_extension: "lua".to_string(),
            instance: InstanceOptions::default(),
        }
    }
}

#[derive(Default)]
struct RegistryState {
    instances: HashMap<String, Arc<ScriptInstance>>,
    /// Operator -> identifier of the selected instance. A present key with
    /// `None` is an open slot with nothing selected yet.
    selection: HashMap<String, Option<String>>,
}

/// Table of loaded instances, owned by the host for its lifetime.
pub struct ScriptRegistry {
    settings: RegistrySettings,
    host: Host,
    assets: Arc<dyn AssetSource>,
    state: Mutex<RegistryState>,
}

impl ScriptRegistry {
    pub fn new(settings: RegistrySettings, host: Host, assets: Arc<dyn AssetSource>) -> Self {
        Self {
            settings,
            host,
            assets,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub fn script_dir(&self) -> &Path {
        &self.settings.script_dir
    }

    /// Locate `name` in the script directory, compile it and register the
    /// new instance. With `create_if_missing`, a bundled default of the same
    /// name is copied in first.
    pub fn load(&self, name: &str, create_if_missing: bool) -> Result<Arc<ScriptInstance>> {
        let file_name = with_default_extension(name, &self.settings.default_extension);
        let dir = &self.settings.script_dir;
        std::fs::create_dir_all(dir)?;

        let path = dir.join(&file_name);
        if !path.is_file() {
            if create_if_missing && self.assets.materialize(&file_name, dir)? {
                return self.load(&file_name, false);
            }
            return Err(BridgeError::ScriptNotFound(file_name));
        }

        let source = ScriptSource::from_file(&path)?;
        let id = {
            let state = lock(&self.state);
            unused_id(
                |id| state.instances.values().any(|live| live.id() == id),
                dispatch::random_id,
            )
        };
        let instance = Arc::new(ScriptInstance::with_id(
            id,
            source,
            self.host.clone(),
            &self.settings.instance,
        )?);

        let identifier = instance.identifier();
        let replaced = lock(&self.state)
            .instances
            .insert(identifier.clone(), Arc::clone(&instance));
        if let Some(old) = replaced {
            warn!(target: "scripting", "{} was loaded twice, tearing down the older instance", identifier);
            old.teardown();
        }
        info!(target: "scripting", "Loaded {}", identifier);
        Ok(instance)
    }

    /// Give `operator` a selection slot so later selections are honored.
    pub fn open_slot(&self, operator: &str) {
        lock(&self.state)
            .selection
            .entry(operator.to_string())
            .or_insert(None);
    }

    pub fn has_slot(&self, operator: &str) -> bool {
        lock(&self.state).selection.contains_key(operator)
    }

    /// Record `instance` as the operator's selection, replacing any earlier one.
    pub fn select(&self, operator: &str, instance: &Arc<ScriptInstance>) -> Result<()> {
        let mut state = lock(&self.state);
        let slot = state
            .selection
            .get_mut(operator)
            .ok_or_else(|| BridgeError::NotAuthorized(operator.to_string()))?;
        *slot = Some(instance.identifier());
        debug!(target: "scripting", "{} selected {}", operator, instance.identifier());
        Ok(())
    }

    /// The operator's selected instance, if it is still loaded.
    pub fn selected(&self, operator: &str) -> Option<Arc<ScriptInstance>> {
        let state = lock(&self.state);
        let identifier = state.selection.get(operator)?.as_ref()?;
        state.instances.get(identifier).cloned()
    }

    /// Run `explicit`, or the operator's selection when none is given.
    pub fn run(
        &self,
        operator: &str,
        explicit: Option<&Arc<ScriptInstance>>,
    ) -> Result<Arc<ScriptInstance>> {
        let instance = match explicit {
            Some(instance) => Arc::clone(instance),
            None => self
                .selected(operator)
                .ok_or_else(|| BridgeError::NothingSelected(operator.to_string()))?,
        };
        instance.run()?;
        Ok(instance)
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<ScriptInstance>> {
        lock(&self.state).instances.get(identifier).cloned()
    }

    pub fn instance_count(&self) -> usize {
        lock(&self.state).instances.len()
    }

    /// Identifiers of all live instances, sorted.
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = lock(&self.state).instances.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Tear down and forget one instance.
    pub fn remove(&self, identifier: &str) -> Option<Arc<ScriptInstance>> {
        let instance = lock(&self.state).instances.remove(identifier)?;
        instance.teardown();
        info!(target: "scripting", "Unloaded {}", identifier);
        Some(instance)
    }

    /// Tear down every instance and clear all selections.
    pub fn shutdown(&self) {
        let instances: Vec<Arc<ScriptInstance>> = {
            let mut state = lock(&self.state);
            state.selection.clear();
            state.instances.drain().map(|(_, instance)| instance).collect()
        };
        for instance in &instances {
            instance.teardown();
        }
        if !instances.is_empty() {
            info!(target: "scripting", "Shut down {} script instance(s)", instances.len());
        }
    }

    /// Run queued callbacks of every live instance. Returns the total executed.
    pub fn pump_all(&self) -> usize {
        let instances: Vec<Arc<ScriptInstance>> =
            lock(&self.state).instances.values().cloned().collect();
        instances.iter().map(|instance| instance.pump()).sum()
    }

    /// File names in the script directory, sorted.
    pub fn available_scripts(&self) -> Vec<String> {
        let mut names: Vec<String> = WalkDir::new(&self.settings.script_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .collect();
        names.sort();
        names
    }
}

/// Draw candidates until one is not `taken`.
fn unused_id(
    taken: impl Fn(InstanceId) -> bool,
    mut candidate: impl FnMut() -> InstanceId,
) -> InstanceId {
    loop {
        let id = candidate();
        if !taken(id) {
            return id;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::EmbeddedAssets;
    use tempfile::TempDir;

    fn registry(temp: &TempDir, assets: EmbeddedAssets) -> ScriptRegistry {
        let (host, _, _) = Host::local();
        ScriptRegistry::new(
            RegistrySettings::new(temp.path().join("scripts")),
            host,
            Arc::new(assets),
        )
    }

    fn write(temp: &TempDir, name: &str, text: &str) {
        let dir = temp.path().join("scripts");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn test_load_appends_default_extension() {
        let temp = TempDir::new().unwrap();
        write(&temp, "greet.lua", "x = 1");
        let registry = registry(&temp, EmbeddedAssets::empty());

        let instance = registry.load("greet", false).unwrap();
        assert_eq!(instance.file_name(), "greet.lua");
        assert_eq!(registry.instance_count(), 1);
        assert!(registry.get(&instance.identifier()).is_some());
    }

    #[test]
    fn test_load_missing_without_create() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp, EmbeddedAssets::new([("greet.lua", "x = 1")]));

        let result = registry.load("greet", false);
        assert!(matches!(result, Err(BridgeError::ScriptNotFound(name)) if name == "greet.lua"));
        assert_eq!(registry.instance_count(), 0);
    }

    #[test]
    fn test_load_missing_copies_bundled_default() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp, EmbeddedAssets::new([("greet.lua", "x = 1")]));

        let instance = registry.load("greet", true).unwrap();
        assert_eq!(instance.file_name(), "greet.lua");
        assert!(temp.path().join("scripts/greet.lua").is_file());
    }

    #[test]
    fn test_load_missing_everywhere() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp, EmbeddedAssets::new([("greet.lua", "x = 1")]));
        assert!(matches!(
            registry.load("other", true),
            Err(BridgeError::ScriptNotFound(_))
        ));
    }

    #[test]
    fn test_syntax_error_leaves_count_unchanged() {
        let temp = TempDir::new().unwrap();
        write(&temp, "ok.lua", "x = 1");
        write(&temp, "broken.lua", "function (");
        let registry = registry(&temp, EmbeddedAssets::empty());

        registry.load("ok", false).unwrap();
        assert!(matches!(
            registry.load("broken", false),
            Err(BridgeError::SyntaxError { .. })
        ));
        assert_eq!(registry.instance_count(), 1);
    }

    #[test]
    fn test_select_requires_slot() {
        let temp = TempDir::new().unwrap();
        write(&temp, "greet.lua", "ran = true");
        let registry = registry(&temp, EmbeddedAssets::empty());
        let instance = registry.load("greet", false).unwrap();

        assert!(matches!(
            registry.select("alex", &instance),
            Err(BridgeError::NotAuthorized(op)) if op == "alex"
        ));
        assert!(matches!(
            registry.run("alex", None),
            Err(BridgeError::NothingSelected(_))
        ));

        registry.open_slot("alex");
        assert!(registry.selected("alex").is_none());
        registry.select("alex", &instance).unwrap();

        let ran = registry.run("alex", None).unwrap();
        assert_eq!(ran.identifier(), instance.identifier());
        assert!(instance.has_run());
    }

    #[test]
    fn test_selection_is_overwritten() {
        let temp = TempDir::new().unwrap();
        write(&temp, "a.lua", "");
        write(&temp, "b.lua", "");
        let registry = registry(&temp, EmbeddedAssets::empty());
        let a = registry.load("a", false).unwrap();
        let b = registry.load("b", false).unwrap();

        registry.open_slot("alex");
        registry.select("alex", &a).unwrap();
        registry.select("alex", &b).unwrap();
        assert_eq!(registry.selected("alex").unwrap().identifier(), b.identifier());

        // Opening an existing slot does not clear it.
        registry.open_slot("alex");
        assert!(registry.selected("alex").is_some());
    }

    #[test]
    fn test_remove_clears_selection_target() {
        let temp = TempDir::new().unwrap();
        write(&temp, "a.lua", "");
        let registry = registry(&temp, EmbeddedAssets::empty());
        let a = registry.load("a", false).unwrap();
        registry.open_slot("alex");
        registry.select("alex", &a).unwrap();

        assert!(registry.remove(&a.identifier()).is_some());
        assert!(registry.remove(&a.identifier()).is_none());
        assert!(registry.selected("alex").is_none());
        assert_eq!(registry.instance_count(), 0);
    }

    #[test]
    fn test_available_scripts() {
        let temp = TempDir::new().unwrap();
        let registry = registry(&temp, EmbeddedAssets::empty());
        assert!(registry.available_scripts().is_empty());

        write(&temp, "b.lua", "");
        write(&temp, "a.lua", "");
        assert_eq!(registry.available_scripts(), vec!["a.lua", "b.lua"]);
    }

    #[test]
    fn test_shutdown_empties_registry() {
        let temp = TempDir::new().unwrap();
        write(&temp, "a.lua", "");
        let registry = registry(&temp, EmbeddedAssets::empty());
        registry.load("a", false).unwrap();
        registry.open_slot("alex");

        registry.shutdown();
        assert_eq!(registry.instance_count(), 0);
        assert!(!registry.has_slot("alex"));
    }

    #[test]
    fn test_unused_id_skips_live_ids() {
        let mut candidates = vec![5, 3, 3];
        let id = unused_id(|id| id == 3, || candidates.pop().unwrap());
        assert_eq!(id, 5);
    }

    #[test]
    fn test_loading_twice_keeps_both_instances() {
        let temp = TempDir::new().unwrap();
        write(&temp, "greet.lua", "x = 1");
        let registry = registry(&temp, EmbeddedAssets::empty());

        let first = registry.load("greet", false).unwrap();
        let second = registry.load("greet", false).unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(registry.instance_count(), 2);
    }
}
