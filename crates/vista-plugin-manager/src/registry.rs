//! Registry of loaded plugin instances.
//!
//! The registry drives the lifecycle of every instance
//! (`Loaded → Activating → Active | ActivationFailed`, `Active → Deactivated`)
//! and owns the previewers and uploaders plugins register while activating.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use vista_plugin::{FilePreviewer, FileUploader, Plugin, PluginContext};

use crate::loader::LoadedPlugin;
use crate::{PluginManagerError, PluginManagerResult};

/// Lifecycle state of a registered plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    /// Registered, never activated.
    Loaded,
    /// `activate` is running.
    Activating,
    /// `activate` returned normally.
    Active,
    /// `activate` failed.
    ActivationFailed,
    /// Stopped after being active.
    Deactivated,
}

/// A plugin instance held by the registry.
pub struct RegisteredPlugin {
    id: String,
    package_id: String,
    generation: u64,
    state: PluginState,
    plugin: Box<dyn Plugin>,
}

impl RegisteredPlugin {
    /// Returns the registry id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the id of the package the plugin came from.
    #[must_use]
    pub fn package_id(&self) -> &str {
        &self.package_id
    }

    /// Returns the generation of the module the instance was created from.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn state(&self) -> PluginState {
        self.state
    }

    /// Returns the plugin's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.plugin.name()
    }

    /// Returns the plugin's version.
    #[must_use]
    pub fn version(&self) -> &str {
        self.plugin.version()
    }
}

impl std::fmt::Debug for RegisteredPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredPlugin")
            .field("id", &self.id)
            .field("package_id", &self.package_id)
            .field("state", &self.state)
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

struct RegisteredPreviewer {
    owner: String,
    previewer: Arc<dyn FilePreviewer>,
}

struct RegisteredUploader {
    owner: String,
    uploader: Arc<dyn FileUploader>,
}

/// Outcome of [`PluginRegistry::activate_all`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ActivationReport {
    /// Ids activated, in order.
    pub activated: Vec<String>,
    /// Ids that failed, with the error message.
    pub failed: Vec<(String, String)>,
}

/// Registry of loaded plugin instances and their capabilities.
#[derive(Default)]
pub struct PluginRegistry {
    plugins: Vec<RegisteredPlugin>,
    previewers: Vec<RegisteredPreviewer>,
    uploaders: Vec<RegisteredUploader>,
}

impl PluginRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a loaded plugin.
    ///
    /// An instance already registered under the same id is deactivated and
    /// replaced, and its previewers are dropped. Returns true if an instance
    /// was replaced.
    pub fn register(&mut self, loaded: LoadedPlugin) -> bool {
        let replaced = self.remove(&loaded.id).is_some();

        info!(id = %loaded.id, name = loaded.plugin.name(), replaced, "registered plugin");

        self.plugins.push(RegisteredPlugin {
            id: loaded.id,
            package_id: loaded.package_id,
            generation: loaded.generation,
            state: PluginState::Loaded,
            plugin: loaded.plugin,
        });

        replaced
    }

    /// Activates every plugin that has never been activated, in
    /// registration order.
    ///
    /// Failures are logged and isolated: they never stop later plugins from
    /// activating.
    pub fn activate_all(&mut self) -> ActivationReport {
        let mut report = ActivationReport::default();

        for index in 0..self.plugins.len() {
            if self.plugins[index].state != PluginState::Loaded {
                continue;
            }

            let id = self.plugins[index].id.clone();
            match self.activate_at(index) {
                Ok(()) => report.activated.push(id),
                Err(e) => {
                    error!(id = %id, "plugin activation failed: {e}");
                    let reason = match &e {
                        PluginManagerError::ActivationFailure { source, .. } => source.to_string(),
                        other => other.to_string(),
                    };
                    report.failed.push((id, reason));
                }
            }
        }

        report
    }

    /// Activates one plugin.
    ///
    /// # Errors
    ///
    /// Returns [`PluginManagerError::PluginNotFound`] for unknown ids,
    /// [`PluginManagerError::AlreadyActive`] if the plugin is active and
    /// [`PluginManagerError::ActivationFailure`] if its `activate` fails.
    pub fn activate(&mut self, id: &str) -> PluginManagerResult<()> {
        let index = self.position(id)?;
        self.activate_at(index)
    }

    fn activate_at(&mut self, index: usize) -> PluginManagerResult<()> {
        let entry = &mut self.plugins[index];
        match entry.state {
            PluginState::Active => {
                return Err(PluginManagerError::AlreadyActive {
                    id: entry.id.clone(),
                });
            }
            PluginState::Activating => {
                return Err(PluginManagerError::InvalidState {
                    id: entry.id.clone(),
                    state: entry.state,
                });
            }
            PluginState::Loaded | PluginState::ActivationFailed | PluginState::Deactivated => {}
        }

        entry.state = PluginState::Activating;
        let mut ctx = PluginContext::new(entry.plugin.name());

        if let Err(source) = entry.plugin.activate(&mut ctx) {
            entry.state = PluginState::ActivationFailed;
            return Err(PluginManagerError::ActivationFailure {
                id: entry.id.clone(),
                source,
            });
        }

        entry.state = PluginState::Active;
        let owner = entry.id.clone();
        info!(
            id = %owner,
            previewers = ctx.previewers().len(),
            uploaders = ctx.uploaders().len(),
            "activated plugin"
        );

        let registrations = ctx.into_registrations();
        self.previewers
            .extend(registrations.previewers.into_iter().map(|previewer| {
                RegisteredPreviewer {
                    owner: owner.clone(),
                    previewer,
                }
            }));
        self.uploaders
            .extend(registrations.uploaders.into_iter().map(|uploader| {
                RegisteredUploader {
                    owner: owner.clone(),
                    uploader,
                }
            }));

        Ok(())
    }

    /// Deactivates one plugin and drops its previewers.
    ///
    /// Errors from the plugin's own `deactivate` are logged; the plugin is
    /// considered deactivated regardless. Plugins that are not active are
    /// left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PluginManagerError::PluginNotFound`] for unknown ids.
    pub fn deactivate(&mut self, id: &str) -> PluginManagerResult<()> {
        let index = self.position(id)?;
        self.deactivate_at(index);
        Ok(())
    }

    /// Deactivates every active plugin, most recently registered first.
    pub fn deactivate_all(&mut self) {
        for index in (0..self.plugins.len()).rev() {
            self.deactivate_at(index);
        }
    }

    fn deactivate_at(&mut self, index: usize) {
        let entry = &mut self.plugins[index];
        if entry.state != PluginState::Active {
            return;
        }

        if let Err(e) = entry.plugin.deactivate() {
            warn!(id = %entry.id, "plugin deactivation failed: {e}");
        }
        entry.state = PluginState::Deactivated;
        debug!(id = %entry.id, "deactivated plugin");

        let owner = entry.id.clone();
        self.drop_capabilities(&owner);
    }

    fn drop_capabilities(&mut self, owner: &str) {
        self.previewers.retain(|p| p.owner != owner);
        self.uploaders.retain(|u| u.owner != owner);
    }

    /// Deactivates and removes every plugin loaded from a package. Returns
    /// the number of plugins removed.
    pub fn unregister_package(&mut self, package_id: &str) -> usize {
        let ids: Vec<String> = self
            .plugins
            .iter()
            .filter(|p| p.package_id == package_id)
            .map(|p| p.id.clone())
            .collect();

        for id in &ids {
            self.remove(id);
        }

        ids.len()
    }

    fn remove(&mut self, id: &str) -> Option<RegisteredPlugin> {
        let index = self.position(id).ok()?;
        self.deactivate_at(index);
        self.drop_capabilities(id);
        Some(self.plugins.remove(index))
    }

    fn position(&self, id: &str) -> PluginManagerResult<usize> {
        self.plugins
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| PluginManagerError::PluginNotFound { id: id.to_string() })
    }

    /// Returns the previewer for a file name.
    ///
    /// Previewers are tried from the most recently registered to the oldest,
    /// so a later plugin overrides an earlier one for the same files.
    #[must_use]
    pub fn get_matching_previewer(&self, file_name: &str) -> Option<Arc<dyn FilePreviewer>> {
        self.previewers
            .iter()
            .rev()
            .find(|p| p.previewer.accepts(file_name))
            .map(|p| Arc::clone(&p.previewer))
    }

    /// Returns an uploader of an active plugin.
    ///
    /// With a name, the most recently registered uploader of that name;
    /// without one, the most recently registered uploader.
    #[must_use]
    pub fn get_uploader(&self, name: Option<&str>) -> Option<Arc<dyn FileUploader>> {
        self.uploaders
            .iter()
            .rev()
            .find(|u| name.is_none_or(|name| u.uploader.name() == name))
            .map(|u| Arc::clone(&u.uploader))
    }

    /// Returns the names of the registered uploaders, oldest first.
    #[must_use]
    pub fn uploader_names(&self) -> Vec<&str> {
        self.uploaders.iter().map(|u| u.uploader.name()).collect()
    }

    /// Returns the registered plugins in registration order.
    #[must_use]
    pub fn get_plugins(&self) -> &[RegisteredPlugin] {
        &self.plugins
    }

    /// Returns a registered plugin by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&RegisteredPlugin> {
        self.plugins.iter().find(|p| p.id == id)
    }

    /// Returns the number of registered previewers.
    #[must_use]
    pub fn previewer_count(&self) -> usize {
        self.previewers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use vista_plugin::{
        Cleanup, FileMatcher, PluginError, PluginResult, PreviewContainer, PreviewFile,
    };

    struct TestPreviewer {
        name: String,
        matcher: FileMatcher,
    }

    impl FilePreviewer for TestPreviewer {
        fn name(&self) -> &str {
            &self.name
        }

        fn accepts(&self, file_name: &str) -> bool {
            self.matcher.matches(file_name)
        }

        fn mount(
            &self,
            container: &PreviewContainer,
            _file: &PreviewFile,
        ) -> PluginResult<Cleanup> {
            container.set_content(self.name.clone());
            Ok(Cleanup::noop())
        }
    }

    struct TestUploader(&'static str);

    impl FileUploader for TestUploader {
        fn name(&self) -> &str {
            self.0
        }

        fn upload(&self, _file: &PreviewFile, _destination: &str) -> PluginResult<()> {
            Ok(())
        }
    }

    struct TestPlugin {
        name: String,
        previewers: Vec<(&'static str, &'static str)>,
        uploaders: Vec<&'static str>,
        fail: bool,
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl TestPlugin {
        fn new(name: &str, calls: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.to_string(),
                previewers: Vec::new(),
                uploaders: Vec::new(),
                fail: false,
                calls: Arc::clone(calls),
            }
        }

        fn with_previewer(mut self, name: &'static str, pattern: &'static str) -> Self {
            self.previewers.push((name, pattern));
            self
        }

        fn with_uploader(mut self, name: &'static str) -> Self {
            self.uploaders.push(name);
            self
        }

        fn failing(mut self) -> Self {
            self.fail = true;
            self
        }
    }

    impl Plugin for TestPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        fn activate(&mut self, ctx: &mut PluginContext) -> PluginResult<()> {
            self.calls.lock().unwrap().push(format!("activate {}", self.name));
            for (name, pattern) in &self.previewers {
                ctx.register_previewer(Arc::new(TestPreviewer {
                    name: (*name).to_string(),
                    matcher: FileMatcher::new([*pattern])?,
                }));
            }
            for name in &self.uploaders {
                ctx.register_uploader(Arc::new(TestUploader(*name)));
            }
            if self.fail {
                return Err(PluginError::ActivationFailed("boom".to_string()));
            }
            Ok(())
        }

        fn deactivate(&mut self) -> PluginResult<()> {
            self.calls.lock().unwrap().push(format!("deactivate {}", self.name));
            Ok(())
        }
    }

    fn loaded(id: &str, package_id: &str, plugin: TestPlugin) -> LoadedPlugin {
        LoadedPlugin {
            id: id.to_string(),
            package_id: package_id.to_string(),
            generation: 1,
            plugin: Box::new(plugin),
        }
    }

    fn calls() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    #[test]
    fn test_get_uploader_by_name_and_latest() {
        let calls = calls();
        let mut registry = PluginRegistry::new();
        registry.register(loaded(
            "p1",
            "p1",
            TestPlugin::new("p1", &calls).with_uploader("s3"),
        ));
        registry.register(loaded(
            "p2",
            "p2",
            TestPlugin::new("p2", &calls).with_uploader("ftp"),
        ));
        registry.activate_all();

        assert_eq!(registry.uploader_names(), vec!["s3", "ftp"]);
        assert_eq!(registry.get_uploader(None).unwrap().name(), "ftp");
        assert_eq!(registry.get_uploader(Some("s3")).unwrap().name(), "s3");
        assert!(registry.get_uploader(Some("webdav")).is_none());

        registry.deactivate("p2").unwrap();
        assert_eq!(registry.get_uploader(None).unwrap().name(), "s3");

        registry.unregister_package("p1");
        assert!(registry.get_uploader(None).is_none());
    }

    #[test]
    fn test_failed_activation_discards_uploaders() {
        let calls = calls();
        let mut registry = PluginRegistry::new();
        registry.register(loaded(
            "p1",
            "p1",
            TestPlugin::new("p1", &calls).with_uploader("s3").failing(),
        ));

        let report = registry.activate_all();

        assert_eq!(report.failed.len(), 1);
        assert!(registry.get_uploader(None).is_none());
    }

    #[test]
    fn test_later_previewer_wins() {
        let calls = calls();
        let mut registry = PluginRegistry::new();
        registry.register(loaded(
            "p1",
            "p1",
            TestPlugin::new("p1", &calls).with_previewer("P1", "*.txt"),
        ));
        registry.register(loaded(
            "p2",
            "p2",
            TestPlugin::new("p2", &calls).with_previewer("P2", "*.txt"),
        ));
        registry.activate_all();

        let previewer = registry.get_matching_previewer("a.txt").unwrap();
        assert_eq!(previewer.name(), "P2");
        assert!(registry.get_matching_previewer("a.png").is_none());
    }

    #[test]
    fn test_more_specific_previewer_registered_later_wins() {
        let calls = calls();
        let mut registry = PluginRegistry::new();
        registry.register(loaded(
            "generic",
            "generic",
            TestPlugin::new("generic", &calls).with_previewer("any", "*"),
        ));
        registry.register(loaded(
            "md",
            "md",
            TestPlugin::new("md", &calls).with_previewer("markdown", "*.md"),
        ));
        registry.activate_all();

        assert_eq!(
            registry.get_matching_previewer("README.md").unwrap().name(),
            "markdown"
        );
        assert_eq!(
            registry.get_matching_previewer("notes.txt").unwrap().name(),
            "any"
        );
    }

    #[test]
    fn test_activation_failure_is_isolated() {
        let calls = calls();
        let mut registry = PluginRegistry::new();
        registry.register(loaded(
            "p1",
            "p1",
            TestPlugin::new("p1", &calls)
                .with_previewer("P1", "*.txt")
                .failing(),
        ));
        registry.register(loaded("p2", "p2", TestPlugin::new("p2", &calls)));

        let report = registry.activate_all();

        assert_eq!(report.activated, vec!["p2"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "p1");
        assert_eq!(
            registry.get("p1").unwrap().state(),
            PluginState::ActivationFailed
        );
        assert_eq!(registry.get("p2").unwrap().state(), PluginState::Active);
        // previewers from the failed plugin are discarded
        assert!(registry.get_matching_previewer("a.txt").is_none());
    }

    #[test]
    fn test_activate_is_once_only() {
        let calls = calls();
        let mut registry = PluginRegistry::new();
        registry.register(loaded("p1", "p1", TestPlugin::new("p1", &calls)));

        registry.activate("p1").unwrap();
        assert!(matches!(
            registry.activate("p1"),
            Err(PluginManagerError::AlreadyActive { .. })
        ));

        let report = registry.activate_all();
        assert!(report.activated.is_empty());
        assert_eq!(calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_activate_unknown() {
        let mut registry = PluginRegistry::new();
        assert!(matches!(
            registry.activate("nope"),
            Err(PluginManagerError::PluginNotFound { .. })
        ));
    }

    #[test]
    fn test_register_same_id_replaces() {
        let calls = calls();
        let mut registry = PluginRegistry::new();

        assert!(!registry.register(loaded(
            "p1",
            "p1",
            TestPlugin::new("old", &calls).with_previewer("old", "*.txt"),
        )));
        registry.activate_all();

        assert!(registry.register(loaded(
            "p1",
            "p1",
            TestPlugin::new("new", &calls).with_previewer("new", "*.txt"),
        )));

        assert_eq!(registry.get_plugins().len(), 1);
        assert_eq!(registry.get("p1").unwrap().name(), "new");
        assert_eq!(registry.get("p1").unwrap().state(), PluginState::Loaded);
        assert!(registry.get_matching_previewer("a.txt").is_none());
        assert!(calls.lock().unwrap().contains(&"deactivate old".to_string()));

        registry.activate_all();
        assert_eq!(
            registry.get_matching_previewer("a.txt").unwrap().name(),
            "new"
        );
    }

    #[test]
    fn test_deactivate_drops_previewers() {
        let calls = calls();
        let mut registry = PluginRegistry::new();
        registry.register(loaded(
            "p1",
            "p1",
            TestPlugin::new("p1", &calls).with_previewer("P1", "*.txt"),
        ));
        registry.activate_all();
        assert_eq!(registry.previewer_count(), 1);

        registry.deactivate("p1").unwrap();

        assert_eq!(registry.get("p1").unwrap().state(), PluginState::Deactivated);
        assert_eq!(registry.previewer_count(), 0);

        // deactivating again is a no-op
        registry.deactivate("p1").unwrap();
        assert_eq!(
            calls
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.starts_with("deactivate"))
                .count(),
            1
        );
    }

    #[test]
    fn test_deactivate_all_in_reverse_order() {
        let calls = calls();
        let mut registry = PluginRegistry::new();
        registry.register(loaded("a", "a", TestPlugin::new("a", &calls)));
        registry.register(loaded("b", "b", TestPlugin::new("b", &calls)));
        registry.activate_all();

        registry.deactivate_all();

        let calls = calls.lock().unwrap();
        assert_eq!(
            *calls,
            vec!["activate a", "activate b", "deactivate b", "deactivate a"]
        );
    }

    #[test]
    fn test_unregister_package() {
        let calls = calls();
        let mut registry = PluginRegistry::new();
        registry.register(loaded("pkg", "pkg", TestPlugin::new("a", &calls)));
        registry.register(loaded("pkg#extra", "pkg", TestPlugin::new("b", &calls)));
        registry.register(loaded("other", "other", TestPlugin::new("c", &calls)));

        assert_eq!(registry.unregister_package("pkg"), 2);
        assert_eq!(registry.get_plugins().len(), 1);
        assert_eq!(registry.get_plugins()[0].id(), "other");
    }
}
