//! Entry resolution and plugin loading.
//!
//! Loading is an explicit reload: the cached module for an entry path is
//! evicted, the bytes are read again and a fresh component is compiled, so
//! re-installing a plugin at the same path always runs the new code.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use vista_config::LoaderConfig;
use vista_plugin::Plugin;
use vista_wasm_runtime::wasmtime::component::Component;
use vista_wasm_runtime::{PluginIdentity, WasmEngine, WasmPlugin, discover_candidates};

use crate::styles::{RenderSurface, inject_styles};
use crate::{PackageManifest, PluginManagerError, PluginManagerResult};

/// A compiled entry module and the generation it was loaded at.
#[derive(Clone)]
pub struct ModuleHandle {
    path: PathBuf,
    generation: u64,
    component: Component,
}

impl ModuleHandle {
    /// Returns the entry path the module was compiled from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the load generation; every load gets a new one.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the compiled component.
    #[must_use]
    pub fn component(&self) -> &Component {
        &self.component
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("path", &self.path)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

/// Compiled modules keyed by entry path.
#[derive(Debug, Default)]
pub struct ModuleCache {
    modules: HashMap<PathBuf, ModuleHandle>,
    next_generation: u64,
}

impl ModuleCache {
    /// Evicts the module for `path`, compiles the file again and caches the
    /// result under a new generation.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or compiled. The previous
    /// module stays evicted.
    pub fn reload(
        &mut self,
        engine: &WasmEngine,
        path: &Path,
    ) -> PluginManagerResult<ModuleHandle> {
        if let Some(old) = self.evict(path) {
            debug!(path = %path.display(), generation = old.generation, "evicted cached module");
        }

        let component =
            engine
                .load_component(path)
                .map_err(|source| PluginManagerError::WasmLoad {
                    path: path.to_path_buf(),
                    source,
                })?;

        self.next_generation += 1;
        let handle = ModuleHandle {
            path: path.to_path_buf(),
            generation: self.next_generation,
            component,
        };
        self.modules.insert(path.to_path_buf(), handle.clone());

        Ok(handle)
    }

    /// Removes the module cached for `path`.
    pub fn evict(&mut self, path: &Path) -> Option<ModuleHandle> {
        self.modules.remove(path)
    }

    /// Returns the module cached for `path`.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&ModuleHandle> {
        self.modules.get(path)
    }

    /// Returns the number of cached modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// A plugin instance produced by a load.
pub struct LoadedPlugin {
    /// Registry id: the package id, suffixed with `#{export}` for plugins
    /// found in a named instance export.
    pub id: String,
    /// Id of the package the plugin came from.
    pub package_id: String,
    /// Generation of the module the instance was created from.
    pub generation: u64,
    /// The instance.
    pub plugin: Box<dyn Plugin>,
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("id", &self.id)
            .field("package_id", &self.package_id)
            .field("generation", &self.generation)
            .field("name", &self.plugin.name())
            .finish_non_exhaustive()
    }
}

/// Resolves entry files and turns them into plugin instances.
pub struct PluginLoader {
    engine: WasmEngine,
    cache: ModuleCache,
    config: LoaderConfig,
}

impl PluginLoader {
    /// Creates a loader.
    #[must_use]
    pub fn new(engine: WasmEngine, config: LoaderConfig) -> Self {
        Self {
            engine,
            cache: ModuleCache::default(),
            config,
        }
    }

    /// Returns the module cache.
    #[must_use]
    pub fn cache(&self) -> &ModuleCache {
        &self.cache
    }

    /// Resolves the entry file of a package.
    ///
    /// Uses the declared entry or the configured default, then the same path
    /// with the configured extension appended.
    ///
    /// # Errors
    ///
    /// Returns [`PluginManagerError::EntryNotFound`] if neither exists.
    pub fn resolve_entry(
        &self,
        root: &Path,
        manifest: &PackageManifest,
    ) -> PluginManagerResult<PathBuf> {
        let declared = manifest
            .entry
            .as_deref()
            .unwrap_or(&self.config.default_entry);

        let path = crate::protocol::resolve_within(root, Path::new(declared)).ok_or_else(|| {
            PluginManagerError::EntryNotFound {
                path: root.join(declared),
            }
        })?;
        if path.is_file() {
            return Ok(path);
        }

        let mut with_extension = path.clone().into_os_string();
        with_extension.push(".");
        with_extension.push(&self.config.entry_extension);
        let with_extension = PathBuf::from(with_extension);
        if with_extension.is_file() {
            debug!(path = %with_extension.display(), "resolved entry with extension fallback");
            return Ok(with_extension);
        }

        Err(PluginManagerError::EntryNotFound { path })
    }

    /// Returns the stylesheets to inject for a package: the declared ones,
    /// or the conventional default when it exists and none are declared.
    #[must_use]
    pub fn resolve_styles(&self, root: &Path, manifest: &PackageManifest) -> Vec<String> {
        if !manifest.styles.is_empty() {
            return manifest.styles.clone();
        }

        if root.join(&self.config.default_stylesheet).is_file() {
            vec![self.config.default_stylesheet.clone()]
        } else {
            Vec::new()
        }
    }

    /// Loads every plugin a package's entry exports, without a rendering
    /// surface.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry cannot be resolved or compiled, exports
    /// no plugin, or any candidate fails to instantiate.
    pub fn load(
        &mut self,
        root: &Path,
        manifest: &PackageManifest,
    ) -> PluginManagerResult<Vec<LoadedPlugin>> {
        self.load_with(root, manifest, None)
    }

    /// Like [`PluginLoader::load`], then injects the package's stylesheets
    /// into `surface`.
    ///
    /// # Errors
    ///
    /// See [`PluginLoader::load`].
    pub fn load_into(
        &mut self,
        root: &Path,
        manifest: &PackageManifest,
        surface: &mut dyn RenderSurface,
    ) -> PluginManagerResult<Vec<LoadedPlugin>> {
        self.load_with(root, manifest, Some(surface))
    }

    /// Drops the cached module of a package, if any.
    pub fn unload(&mut self, root: &Path, manifest: &PackageManifest) {
        if let Ok(entry) = self.resolve_entry(root, manifest)
            && self.cache.evict(&entry).is_some()
        {
            debug!(path = %entry.display(), "unloaded module");
        }
    }

    fn load_with(
        &mut self,
        root: &Path,
        manifest: &PackageManifest,
        surface: Option<&mut dyn RenderSurface>,
    ) -> PluginManagerResult<Vec<LoadedPlugin>> {
        let entry = self.resolve_entry(root, manifest)?;
        let module = self.cache.reload(&self.engine, &entry)?;

        let candidates = discover_candidates(&self.engine, module.component());
        if candidates.is_empty() {
            return Err(PluginManagerError::InvalidPackage {
                path: entry,
                reason: "entry exports no plugin".to_string(),
            });
        }

        let identity = PluginIdentity::new(&manifest.name, manifest.version.to_string());
        let mut loaded = Vec::with_capacity(candidates.len());

        for candidate in &candidates {
            let plugin =
                WasmPlugin::instantiate(&self.engine, module.component(), candidate, &identity)
                    .map_err(|source| PluginManagerError::WasmLoad {
                        path: entry.clone(),
                        source,
                    })?;

            let id = match plugin.export() {
                Some(export) => format!("{}#{export}", manifest.id),
                None => manifest.id.clone(),
            };

            loaded.push(LoadedPlugin {
                id,
                package_id: manifest.id.clone(),
                generation: module.generation(),
                plugin: Box::new(plugin),
            });
        }

        if let Some(surface) = surface {
            let styles = self.resolve_styles(root, manifest);
            let injected = inject_styles(surface, root, &styles);
            debug!(id = %manifest.id, injected, "injected stylesheets");
        }

        info!(
            id = %manifest.id,
            count = loaded.len(),
            generation = module.generation(),
            "loaded plugin package"
        );

        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PluginKind;
    use crate::styles::Document;
    use tempfile::TempDir;

    const PRIMARY: &str = r#"(component
        (core module $m
            (func (export "activate"))
            (func (export "deactivate")))
        (core instance $i (instantiate $m))
        (func (export "activate") (canon lift (core func $i "activate")))
        (func (export "deactivate") (canon lift (core func $i "deactivate")))
    )"#;

    fn manifest(entry: Option<&str>, styles: &[&str]) -> PackageManifest {
        PackageManifest {
            id: "plugin_md".to_string(),
            name: "md".to_string(),
            version: semver::Version::new(1, 0, 0),
            entry: entry.map(str::to_string),
            styles: styles.iter().map(|s| (*s).to_string()).collect(),
            kind: PluginKind::Generic,
        }
    }

    fn loader() -> PluginLoader {
        PluginLoader::new(WasmEngine::new().unwrap(), LoaderConfig::default())
    }

    #[test]
    fn test_resolve_entry_default() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("index.wasm"), PRIMARY).unwrap();

        let entry = loader().resolve_entry(temp.path(), &manifest(None, &[])).unwrap();
        assert_eq!(entry, temp.path().join("index.wasm"));
    }

    #[test]
    fn test_resolve_entry_extension_fallback() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("main.wasm"), PRIMARY).unwrap();

        let entry = loader()
            .resolve_entry(temp.path(), &manifest(Some("main"), &[]))
            .unwrap();
        assert_eq!(entry, temp.path().join("main.wasm"));
    }

    #[test]
    fn test_resolve_entry_missing() {
        let temp = TempDir::new().unwrap();

        let result = loader().resolve_entry(temp.path(), &manifest(Some("main"), &[]));
        assert!(matches!(
            result,
            Err(PluginManagerError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_entry_outside_root() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(temp.path().join("evil.wasm"), PRIMARY).unwrap();

        let result = loader().resolve_entry(&root, &manifest(Some("../evil.wasm"), &[]));
        assert!(matches!(
            result,
            Err(PluginManagerError::EntryNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_styles_default_stylesheet() {
        let temp = TempDir::new().unwrap();
        let loader = loader();

        assert!(loader.resolve_styles(temp.path(), &manifest(None, &[])).is_empty());

        std::fs::write(temp.path().join("index.css"), "body {}").unwrap();
        assert_eq!(
            loader.resolve_styles(temp.path(), &manifest(None, &[])),
            vec!["index.css"]
        );
        assert_eq!(
            loader.resolve_styles(temp.path(), &manifest(None, &["theme.css"])),
            vec!["theme.css"]
        );
    }

    #[test]
    fn test_reload_bumps_generation() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.wasm");
        std::fs::write(&path, PRIMARY).unwrap();

        let engine = WasmEngine::new().unwrap();
        let mut cache = ModuleCache::default();

        let first = cache.reload(&engine, &path).unwrap();
        let second = cache.reload(&engine, &path).unwrap();

        assert!(second.generation() > first.generation());
        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.get(&path).map(ModuleHandle::generation),
            Some(second.generation())
        );
    }

    #[test]
    fn test_reload_failure_leaves_entry_evicted() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index.wasm");
        std::fs::write(&path, PRIMARY).unwrap();

        let engine = WasmEngine::new().unwrap();
        let mut cache = ModuleCache::default();
        cache.reload(&engine, &path).unwrap();

        std::fs::write(&path, "garbage").unwrap();
        assert!(cache.reload(&engine, &path).is_err());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_load_without_surface_injects_nothing() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("index.wasm"), PRIMARY).unwrap();
        std::fs::write(temp.path().join("index.css"), "body {}").unwrap();

        let mut loader = loader();
        let loaded = loader.load(temp.path(), &manifest(None, &[])).unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "plugin_md");
        assert_eq!(loaded[0].plugin.name(), "md");
    }

    #[test]
    fn test_load_into_surface_injects_styles() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("index.wasm"), PRIMARY).unwrap();
        std::fs::write(temp.path().join("index.css"), "body {}").unwrap();

        let mut doc = Document::new();
        let mut loader = loader();
        loader
            .load_into(temp.path(), &manifest(None, &[]), &mut doc)
            .unwrap();

        assert_eq!(doc.styles().len(), 1);
        assert_eq!(doc.styles()[0].origin, temp.path());
    }

    #[test]
    fn test_load_without_candidates_fails() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("index.wasm"), "(component)").unwrap();

        let result = loader().load(temp.path(), &manifest(None, &[]));
        assert!(matches!(
            result,
            Err(PluginManagerError::InvalidPackage { .. })
        ));
    }

    #[test]
    fn test_unload_evicts() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("index.wasm"), PRIMARY).unwrap();

        let mut loader = loader();
        let manifest = manifest(None, &[]);
        loader.load(temp.path(), &manifest).unwrap();
        assert_eq!(loader.cache().len(), 1);

        loader.unload(temp.path(), &manifest);
        assert!(loader.cache().is_empty());
    }
}
