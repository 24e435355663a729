//! The plugin host: one owned object tying storage, loading and the
//! registry together.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{info, warn};
use vista_config::Config;
use vista_plugin::{FilePreviewer, FileUploader};
use vista_wasm_runtime::WasmEngine;

use crate::installer::InstallLocks;
use crate::loader::{LoadedPlugin, PluginLoader};
use crate::protocol::ContentRequest;
use crate::registry::{ActivationReport, PluginRegistry};
use crate::styles::RenderSurface;
use crate::{
    ManifestRecord, ManifestStore, Materializer, PackageManifest, PluginKind, PluginManagerError,
    PluginManagerResult, PluginStorage,
};

/// Shared handle to a rendering surface.
pub type SharedSurface = Arc<Mutex<dyn RenderSurface>>;

/// Owns everything needed to install, load and run plugins.
pub struct PluginHost {
    storage: PluginStorage,
    config: Config,
    store: tokio::sync::Mutex<ManifestStore>,
    materializer: Materializer,
    loader: Arc<Mutex<PluginLoader>>,
    registry: Mutex<PluginRegistry>,
    surface: Option<SharedSurface>,
    locks: InstallLocks,
}

impl PluginHost {
    /// Creates a headless host.
    ///
    /// # Errors
    ///
    /// Returns an error if the WASM engine cannot be created.
    pub fn new(storage: PluginStorage, config: Config) -> PluginManagerResult<Self> {
        let engine = WasmEngine::new().map_err(|source| PluginManagerError::WasmLoad {
            path: PathBuf::new(),
            source,
        })?;

        Ok(Self {
            store: tokio::sync::Mutex::new(ManifestStore::new(storage.manifest_path())),
            materializer: Materializer::new(storage.plugins_dir()),
            loader: Arc::new(Mutex::new(PluginLoader::new(
                engine,
                config.loader.clone(),
            ))),
            registry: Mutex::new(PluginRegistry::new()),
            surface: None,
            locks: InstallLocks::new(),
            storage,
            config,
        })
    }

    /// Attaches a rendering surface; loads performed afterwards inject
    /// stylesheets into it.
    #[must_use]
    pub fn with_surface(mut self, surface: SharedSurface) -> Self {
        self.surface = Some(surface);
        self
    }

    /// Returns the storage layout.
    #[must_use]
    pub fn storage(&self) -> &PluginStorage {
        &self.storage
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Installs a plugin archive.
    ///
    /// The archive is extracted to the plugin's root, generic plugins are
    /// loaded and registered (replacing any previous instances of the same
    /// package), and the manifest record is upserted. An installed plugin
    /// with the same name but another id is removed entirely. Installs of
    /// the same plugin id are serialized.
    ///
    /// # Errors
    ///
    /// Fails with [`PluginManagerError::NotFound`],
    /// [`PluginManagerError::InvalidPackage`],
    /// [`PluginManagerError::IdConflict`] when another plugin's name maps to
    /// the same id,
    /// [`PluginManagerError::EntryNotFound`], [`PluginManagerError::WasmLoad`]
    /// or [`PluginManagerError::Persistence`]. The registry is only changed
    /// once everything else succeeded.
    pub async fn install(&self, archive: &Path) -> PluginManagerResult<ManifestRecord> {
        let declared = {
            let materializer = self.materializer.clone();
            let archive = archive.to_path_buf();
            tokio::task::spawn_blocking(move || materializer.identify(&archive)).await??
        };

        let _guard = self.locks.acquire(&declared.id).await;
        info!(id = %declared.id, archive = %archive.display(), "installing plugin");

        let existing = self.store.lock().await.get(&declared.id)?;
        if let Some(existing) = existing
            && existing.name != declared.name
        {
            return Err(PluginManagerError::IdConflict {
                id: declared.id,
                existing: existing.name,
                name: declared.name,
            });
        }

        let (package, loaded) = {
            let materializer = self.materializer.clone();
            let loader = Arc::clone(&self.loader);
            let surface = self.surface.clone();
            let archive = archive.to_path_buf();

            tokio::task::spawn_blocking(move || {
                let package = materializer.materialize(&archive)?;
                let loaded = match package.manifest.kind {
                    PluginKind::Generic => load_package(
                        &loader,
                        surface.as_ref(),
                        &package.root_path,
                        &package.manifest,
                    )?,
                    PluginKind::Legacy => Vec::new(),
                };
                Ok::<_, PluginManagerError>((package, loaded))
            })
            .await??
        };

        let record = ManifestRecord::from_package(&package);
        let displaced = self.store.lock().await.upsert(record.clone())?;

        // a record replaced by name under another id is gone for good
        for old in displaced.iter().filter(|old| old.id != record.id) {
            info!(old = %old.id, new = %record.id, "plugin replaced under a new id");
            self.teardown(old);
        }

        let mut registry = self.registry();
        registry.unregister_package(&record.id);
        for plugin in loaded {
            registry.register(plugin);
        }

        info!(id = %record.id, version = %record.version, "installed plugin");
        Ok(record)
    }

    /// Removes an installed plugin: its record, instances, cached module,
    /// stylesheets and files.
    ///
    /// # Errors
    ///
    /// Returns [`PluginManagerError::PluginNotFound`] if no such plugin is
    /// installed, or an error if the store cannot be updated.
    pub async fn uninstall(&self, id: &str) -> PluginManagerResult<ManifestRecord> {
        let _guard = self.locks.acquire(id).await;

        let record = self
            .store
            .lock()
            .await
            .remove(id)?
            .ok_or_else(|| PluginManagerError::PluginNotFound { id: id.to_string() })?;

        self.teardown(&record);

        info!(id, "uninstalled plugin");
        Ok(record)
    }

    /// Drops everything a recorded plugin left behind: its instances, cached
    /// module, stylesheets and files.
    fn teardown(&self, record: &ManifestRecord) {
        self.registry().unregister_package(&record.id);

        if record.kind == PluginKind::Generic
            && let Ok(manifest) = PackageManifest::read(&record.entry_url, record.kind)
        {
            lock(&self.loader).unload(&record.entry_url, &manifest);
        }

        if let Some(surface) = &self.surface {
            lock(surface).remove_origin(&record.entry_url);
        }

        if let Err(e) = self.storage.remove_root(&record.id) {
            warn!(id = %record.id, "failed to remove plugin files: {e}");
        }
    }

    /// Lists installed plugins.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest store cannot be read.
    pub async fn list(&self) -> PluginManagerResult<Vec<ManifestRecord>> {
        self.store.lock().await.list()
    }

    /// Gets an installed plugin.
    ///
    /// # Errors
    ///
    /// Returns [`PluginManagerError::PluginNotFound`] if no such plugin is
    /// installed.
    pub async fn get(&self, id: &str) -> PluginManagerResult<ManifestRecord> {
        self.store
            .lock()
            .await
            .get(id)?
            .ok_or_else(|| PluginManagerError::PluginNotFound { id: id.to_string() })
    }

    /// Loads and registers every installed generic plugin.
    ///
    /// A package that fails to load is logged and skipped. Returns the
    /// number of plugin instances registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest store cannot be read.
    pub async fn load_installed(&self) -> PluginManagerResult<usize> {
        let records = self.list().await?;
        let mut count = 0;

        for record in records
            .into_iter()
            .filter(|r| r.kind == PluginKind::Generic)
        {
            let loader = Arc::clone(&self.loader);
            let surface = self.surface.clone();
            let root = record.entry_url.clone();

            let result = tokio::task::spawn_blocking(move || {
                let manifest = PackageManifest::read(&root, PluginKind::Generic)?;
                load_package(&loader, surface.as_ref(), &root, &manifest)
            })
            .await?;

            match result {
                Ok(loaded) => {
                    let mut registry = self.registry();
                    registry.unregister_package(&record.id);
                    count += loaded.len();
                    for plugin in loaded {
                        registry.register(plugin);
                    }
                }
                Err(e) => warn!(id = %record.id, "failed to load installed plugin: {e}"),
            }
        }

        Ok(count)
    }

    /// Activates every registered plugin that has not been activated yet.
    pub fn activate_all(&self) -> ActivationReport {
        self.registry().activate_all()
    }

    /// Deactivates every active plugin.
    pub fn deactivate_all(&self) {
        self.registry().deactivate_all();
    }

    /// Returns the previewer responsible for a file name.
    #[must_use]
    pub fn matching_previewer(&self, file_name: &str) -> Option<Arc<dyn FilePreviewer>> {
        self.registry().get_matching_previewer(file_name)
    }

    /// Returns the uploader with the given name, or the most recently
    /// registered one.
    #[must_use]
    pub fn uploader(&self, name: Option<&str>) -> Option<Arc<dyn FileUploader>> {
        self.registry().get_uploader(name)
    }

    /// Runs `f` with read access to the registry.
    pub fn with_registry<R>(&self, f: impl FnOnce(&PluginRegistry) -> R) -> R {
        f(&self.registry())
    }

    /// Resolves a content request such as `plugin://{id}/index.html` to a
    /// file inside the plugin's root.
    ///
    /// # Errors
    ///
    /// Returns [`PluginManagerError::InvalidRequest`] for malformed or
    /// escaping requests, [`PluginManagerError::PluginNotFound`] for unknown
    /// plugins and [`PluginManagerError::NotFound`] for missing files.
    pub async fn resolve_content(&self, request: &str) -> PluginManagerResult<PathBuf> {
        let request = ContentRequest::parse(&self.config.protocol.scheme, request)?;
        let record = self.get(&request.id).await?;
        let path = request.resolve(&record.entry_url)?;

        if !path.is_file() {
            return Err(PluginManagerError::NotFound {
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                path,
            });
        }

        Ok(path)
    }

    fn registry(&self) -> MutexGuard<'_, PluginRegistry> {
        lock(&self.registry)
    }
}

impl Drop for PluginHost {
    fn drop(&mut self) {
        self.registry
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .deactivate_all();
    }
}

fn load_package(
    loader: &Mutex<PluginLoader>,
    surface: Option<&SharedSurface>,
    root: &Path,
    manifest: &PackageManifest,
) -> PluginManagerResult<Vec<LoadedPlugin>> {
    let mut loader = lock(loader);
    match surface {
        Some(surface) => loader.load_into(root, manifest, &mut *lock(surface)),
        None => loader.load(root, manifest),
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
