//! Local plugin storage management.
//!
//! Plugins are stored in `~/.vista/` with the following structure:
//! ```text
//! ~/.vista/
//! ├── plugins/
//! │   ├── plugin_markdown-preview/
//! │   │   ├── package.json
//! │   │   └── index.wasm
//! │   ├── eagle_color-picker/
//! │   │   ├── manifest.json
//! │   │   └── index.html
//! │   └── ...
//! └── plugins.json
//! ```

use std::path::{Path, PathBuf};

use vista_config::Config;

use crate::{PluginManagerError, PluginManagerResult};

/// Name of the manifest store file.
pub const MANIFEST_STORE_FILE: &str = "plugins.json";

/// Manages local plugin storage.
#[derive(Debug, Clone)]
pub struct PluginStorage {
    base_dir: PathBuf,
}

impl PluginStorage {
    /// Creates a new plugin storage instance in the default location.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created.
    pub fn new() -> PluginManagerResult<Self> {
        let base_dir = Self::default_base_dir()?;
        Self::with_base_dir(base_dir)
    }

    /// Creates a storage instance in the configured directory, or the
    /// default location when none is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created.
    pub fn from_config(config: &Config) -> PluginManagerResult<Self> {
        match config.storage.resolved_dir() {
            Some(dir) => Self::with_base_dir(dir),
            None => Self::new(),
        }
    }

    /// Creates a new plugin storage instance with a custom base directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage directory cannot be created.
    pub fn with_base_dir(base_dir: PathBuf) -> PluginManagerResult<Self> {
        let plugins_dir = base_dir.join("plugins");

        std::fs::create_dir_all(&plugins_dir).map_err(|source| {
            PluginManagerError::StorageCreation {
                path: plugins_dir,
                source,
            }
        })?;

        Ok(Self { base_dir })
    }

    /// Returns the default base directory (`~/.vista`).
    fn default_base_dir() -> PluginManagerResult<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| PluginManagerError::StorageCreation {
            path: PathBuf::from("~/.vista"),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "could not determine home directory",
            ),
        })?;

        Ok(home.join(".vista"))
    }

    /// Returns the base directory path.
    #[must_use]
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Returns the plugins directory path.
    #[must_use]
    pub fn plugins_dir(&self) -> PathBuf {
        self.base_dir.join("plugins")
    }

    /// Returns the manifest store path.
    #[must_use]
    pub fn manifest_path(&self) -> PathBuf {
        self.base_dir.join(MANIFEST_STORE_FILE)
    }

    /// Returns the root directory owned by a plugin.
    #[must_use]
    pub fn root_path(&self, id: &str) -> PathBuf {
        self.plugins_dir().join(id)
    }

    /// Removes a plugin's root directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory exists but cannot be deleted.
    pub fn remove_root(&self, id: &str) -> PluginManagerResult<()> {
        let path = self.root_path(id);

        if path.exists() {
            std::fs::remove_dir_all(&path)?;
            tracing::info!("Removed plugin files from {}", path.display());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout() {
        let temp = TempDir::new().unwrap();
        let storage = PluginStorage::with_base_dir(temp.path().to_path_buf()).unwrap();

        assert!(storage.plugins_dir().is_dir());
        assert_eq!(storage.manifest_path(), temp.path().join("plugins.json"));
        assert_eq!(
            storage.root_path("plugin_md"),
            temp.path().join("plugins").join("plugin_md")
        );
    }

    #[test]
    fn test_from_config_uses_configured_dir() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.dir = Some(temp.path().join("custom"));

        let storage = PluginStorage::from_config(&config).unwrap();
        assert_eq!(storage.base_dir(), temp.path().join("custom"));
        assert!(temp.path().join("custom/plugins").is_dir());
    }

    #[test]
    fn test_remove_root() {
        let temp = TempDir::new().unwrap();
        let storage = PluginStorage::with_base_dir(temp.path().to_path_buf()).unwrap();
        let root = storage.root_path("plugin_md");
        std::fs::create_dir_all(root.join("nested")).unwrap();
        std::fs::write(root.join("nested/file.txt"), "x").unwrap();

        storage.remove_root("plugin_md").unwrap();
        assert!(!root.exists());

        // removing twice is fine
        storage.remove_root("plugin_md").unwrap();
    }
}
