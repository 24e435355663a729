//! Manifest store tracking installed plugins.
//!
//! The store is a JSON array at `~/.vista/plugins.json`, read and written
//! wholesale on every operation:
//! ```json
//! [{ "id": "plugin_md", "name": "md", "version": "1.0.0",
//!    "entryUrl": "/home/me/.vista/plugins/plugin_md", "type": "generic" }]
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::materializer::MaterializedPackage;
use crate::{PluginKind, PluginManagerError, PluginManagerResult};

/// A persisted record for one installed plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestRecord {
    /// Stable plugin id.
    pub id: String,
    /// Display name; unique across records.
    pub name: String,
    /// Installed version.
    pub version: String,
    /// Root directory holding the plugin's files.
    pub entry_url: PathBuf,
    /// Package flavour.
    #[serde(rename = "type", default)]
    pub kind: PluginKind,
    /// Installation timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installed_at: Option<DateTime<Utc>>,
}

impl ManifestRecord {
    /// Builds the record for a freshly materialized package.
    #[must_use]
    pub fn from_package(package: &MaterializedPackage) -> Self {
        Self {
            id: package.manifest.id.clone(),
            name: package.manifest.name.clone(),
            version: package.manifest.version.to_string(),
            entry_url: package.root_path.clone(),
            kind: package.manifest.kind,
            installed_at: Some(Utc::now()),
        }
    }
}

/// File-backed manifest store.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    /// Creates a store backed by the given file. The file need not exist.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lists all records in stored order.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn list(&self) -> PluginManagerResult<Vec<ManifestRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| self.persistence(e))?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&content).map_err(|e| self.persistence(e.into()))
    }

    /// Gets a record by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn get(&self, id: &str) -> PluginManagerResult<Option<ManifestRecord>> {
        Ok(self.list()?.into_iter().find(|r| r.id == id))
    }

    /// Inserts a record, replacing any record with the same name or id.
    ///
    /// Returns the records that were replaced. A replaced record may carry a
    /// different id than `record` when only the name matched.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn upsert(&self, record: ManifestRecord) -> PluginManagerResult<Vec<ManifestRecord>> {
        let (displaced, mut records): (Vec<_>, Vec<_>) = self
            .list()?
            .into_iter()
            .partition(|r| r.name == record.name || r.id == record.id);

        for old in &displaced {
            tracing::debug!(old = %old.id, new = %record.id, "replacing manifest record");
        }

        records.push(record);
        self.save(&records)?;

        Ok(displaced)
    }

    /// Removes the record with the given id.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or written.
    pub fn remove(&self, id: &str) -> PluginManagerResult<Option<ManifestRecord>> {
        let mut records = self.list()?;

        let Some(index) = records.iter().position(|r| r.id == id) else {
            return Ok(None);
        };

        let removed = records.remove(index);
        self.save(&records)?;

        Ok(Some(removed))
    }

    fn save(&self, records: &[ManifestRecord]) -> PluginManagerResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.persistence(e))?;
        }

        let content =
            serde_json::to_string_pretty(records).map_err(|e| self.persistence(e.into()))?;
        std::fs::write(&self.path, content).map_err(|e| self.persistence(e))
    }

    fn persistence(&self, source: std::io::Error) -> PluginManagerError {
        PluginManagerError::Persistence {
            path: self.path.clone(),
            source,
        }
    }
}
