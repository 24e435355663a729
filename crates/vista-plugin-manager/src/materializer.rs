//! Extraction of plugin archives into their root directories.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::{PackageManifest, PluginKind, PluginManagerError, PluginManagerResult};

const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

/// A package extracted to its root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedPackage {
    /// Manifest read from the extracted root.
    pub manifest: PackageManifest,
    /// Root directory owned by the package.
    pub root_path: PathBuf,
}

/// Extracts plugin archives below a plugins directory.
///
/// The root of a package is `{plugins_dir}/{id}` where the id comes from the
/// archive's own manifest, so installing the same logical plugin twice
/// reuses one directory.
#[derive(Debug, Clone)]
pub struct Materializer {
    plugins_dir: PathBuf,
}

impl Materializer {
    /// Creates a materializer writing below `plugins_dir`.
    #[must_use]
    pub fn new(plugins_dir: impl Into<PathBuf>) -> Self {
        Self {
            plugins_dir: plugins_dir.into(),
        }
    }

    /// Reads the manifest straight from an archive without extracting it.
    ///
    /// # Errors
    ///
    /// Returns [`PluginManagerError::NotFound`] if the archive cannot be
    /// opened and [`PluginManagerError::InvalidPackage`] if it is not a zip
    /// archive or has no valid manifest at its root.
    pub fn identify(&self, archive_path: &Path) -> PluginManagerResult<PackageManifest> {
        let kind = PluginKind::from_archive(archive_path);
        let mut archive = open_archive(archive_path)?;

        let mut entry = archive.by_name(kind.manifest_file()).map_err(|e| match e {
            ZipError::FileNotFound => {
                invalid(archive_path, format!("missing {}", kind.manifest_file()))
            }
            other => invalid(archive_path, other.to_string()),
        })?;

        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| invalid(archive_path, e.to_string()))?;

        PackageManifest::parse(kind, &bytes, archive_path)
    }

    /// Extracts an archive into its root directory and reads the manifest
    /// from the result.
    ///
    /// An existing root is deleted first. If that fails the error is logged
    /// and extraction proceeds into the existing directory.
    ///
    /// # Errors
    ///
    /// Returns [`PluginManagerError::NotFound`] if the archive cannot be
    /// opened and [`PluginManagerError::InvalidPackage`] if it is not a
    /// plugin package.
    pub fn materialize(&self, archive_path: &Path) -> PluginManagerResult<MaterializedPackage> {
        let declared = self.identify(archive_path)?;
        let root_path = self.plugins_dir.join(&declared.id);

        if root_path.exists() {
            debug!(path = %root_path.display(), "removing previous plugin root");
            if let Err(e) = std::fs::remove_dir_all(&root_path) {
                warn!(
                    path = %root_path.display(),
                    "failed to remove previous plugin root, extracting over it: {e}"
                );
            }
        }
        std::fs::create_dir_all(&root_path)?;

        let mut archive = open_archive(archive_path)?;
        extract(&mut archive, archive_path, &root_path)?;

        let manifest = PackageManifest::read(&root_path, declared.kind)?;
        info!(id = %manifest.id, path = %root_path.display(), "materialized plugin package");

        Ok(MaterializedPackage {
            manifest,
            root_path,
        })
    }
}

fn open_archive(path: &Path) -> PluginManagerResult<ZipArchive<File>> {
    let file = File::open(path).map_err(|source| PluginManagerError::NotFound {
        path: path.to_path_buf(),
        source,
    })?;

    ZipArchive::new(file).map_err(|e| invalid(path, e.to_string()))
}

fn extract(
    archive: &mut ZipArchive<File>,
    archive_path: &Path,
    root: &Path,
) -> PluginManagerResult<()> {
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| invalid(archive_path, e.to_string()))?;

        let Some(relative) = entry.enclosed_name() else {
            warn!(entry = entry.name(), "skipping archive entry outside the plugin root");
            continue;
        };

        if entry.unix_mode().is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            debug!(entry = entry.name(), "skipping symlink entry");
            continue;
        }

        let target = root.join(relative);
        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&target)?;
            std::io::copy(&mut entry, &mut out)?;
        }
    }

    Ok(())
}

fn invalid(path: &Path, reason: String) -> PluginManagerError {
    PluginManagerError::InvalidPackage {
        path: path.to_path_buf(),
        reason,
    }
}
