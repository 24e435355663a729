//! Content protocol serving files from plugin roots.
//!
//! Requests look like `plugin://{id}/{path}` or just `{id}/{path}`. The
//! host looks up the plugin's root in the manifest store and serves
//! `root/path`; this module only parses requests and confines paths.

use std::path::{Component, Path, PathBuf};

use crate::{PluginManagerError, PluginManagerResult};

/// File served when a request names no path.
pub const INDEX_FILE: &str = "index.html";

/// A parsed content request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    /// Plugin id.
    pub id: String,
    /// Path relative to the plugin root.
    pub path: String,
}

impl ContentRequest {
    /// Parses a request under the given scheme.
    ///
    /// Query strings and fragments are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`PluginManagerError::InvalidRequest`] if the request uses
    /// another scheme or names no plugin.
    pub fn parse(scheme: &str, request: &str) -> PluginManagerResult<Self> {
        let invalid = |reason: &str| PluginManagerError::InvalidRequest {
            request: request.to_string(),
            reason: reason.to_string(),
        };

        let rest = match request.split_once("://") {
            Some((s, rest)) if s.eq_ignore_ascii_case(scheme) => rest,
            Some(_) => return Err(invalid("unsupported scheme")),
            None => request,
        };

        let rest = rest.split(['?', '#']).next().unwrap_or_default();
        let rest = rest.trim_start_matches('/');

        let (id, path) = rest.split_once('/').unwrap_or((rest, ""));
        if id.is_empty() {
            return Err(invalid("missing plugin id"));
        }

        let path = if path.is_empty() { INDEX_FILE } else { path };

        Ok(Self {
            id: id.to_string(),
            path: path.to_string(),
        })
    }

    /// Resolves the request against a plugin root.
    ///
    /// # Errors
    ///
    /// Returns [`PluginManagerError::InvalidRequest`] if the path escapes
    /// the root.
    pub fn resolve(&self, root: &Path) -> PluginManagerResult<PathBuf> {
        resolve_within(root, Path::new(&self.path)).ok_or_else(|| {
            PluginManagerError::InvalidRequest {
                request: format!("{}/{}", self.id, self.path),
                reason: "path escapes the plugin root".to_string(),
            }
        })
    }
}

/// Formats the URL of a file inside a plugin.
#[must_use]
pub fn plugin_url(scheme: &str, id: &str, path: &str) -> String {
    format!("{scheme}://{id}/{}", path.trim_start_matches('/'))
}

/// Joins `relative` onto `root`, returning `None` if the result would leave
/// `root`. Neither path needs to exist.
#[must_use]
pub fn resolve_within(root: &Path, relative: &Path) -> Option<PathBuf> {
    if relative.has_root() {
        return None;
    }

    let root = normalize_path(root);
    let joined = normalize_path(&root.join(relative));

    joined.starts_with(&root).then_some(joined)
}

/// Resolves `.` and `..` components without touching the filesystem.
fn normalize_path(path: &Path) -> PathBuf {
    let mut components = Vec::new();

    for component in path.components() {
        match component {
            Component::ParentDir => {
                components.pop();
            }
            Component::CurDir => {}
            c => components.push(c),
        }
    }

    components.iter().collect()
}
