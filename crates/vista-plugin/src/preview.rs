//! Preview targets and file matching.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use glob::{MatchOptions, Pattern};

use crate::{PluginError, PluginResult};

/// A file handed to a previewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFile {
    /// Display name (usually the file name).
    pub name: String,
    /// Absolute path of the file on disk.
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

impl PreviewFile {
    /// Creates a preview file description.
    #[must_use]
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>, size: u64) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            size,
        }
    }

    /// Describes an existing file on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> PluginResult<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;
        let name = path
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or_default()
            .to_string();

        Ok(Self::new(name, path, metadata.len()))
    }
}

/// The surface a previewer renders into.
///
/// Clones share the same content, the way two handles to one DOM node do,
/// so a cleanup callback can keep a clone and clear it later.
#[derive(Debug, Clone, Default)]
pub struct PreviewContainer {
    id: String,
    content: Arc<Mutex<Option<String>>>,
}

impl PreviewContainer {
    /// Creates an empty container.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: Arc::default(),
        }
    }

    /// Returns the container id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Replaces the rendered content.
    pub fn set_content(&self, content: impl Into<String>) {
        *self.content.lock().unwrap_or_else(PoisonError::into_inner) = Some(content.into());
    }

    /// Returns a copy of the rendered content, if any.
    #[must_use]
    pub fn content(&self) -> Option<String> {
        self.content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Removes the rendered content.
    pub fn clear(&self) {
        self.content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    /// Returns true if nothing is mounted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Glob patterns matched against a file name, ignoring case.
///
/// Only the final path component is matched, so `*.md` accepts both
/// `README.md` and `docs/README.md`.
#[derive(Debug, Clone, Default)]
pub struct FileMatcher {
    patterns: Vec<Pattern>,
}

impl FileMatcher {
    /// Compiles the given glob patterns.
    ///
    /// # Errors
    ///
    /// Returns an error if any pattern is not a valid glob.
    pub fn new<I, S>(patterns: I) -> PluginResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                Pattern::new(p).map_err(|e| PluginError::InvalidPattern {
                    pattern: p.to_string(),
                    reason: e.msg.to_string(),
                })
            })
            .collect::<PluginResult<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    /// Returns true if any pattern matches the file name.
    #[must_use]
    pub fn matches(&self, file_name: &str) -> bool {
        let name = Path::new(file_name)
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or(file_name);

        self.patterns
            .iter()
            .any(|p| p.matches_with(name, MATCH_OPTIONS))
    }

    /// Returns the source patterns.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Pattern::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_matcher_extension() {
        let matcher = FileMatcher::new(["*.txt", "*.log"]).unwrap();
        assert!(matcher.matches("a.txt"));
        assert!(matcher.matches("server.log"));
        assert!(!matcher.matches("a.md"));
    }

    #[test]
    fn test_matcher_ignores_case() {
        let matcher = FileMatcher::new(["*.png"]).unwrap();
        assert!(matcher.matches("Photo.PNG"));
    }

    #[test]
    fn test_matcher_uses_file_name_only() {
        let matcher = FileMatcher::new(["*.md"]).unwrap();
        assert!(matcher.matches("docs/guide/README.md"));
    }

    #[test]
    fn test_matcher_invalid_pattern() {
        let result = FileMatcher::new(["[unclosed"]);
        assert!(matches!(result, Err(PluginError::InvalidPattern { .. })));
    }

    #[test]
    fn test_matcher_empty_matches_nothing() {
        let matcher = FileMatcher::default();
        assert!(!matcher.matches("a.txt"));
    }

    #[test]
    fn test_matcher_patterns() {
        let matcher = FileMatcher::new(["*.txt"]).unwrap();
        assert_eq!(matcher.patterns().collect::<Vec<_>>(), vec!["*.txt"]);
    }

    #[test]
    fn test_container_clones_share_content() {
        let container = PreviewContainer::new("preview");
        let handle = container.clone();

        handle.set_content("<p>hi</p>");
        assert_eq!(container.content().as_deref(), Some("<p>hi</p>"));
        assert_eq!(container.id(), "preview");

        container.clear();
        assert!(handle.is_empty());
    }

    #[test]
    fn test_preview_file_from_path() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        std::fs::write(&path, "hello").unwrap();

        let file = PreviewFile::from_path(&path).unwrap();
        assert_eq!(file.name, "notes.txt");
        assert_eq!(file.size, 5);
        assert_eq!(file.path, path);
    }

    #[test]
    fn test_preview_file_from_missing_path() {
        let result = PreviewFile::from_path("/nonexistent/file.txt");
        assert!(matches!(result, Err(PluginError::Io(_))));
    }
}
