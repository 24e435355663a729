//! Stylesheet injection into the rendering surface.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::protocol::resolve_within;

/// A stylesheet inserted on behalf of a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleBlock {
    /// Root path of the plugin the stylesheet came from.
    pub origin: PathBuf,
    /// Stylesheet text.
    pub css: String,
}

/// Where plugin stylesheets end up.
pub trait RenderSurface: Send {
    /// Appends a style block.
    fn append_style(&mut self, block: StyleBlock);

    /// Drops every style block from `origin`, returning how many were removed.
    fn remove_origin(&mut self, origin: &Path) -> usize;
}

/// In-memory rendering surface.
#[derive(Debug, Default)]
pub struct Document {
    styles: Vec<StyleBlock>,
}

impl Document {
    /// Creates an empty document.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the style blocks in insertion order.
    #[must_use]
    pub fn styles(&self) -> &[StyleBlock] {
        &self.styles
    }
}

impl RenderSurface for Document {
    fn append_style(&mut self, block: StyleBlock) {
        self.styles.push(block);
    }

    fn remove_origin(&mut self, origin: &Path) -> usize {
        let before = self.styles.len();
        self.styles.retain(|block| block.origin != origin);
        before - self.styles.len()
    }
}

/// Injects stylesheets found below `root` into `surface`.
///
/// Missing or unreadable files are skipped. Nothing is deduplicated, so
/// injecting the same plugin twice yields two blocks per stylesheet.
/// Returns the number of blocks appended.
pub fn inject_styles(surface: &mut dyn RenderSurface, root: &Path, styles: &[String]) -> usize {
    let mut injected = 0;

    for style in styles {
        let Some(path) = resolve_within(root, Path::new(style)) else {
            debug!(style = %style, "stylesheet escapes plugin root, skipping");
            continue;
        };

        match std::fs::read_to_string(&path) {
            Ok(css) => {
                surface.append_style(StyleBlock {
                    origin: root.to_path_buf(),
                    css,
                });
                injected += 1;
            }
            Err(e) => debug!(path = %path.display(), "skipping stylesheet: {e}"),
        }
    }

    injected
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_inject_existing_styles() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.css"), "a {}").unwrap();
        std::fs::write(temp.path().join("b.css"), "b {}").unwrap();

        let mut doc = Document::new();
        let count = inject_styles(
            &mut doc,
            temp.path(),
            &["a.css".to_string(), "missing.css".to_string(), "b.css".to_string()],
        );

        assert_eq!(count, 2);
        assert_eq!(doc.styles()[0].css, "a {}");
        assert_eq!(doc.styles()[1].css, "b {}");
        assert!(doc.styles().iter().all(|s| s.origin == temp.path()));
    }

    #[test]
    fn test_inject_twice_accumulates() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.css"), "a {}").unwrap();
        let styles = vec!["a.css".to_string()];

        let mut doc = Document::new();
        inject_styles(&mut doc, temp.path(), &styles);
        inject_styles(&mut doc, temp.path(), &styles);

        assert_eq!(doc.styles().len(), 2);
    }

    #[test]
    fn test_inject_skips_escaping_paths() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("root");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(temp.path().join("secret.css"), "secret").unwrap();

        let mut doc = Document::new();
        let count = inject_styles(&mut doc, &root, &["../secret.css".to_string()]);

        assert_eq!(count, 0);
        assert!(doc.styles().is_empty());
    }

    #[test]
    fn test_remove_origin() {
        let mut doc = Document::new();
        for origin in ["/p/a", "/p/b", "/p/a"] {
            doc.append_style(StyleBlock {
                origin: PathBuf::from(origin),
                css: String::new(),
            });
        }

        assert_eq!(doc.remove_origin(Path::new("/p/a")), 2);
        assert_eq!(doc.styles().len(), 1);
        assert_eq!(doc.remove_origin(Path::new("/p/a")), 0);
    }
}
