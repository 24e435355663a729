//! File previewer trait.

use std::fmt;

use crate::{PluginResult, PreviewContainer, PreviewFile};

/// Tears down a mounted preview.
///
/// Returned by [`FilePreviewer::mount`]. The caller runs it once when the
/// preview surface is closed or replaced; `run` consumes the value, so it
/// cannot run twice. Dropping it without running leaves the preview mounted.
#[must_use = "a mounted preview must be cleaned up with `Cleanup::run`"]
pub struct Cleanup(Box<dyn FnOnce() + Send>);

impl Cleanup {
    /// Wraps an unmount callback.
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self(Box::new(f))
    }

    /// A cleanup that does nothing.
    pub fn noop() -> Self {
        Self::new(|| {})
    }

    /// Runs the cleanup.
    pub fn run(self) {
        (self.0)();
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cleanup").finish_non_exhaustive()
    }
}

/// A capability that claims responsibility for previewing some files.
///
/// Previewers are registered by plugins during activation and live only in
/// the host's in-memory registry.
pub trait FilePreviewer: Send + Sync {
    /// Returns the previewer name.
    fn name(&self) -> &str;

    /// Returns true if this previewer handles the given file name.
    fn accepts(&self, file_name: &str) -> bool;

    /// Renders `file` into `container`.
    ///
    /// # Errors
    ///
    /// Returns an error if the preview cannot be rendered.
    fn mount(&self, container: &PreviewContainer, file: &PreviewFile) -> PluginResult<Cleanup>;
}
