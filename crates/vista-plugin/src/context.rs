//! Activation context passed to plugins.

use std::fmt;
use std::sync::Arc;

use crate::{FilePreviewer, FileUploader};

/// Capabilities handed to [`crate::Plugin::activate`].
///
/// The context only collects what the plugin registers. The host commits the
/// collected capabilities to its registry once `activate` returns normally,
/// so a plugin that fails halfway leaves nothing behind.
pub struct PluginContext {
    plugin: String,
    previewers: Vec<Arc<dyn FilePreviewer>>,
    uploaders: Vec<Arc<dyn FileUploader>>,
}

/// Everything a plugin registered during one activation.
#[derive(Default)]
pub struct Registrations {
    /// Previewers, in registration order.
    pub previewers: Vec<Arc<dyn FilePreviewer>>,
    /// Uploaders, in registration order.
    pub uploaders: Vec<Arc<dyn FileUploader>>,
}

impl PluginContext {
    /// Creates a context for the plugin with the given id.
    #[must_use]
    pub fn new(plugin: impl Into<String>) -> Self {
        Self {
            plugin: plugin.into(),
            previewers: Vec::new(),
            uploaders: Vec::new(),
        }
    }

    /// Returns the id of the plugin being activated.
    #[must_use]
    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    /// Registers a file previewer.
    pub fn register_previewer(&mut self, previewer: Arc<dyn FilePreviewer>) {
        tracing::debug!(
            plugin = %self.plugin,
            previewer = previewer.name(),
            "registering previewer"
        );
        self.previewers.push(previewer);
    }

    /// Returns the previewers registered so far, in registration order.
    #[must_use]
    pub fn previewers(&self) -> &[Arc<dyn FilePreviewer>] {
        &self.previewers
    }

    /// Registers a file uploader.
    pub fn register_uploader(&mut self, uploader: Arc<dyn FileUploader>) {
        tracing::debug!(
            plugin = %self.plugin,
            uploader = uploader.name(),
            "registering uploader"
        );
        self.uploaders.push(uploader);
    }

    /// Returns the uploaders registered so far, in registration order.
    #[must_use]
    pub fn uploaders(&self) -> &[Arc<dyn FileUploader>] {
        &self.uploaders
    }

    /// Consumes the context, returning everything registered.
    #[must_use]
    pub fn into_registrations(self) -> Registrations {
        Registrations {
            previewers: self.previewers,
            uploaders: self.uploaders,
        }
    }
}

impl fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginContext")
            .field("plugin", &self.plugin)
            .field(
                "previewers",
                &self.previewers.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .field(
                "uploaders",
                &self.uploaders.iter().map(|u| u.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
