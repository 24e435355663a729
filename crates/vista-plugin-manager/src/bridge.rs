//! Request surface exposed to the rendering side.
//!
//! Failures of `install_plugin` are reported inside the response rather
//! than as an error, so the caller always gets a structured answer.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::error;

use crate::protocol::{INDEX_FILE, plugin_url};
use crate::{ManifestRecord, PluginHost, PluginManagerError, PluginManagerResult};

/// Result of an install request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallResponse {
    /// Whether the install succeeded.
    pub success: bool,
    /// The installed plugin, on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plugin_info: Option<ManifestRecord>,
    /// The error message, on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InstallResponse {
    fn ok(record: ManifestRecord) -> Self {
        Self {
            success: true,
            plugin_info: Some(record),
            error: None,
        }
    }

    fn failed(error: &PluginManagerError) -> Self {
        Self {
            success: false,
            plugin_info: None,
            error: Some(error_chain(error)),
        }
    }
}

/// A window to open for a plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    /// Window title.
    pub title: String,
    /// Content URL, e.g. `plugin://eagle_X1/index.html`.
    pub url: String,
    /// Width in logical pixels.
    pub width: u32,
    /// Height in logical pixels.
    pub height: u32,
}

/// Opens host windows.
pub trait WindowOpener: Send + Sync {
    /// Opens a window.
    ///
    /// # Errors
    ///
    /// Returns an error if the window cannot be created.
    fn open(&self, spec: &WindowSpec) -> Result<(), String>;
}

/// Handles requests from the rendering side.
pub struct HostBridge<W> {
    host: Arc<PluginHost>,
    opener: W,
}

impl<W: WindowOpener> HostBridge<W> {
    /// Creates a bridge.
    pub fn new(host: Arc<PluginHost>, opener: W) -> Self {
        Self { host, opener }
    }

    /// Returns the host.
    #[must_use]
    pub fn host(&self) -> &Arc<PluginHost> {
        &self.host
    }

    /// Installs an archive, reporting failures in the response.
    pub async fn install_plugin(&self, archive: &Path) -> InstallResponse {
        match self.host.install(archive).await {
            Ok(record) => InstallResponse::ok(record),
            Err(e) => {
                error!(archive = %archive.display(), "install failed: {e}");
                InstallResponse::failed(&e)
            }
        }
    }

    /// Lists installed plugins.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest store cannot be read.
    pub async fn get_plugin_list(&self) -> PluginManagerResult<Vec<ManifestRecord>> {
        self.host.list().await
    }

    /// Opens a window showing a plugin's `index.html`.
    ///
    /// # Errors
    ///
    /// Returns [`PluginManagerError::PluginNotFound`] if the plugin is not
    /// installed and [`PluginManagerError::Window`] if the window cannot be
    /// opened.
    pub async fn open_plugin(&self, id: &str) -> PluginManagerResult<WindowSpec> {
        let record = self.host.get(id).await?;
        let config = self.host.config();

        let spec = WindowSpec {
            title: record.name,
            url: plugin_url(&config.protocol.scheme, &record.id, INDEX_FILE),
            width: config.window.width,
            height: config.window.height,
        };

        self.opener
            .open(&spec)
            .map_err(|reason| PluginManagerError::Window {
                id: id.to_string(),
                reason,
            })?;

        Ok(spec)
    }
}

fn error_chain(error: &PluginManagerError) -> String {
    let mut message = error.to_string();
    let mut source = std::error::Error::source(error);
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
