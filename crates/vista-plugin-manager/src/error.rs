//! Error types for the plugin manager.

use std::path::PathBuf;

use crate::registry::PluginState;

/// Result type for plugin manager operations.
pub type PluginManagerResult<T> = Result<T, PluginManagerError>;

/// Plugin manager error types.
#[derive(Debug, thiserror::Error)]
pub enum PluginManagerError {
    /// Failed to create storage directory.
    #[error("failed to create storage directory: {path}")]
    StorageCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive or file is missing or unreadable.
    #[error("not found: {path}")]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Archive is not a plugin package, or its manifest is missing or unparsable.
    #[error("invalid plugin package {path}: {reason}")]
    InvalidPackage { path: PathBuf, reason: String },

    /// The resolved entry file does not exist.
    #[error("entry file not found: {path}")]
    EntryNotFound { path: PathBuf },

    /// Failed to compile or instantiate a WASM plugin.
    #[error("failed to load WASM plugin from {path}")]
    WasmLoad {
        path: PathBuf,
        #[source]
        source: vista_wasm_runtime::WasmError,
    },

    /// A plugin's `activate` failed.
    #[error("plugin {id} failed to activate")]
    ActivationFailure {
        id: String,
        #[source]
        source: vista_plugin::PluginError,
    },

    /// Plugin is already active.
    #[error("plugin already active: {id}")]
    AlreadyActive { id: String },

    /// Plugin cannot move to the requested state.
    #[error("plugin {id} cannot be activated from state {state:?}")]
    InvalidState { id: String, state: PluginState },

    /// Two plugins with different names map to the same id.
    #[error("plugin id {id} is already used by '{existing}', cannot install '{name}'")]
    IdConflict {
        id: String,
        existing: String,
        name: String,
    },

    /// Plugin not found in the registry or manifest store.
    #[error("plugin not found: {id}")]
    PluginNotFound { id: String },

    /// Failed to read or write the manifest store.
    #[error("failed to persist manifest store at {path}")]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Content request does not name a file inside a plugin.
    #[error("invalid content request '{request}': {reason}")]
    InvalidRequest { request: String, reason: String },

    /// Host window could not be opened.
    #[error("failed to open window for {id}: {reason}")]
    Window { id: String, reason: String },

    /// A blocking task panicked or was cancelled.
    #[error("background task failed")]
    Task(#[from] tokio::task::JoinError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PluginManagerError::InvalidPackage {
            path: PathBuf::from("/tmp/a.zip"),
            reason: "missing package.json".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid plugin package /tmp/a.zip: missing package.json"
        );

        let err = PluginManagerError::AlreadyActive {
            id: "plugin_md".to_string(),
        };
        assert_eq!(err.to_string(), "plugin already active: plugin_md");

        let err = PluginManagerError::IdConflict {
            id: "plugin_my-plugin".to_string(),
            existing: "My Plugin".to_string(),
            name: "my-plugin".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "plugin id plugin_my-plugin is already used by 'My Plugin', cannot install 'my-plugin'"
        );
    }

    #[test]
    fn test_activation_failure_keeps_source() {
        use std::error::Error as _;

        let err = PluginManagerError::ActivationFailure {
            id: "plugin_md".to_string(),
            source: vista_plugin::PluginError::ActivationFailed("boom".to_string()),
        };
        assert!(err.source().is_some());
    }
}
