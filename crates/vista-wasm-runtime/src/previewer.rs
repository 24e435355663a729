//! Previewers registered by WASM plugins.

use std::sync::{Arc, Mutex};

use vista_plugin::{
    Cleanup, FileMatcher, FilePreviewer, PluginError, PluginResult, PreviewContainer, PreviewFile,
};

use crate::plugin::{Runtime, lock};

/// A previewer declared by a WASM plugin through `register-previewer`.
///
/// Matching runs on the host against the declared glob patterns; rendering
/// calls back into the plugin's `mount` export.
pub struct WasmPreviewer {
    name: String,
    matcher: FileMatcher,
    runtime: Arc<Mutex<Runtime>>,
}

impl WasmPreviewer {
    pub(crate) fn new(name: String, matcher: FileMatcher, runtime: Arc<Mutex<Runtime>>) -> Self {
        Self {
            name,
            matcher,
            runtime,
        }
    }

    /// Returns the declared patterns.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.matcher.patterns()
    }
}

impl FilePreviewer for WasmPreviewer {
    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, file_name: &str) -> bool {
        self.matcher.matches(file_name)
    }

    fn mount(&self, container: &PreviewContainer, file: &PreviewFile) -> PluginResult<Cleanup> {
        let markup = lock(&self.runtime)
            .call_mount(&self.name, &file.name, &file.path.to_string_lossy())
            .map_err(|e| PluginError::ExecutionFailed(e.to_string()))?;

        container.set_content(markup);

        let container = container.clone();
        let runtime = Arc::clone(&self.runtime);
        let name = self.name.clone();
        Ok(Cleanup::new(move || {
            container.clear();
            if let Err(e) = lock(&runtime).call_unmount(&name) {
                tracing::warn!(previewer = %name, "unmount failed: {e}");
            }
        }))
    }
}
