//! Uploaders registered by WASM plugins.

use std::sync::{Arc, Mutex};

use vista_plugin::{FileUploader, PluginError, PluginResult, PreviewFile};

use crate::plugin::{Runtime, lock};

/// An uploader declared by a WASM plugin through `register-uploader`.
pub struct WasmUploader {
    name: String,
    runtime: Arc<Mutex<Runtime>>,
}

impl WasmUploader {
    pub(crate) fn new(name: String, runtime: Arc<Mutex<Runtime>>) -> Self {
        Self { name, runtime }
    }
}

impl FileUploader for WasmUploader {
    fn name(&self) -> &str {
        &self.name
    }

    fn upload(&self, file: &PreviewFile, destination: &str) -> PluginResult<()> {
        let verdict = lock(&self.runtime)
            .call_upload(
                &self.name,
                &file.name,
                &file.path.to_string_lossy(),
                destination,
            )
            .map_err(|e| PluginError::ExecutionFailed(e.to_string()))?;

        verdict.map_err(|reason| {
            tracing::debug!(uploader = %self.name, %reason, "upload rejected");
            PluginError::UploadFailed(reason)
        })
    }
}
