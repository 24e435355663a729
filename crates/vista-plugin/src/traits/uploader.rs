//! File uploader trait.

use crate::{PluginResult, PreviewFile};

/// A capability that sends files to a destination it understands, such as a
/// bucket name or a remote folder.
///
/// Uploaders are registered by plugins during activation, like previewers.
/// The host picks one by name, or the most recently registered one.
pub trait FileUploader: Send + Sync {
    /// Returns the uploader name.
    fn name(&self) -> &str;

    /// Uploads `file` to `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PluginError::UploadFailed`] if the upload is rejected.
    fn upload(&self, file: &PreviewFile, destination: &str) -> PluginResult<()>;
}
