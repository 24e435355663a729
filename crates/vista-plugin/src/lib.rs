//! Plugin contract for Vista.
//!
//! This crate provides the types every plugin and the host agree on:
//! - [`Plugin`]: Base trait for all plugins (name, version, activate, deactivate)
//! - [`FilePreviewer`]: A capability that renders previews for matching files
//! - [`FileUploader`]: A capability that uploads files to a destination
//! - [`PluginContext`]: Side channel handed to [`Plugin::activate`]
//! - [`PreviewContainer`] and [`PreviewFile`]: What a previewer mounts into and renders

mod context;
mod error;
mod preview;
mod traits;

pub use context::{PluginContext, Registrations};
pub use error::{PluginError, PluginResult};
pub use preview::{FileMatcher, PreviewContainer, PreviewFile};
pub use traits::Plugin;
pub use traits::previewer::{Cleanup, FilePreviewer};
pub use traits::uploader::FileUploader;
