//! WASM runtime for Vista plugins.
//!
//! This crate provides the infrastructure to load WebAssembly plugin
//! components with wasmtime, recognize plugins among their exports and adapt
//! them to the [`vista_plugin::Plugin`] contract. Previewers and uploaders
//! a guest registers are adapted to the host traits as well.

pub mod discovery;
pub mod engine;
pub mod error;
pub mod plugin;
pub mod previewer;
pub mod uploader;

pub use discovery::{Candidate, CandidateSource, discover_candidates};
pub use engine::WasmEngine;
pub use error::{WasmError, WasmResult};
pub use plugin::{PluginIdentity, WasmPlugin};
pub use previewer::WasmPreviewer;
pub use uploader::WasmUploader;

pub use wasmtime;
