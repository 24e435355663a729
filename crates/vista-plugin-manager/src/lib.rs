//! Plugin manager for Vista.
//!
//! This crate handles:
//! - Local plugin storage and the `plugins.json` manifest store
//! - Extracting plugin archives into their root directories
//! - Loading plugin entries through the WASM runtime
//! - The registry driving activation and previewer matching
//! - Stylesheet injection, the content protocol and the host bridge

pub mod bridge;
pub mod error;
pub mod host;
pub mod installer;
pub mod loader;
pub mod manifest;
pub mod manifest_store;
pub mod materializer;
pub mod protocol;
pub mod registry;
pub mod storage;
pub mod styles;

pub use bridge::{HostBridge, InstallResponse, WindowOpener, WindowSpec};
pub use error::{PluginManagerError, PluginManagerResult};
pub use host::{PluginHost, SharedSurface};
pub use installer::InstallLocks;
pub use loader::{LoadedPlugin, ModuleCache, ModuleHandle, PluginLoader};
pub use manifest::{PackageManifest, PluginKind};
pub use manifest_store::{ManifestRecord, ManifestStore};
pub use materializer::{MaterializedPackage, Materializer};
pub use protocol::ContentRequest;
pub use registry::{ActivationReport, PluginRegistry, PluginState, RegisteredPlugin};
pub use storage::PluginStorage;
pub use styles::{Document, RenderSurface, StyleBlock, inject_styles};
