//! WASM engine setup and management.

use std::path::Path;

use wasmtime::{Config, Engine, component::Component};

use crate::{WasmError, WasmResult};

/// WASM engine for loading and executing plugin components.
///
/// Cloning is cheap; clones share the same compilation settings.
#[derive(Clone)]
pub struct WasmEngine {
    inner: Engine,
}

impl WasmEngine {
    /// Creates a new WASM engine with Component Model support.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine cannot be created.
    pub fn new() -> WasmResult<Self> {
        let mut config = Config::new();
        config.wasm_component_model(true);

        let inner = Engine::new(&config).map_err(WasmError::Engine)?;

        Ok(Self { inner })
    }

    /// Returns a reference to the inner wasmtime engine.
    #[must_use]
    pub fn inner(&self) -> &Engine {
        &self.inner
    }

    /// Loads a WASM component from a file path.
    ///
    /// The file is read and compiled on every call; nothing is cached here.
    /// Both the binary format and the text format are accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or compiled.
    pub fn load_component(&self, path: &Path) -> WasmResult<Component> {
        let bytes = std::fs::read(path).map_err(|source| WasmError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Component::new(&self.inner, &bytes).map_err(|e| WasmError::Compile {
            origin: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Loads a WASM component from bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the component cannot be compiled.
    pub fn load_component_from_bytes(&self, bytes: &[u8]) -> WasmResult<Component> {
        Component::new(&self.inner, bytes).map_err(|e| WasmError::Compile {
            origin: "<memory>".to_string(),
            reason: e.to_string(),
        })
    }
}
