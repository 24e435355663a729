//! Failures of the component runtime.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WasmError {
    /// The engine rejected its own configuration.
    #[error("cannot create wasm engine")]
    Engine(#[source] wasmtime::Error),

    #[error("cannot read component {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Bytes that are neither a binary nor a text component.
    #[error("cannot compile component {origin}: {reason}")]
    Compile { origin: String, reason: String },

    /// Instantiation trapped or an import could not be satisfied.
    #[error("cannot instantiate component: {0}")]
    Instantiate(String),

    /// A guest export trapped or returned malformed values.
    #[error("guest function '{export}' failed: {reason}")]
    Call { export: String, reason: String },

    #[error("component does not satisfy the plugin contract: {0}")]
    Contract(String),

    /// Host-side wasmtime failures outside guest code, such as linker setup.
    #[error(transparent)]
    Host(#[from] wasmtime::Error),
}

impl WasmError {
    /// Wraps a failed call to the guest export `export`, keeping the whole
    /// trap chain in the message.
    pub(crate) fn call(export: &str, error: &wasmtime::Error) -> Self {
        Self::Call {
            export: export.to_string(),
            reason: format!("{error:#}"),
        }
    }
}

pub type WasmResult<T> = Result<T, WasmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_keeps_trap_chain() {
        let error = wasmtime::Error::msg("unreachable").context("wasm backtrace");
        let err = WasmError::call("activate", &error);
        assert_eq!(
            err.to_string(),
            "guest function 'activate' failed: wasm backtrace: unreachable"
        );
    }
}
