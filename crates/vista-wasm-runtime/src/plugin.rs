//! WASM plugin wrapper.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use wasmtime::component::{
    Component, ComponentExportIndex, ComponentNamedList, Instance, Lift, Linker, Lower, TypedFunc,
};
use wasmtime::{Store, StoreContextMut};

use vista_plugin::{FileMatcher, Plugin, PluginContext, PluginError, PluginResult};

use crate::discovery::{ACTIVATE, Candidate, DEACTIVATE};
use crate::{WasmEngine, WasmError, WasmPreviewer, WasmResult, WasmUploader};

/// Host function a plugin calls from `activate` to register a previewer.
pub const REGISTER_PREVIEWER: &str = "register-previewer";

/// Host function a plugin calls from `activate` to register an uploader.
pub const REGISTER_UPLOADER: &str = "register-uploader";

/// Name and version used when the component does not report its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginIdentity {
    pub name: String,
    pub version: String,
}

impl PluginIdentity {
    /// Creates an identity.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// A previewer registration received during `activate`, patterns already
/// compiled.
#[derive(Debug)]
struct PendingPreviewer {
    name: String,
    matcher: FileMatcher,
}

/// Store state for plugin instances.
#[derive(Debug, Default)]
pub struct PluginState {
    previewers: Vec<PendingPreviewer>,
    uploaders: Vec<String>,
}

impl PluginState {
    fn clear(&mut self) {
        self.previewers.clear();
        self.uploaders.clear();
    }
}

type MountFunc = TypedFunc<(String, String, String), (String,)>;
type UnmountFunc = TypedFunc<(String,), ()>;
type UploadFunc = TypedFunc<(String, String, String, String), (Result<(), String>,)>;

/// One instantiated candidate: its store and resolved exports.
pub(crate) struct Runtime {
    store: Store<PluginState>,
    activate: TypedFunc<(), ()>,
    deactivate: Option<TypedFunc<(), ()>>,
    mount: Option<MountFunc>,
    unmount: Option<UnmountFunc>,
    upload: Option<UploadFunc>,
}

impl Runtime {
    fn call_unit(&mut self, name: &str, func: TypedFunc<(), ()>) -> WasmResult<()> {
        func.call(&mut self.store, ())
            .and_then(|()| func.post_return(&mut self.store))
            .map_err(|e| WasmError::call(name, &e))
    }

    pub(crate) fn call_mount(
        &mut self,
        previewer: &str,
        file_name: &str,
        file_path: &str,
    ) -> WasmResult<String> {
        let func = self.mount.ok_or_else(|| {
            WasmError::Contract("previewer registered without a mount export".to_string())
        })?;

        let args = (
            previewer.to_string(),
            file_name.to_string(),
            file_path.to_string(),
        );
        func.call(&mut self.store, args)
            .and_then(|(markup,)| {
                func.post_return(&mut self.store)?;
                Ok(markup)
            })
            .map_err(|e| WasmError::call("mount", &e))
    }

    /// Calls the guest's `upload`. The outer result is a failed call, the
    /// inner one the guest's own verdict.
    pub(crate) fn call_upload(
        &mut self,
        uploader: &str,
        file_name: &str,
        file_path: &str,
        destination: &str,
    ) -> WasmResult<Result<(), String>> {
        let func = self.upload.ok_or_else(|| {
            WasmError::Contract("uploader registered without an upload export".to_string())
        })?;

        let args = (
            uploader.to_string(),
            file_name.to_string(),
            file_path.to_string(),
            destination.to_string(),
        );
        func.call(&mut self.store, args)
            .and_then(|(verdict,)| {
                func.post_return(&mut self.store)?;
                Ok(verdict)
            })
            .map_err(|e| WasmError::call("upload", &e))
    }

    pub(crate) fn call_unmount(&mut self, previewer: &str) -> WasmResult<()> {
        let Some(func) = self.unmount else {
            return Ok(());
        };

        func.call(&mut self.store, (previewer.to_string(),))
            .and_then(|()| func.post_return(&mut self.store))
            .map_err(|e| WasmError::call("unmount", &e))
    }
}

pub(crate) fn lock(runtime: &Mutex<Runtime>) -> MutexGuard<'_, Runtime> {
    runtime.lock().unwrap_or_else(PoisonError::into_inner)
}

/// A plugin backed by one instance of a WASM component.
///
/// Each candidate of a component gets its own store and instance, so two
/// plugins exported by the same package never share guest state.
pub struct WasmPlugin {
    name: String,
    version: String,
    export: Option<String>,
    runtime: Arc<Mutex<Runtime>>,
}

impl WasmPlugin {
    /// Instantiates `component` for the given candidate.
    ///
    /// `fallback` supplies the name and version when the candidate does not
    /// export `name`/`version` functions.
    ///
    /// # Errors
    ///
    /// Returns an error if instantiation traps or the candidate's exports do
    /// not have the expected signatures.
    pub fn instantiate(
        engine: &WasmEngine,
        component: &Component,
        candidate: &Candidate,
        fallback: &PluginIdentity,
    ) -> WasmResult<Self> {
        let mut store = Store::new(engine.inner(), PluginState::default());
        let linker = host_linker(engine)?;

        let instance = linker
            .instantiate(&mut store, component)
            .map_err(|e| WasmError::Instantiate(format!("{e:#}")))?;

        let scope = match candidate.export_name() {
            Some(name) => Some(component.get_export_index(None, name).ok_or_else(|| {
                WasmError::Contract(format!("export '{name}' disappeared"))
            })?),
            None => None,
        };
        let exports = Exports {
            component,
            instance: &instance,
            scope: scope.as_ref(),
        };

        let activate = exports
            .typed::<(), ()>(&mut store, ACTIVATE)?
            .ok_or_else(|| WasmError::Contract(format!("missing '{ACTIVATE}'")))?;
        let deactivate = exports.typed::<(), ()>(&mut store, DEACTIVATE)?;
        let mount = exports.typed(&mut store, "mount")?;
        let unmount = exports.typed(&mut store, "unmount")?;
        let upload = exports.typed(&mut store, "upload")?;

        let name = exports
            .call_string(&mut store, "name")?
            .unwrap_or_else(|| match candidate.export_name() {
                Some(export) => format!("{}#{export}", fallback.name),
                None => fallback.name.clone(),
            });
        let version = exports
            .call_string(&mut store, "version")?
            .unwrap_or_else(|| fallback.version.clone());

        tracing::debug!(%name, %version, export = ?candidate.export_name(), "instantiated plugin");

        Ok(Self {
            name,
            version,
            export: candidate.export_name().map(str::to_string),
            runtime: Arc::new(Mutex::new(Runtime {
                store,
                activate,
                deactivate,
                mount,
                unmount,
                upload,
            })),
        })
    }

    /// Returns the instance export this plugin was found in, if any.
    #[must_use]
    pub fn export(&self) -> Option<&str> {
        self.export.as_deref()
    }
}

impl Plugin for WasmPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        &self.version
    }

    fn activate(&mut self, ctx: &mut PluginContext) -> PluginResult<()> {
        let pending = {
            let mut runtime = lock(&self.runtime);
            runtime.store.data_mut().clear();

            let activate = runtime.activate;
            runtime
                .call_unit(ACTIVATE, activate)
                .map_err(|e| PluginError::ActivationFailed(e.to_string()))?;

            std::mem::take(runtime.store.data_mut())
        };

        for PendingPreviewer { name, matcher } in pending.previewers {
            ctx.register_previewer(Arc::new(WasmPreviewer::new(
                name,
                matcher,
                Arc::clone(&self.runtime),
            )));
        }
        for name in pending.uploaders {
            ctx.register_uploader(Arc::new(WasmUploader::new(name, Arc::clone(&self.runtime))));
        }

        Ok(())
    }

    fn deactivate(&mut self) -> PluginResult<()> {
        let mut runtime = lock(&self.runtime);
        match runtime.deactivate {
            Some(deactivate) => runtime
                .call_unit(DEACTIVATE, deactivate)
                .map_err(|e| PluginError::ExecutionFailed(e.to_string())),
            None => Ok(()),
        }
    }
}

/// Builds a linker providing the host functions plugins may import.
///
/// A previewer with an invalid glob traps the guest's `activate`.
fn host_linker(engine: &WasmEngine) -> WasmResult<Linker<PluginState>> {
    let mut linker = Linker::new(engine.inner());

    {
        let mut root = linker.root();

        root.func_wrap(
            REGISTER_PREVIEWER,
            |mut store: StoreContextMut<'_, PluginState>,
             (name, patterns): (String, Vec<String>)| {
                let matcher = FileMatcher::new(&patterns)
                    .map_err(|e| wasmtime::Error::msg(format!("previewer '{name}': {e}")))?;
                store
                    .data_mut()
                    .previewers
                    .push(PendingPreviewer { name, matcher });
                Ok(())
            },
        )?;

        root.func_wrap(
            REGISTER_UPLOADER,
            |mut store: StoreContextMut<'_, PluginState>, (name,): (String,)| {
                store.data_mut().uploaders.push(name);
                Ok(())
            },
        )?;
    }

    Ok(linker)
}

/// Export lookup scoped to a candidate.
struct Exports<'a> {
    component: &'a Component,
    instance: &'a Instance,
    scope: Option<&'a ComponentExportIndex>,
}

impl Exports<'_> {
    fn index(&self, name: &str) -> Option<ComponentExportIndex> {
        self.component.get_export_index(self.scope, name)
    }

    /// Resolves an optional typed export. A present export with the wrong
    /// signature is an error rather than silently ignored.
    fn typed<P, R>(
        &self,
        store: &mut Store<PluginState>,
        name: &str,
    ) -> WasmResult<Option<TypedFunc<P, R>>>
    where
        P: ComponentNamedList + Lower + 'static,
        R: ComponentNamedList + Lift + 'static,
    {
        let Some(index) = self.index(name) else {
            return Ok(None);
        };

        self.instance
            .get_typed_func::<P, R>(&mut *store, index)
            .map(Some)
            .map_err(|e| WasmError::Contract(format!("export '{name}': {e:#}")))
    }

    fn call_string(
        &self,
        store: &mut Store<PluginState>,
        name: &str,
    ) -> WasmResult<Option<String>> {
        let Some(func) = self.typed::<(), (String,)>(store, name)? else {
            return Ok(None);
        };

        let (value,) = func
            .call(&mut *store, ())
            .map_err(|e| WasmError::call(name, &e))?;
        func.post_return(&mut *store)?;

        Ok(Some(value))
    }
}
