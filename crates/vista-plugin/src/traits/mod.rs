//! Plugin traits.

pub mod previewer;
pub mod uploader;

use crate::{PluginContext, PluginResult};

/// Base trait for all plugins.
///
/// A plugin is recognized by what it can do (activate and deactivate), not by
/// where its code came from. Native plugins implement this trait directly;
/// WebAssembly plugins are adapted to it by the runtime after their exports
/// pass the structural contract check.
pub trait Plugin: Send {
    /// Returns the plugin name.
    fn name(&self) -> &str;

    /// Returns the plugin version.
    fn version(&self) -> &str;

    /// Activates the plugin.
    ///
    /// Capabilities such as previewers are registered through `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error if the plugin fails to start. The host isolates the
    /// failure to this plugin.
    fn activate(&mut self, ctx: &mut PluginContext) -> PluginResult<()>;

    /// Deactivates the plugin, releasing anything acquired in `activate`.
    ///
    /// # Errors
    ///
    /// Returns an error if the plugin fails to shut down cleanly.
    fn deactivate(&mut self) -> PluginResult<()> {
        Ok(())
    }
}
