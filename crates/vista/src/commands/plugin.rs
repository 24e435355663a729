//! Plugin management commands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use vista_plugin_manager::{HostBridge, WindowOpener, WindowSpec};

use super::GlobalArgs;

/// Plugin management commands.
#[derive(Debug, Args)]
pub struct PluginArgs {
    #[command(subcommand)]
    pub command: PluginCommand,
}

#[derive(Debug, Subcommand)]
pub enum PluginCommand {
    /// Install a plugin archive (.zip or .eagleplugin)
    Install(InstallArgs),

    /// Remove an installed plugin
    Remove(RemoveArgs),

    /// List installed plugins
    List,

    /// Open a window plugin
    Open(OpenArgs),

    /// Resolve a plugin URL to the file it serves
    Resolve(ResolveArgs),
}

/// Arguments for the `plugin install` command.
#[derive(Debug, Args)]
pub struct InstallArgs {
    /// Path to the plugin archive
    pub archive: PathBuf,
}

/// Arguments for the `plugin remove` command.
#[derive(Debug, Args)]
pub struct RemoveArgs {
    /// Plugin id (see `vista plugin list`)
    pub id: String,
}

/// Arguments for the `plugin open` command.
#[derive(Debug, Args)]
pub struct OpenArgs {
    /// Plugin id
    pub id: String,
}

/// Arguments for the `plugin resolve` command.
#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// URL such as plugin://{id}/index.html
    pub url: String,
}

/// Prints the window a plugin would open in; the CLI has no window system.
struct PrintOpener;

impl WindowOpener for PrintOpener {
    fn open(&self, spec: &WindowSpec) -> Result<(), String> {
        println!(
            "Opening {} ({}x{}): {}",
            spec.title, spec.width, spec.height, spec.url
        );
        Ok(())
    }
}

/// Runs the plugin command.
pub fn run(global: &GlobalArgs, args: PluginArgs) -> Result<()> {
    let rt = super::runtime()?;
    rt.block_on(async { run_async(global, args).await })
}

async fn run_async(global: &GlobalArgs, args: PluginArgs) -> Result<()> {
    let bridge = HostBridge::new(Arc::new(global.open_host()?), PrintOpener);

    match args.command {
        PluginCommand::Install(args) => install(&bridge, &args).await,
        PluginCommand::Remove(args) => remove(&bridge, &args).await,
        PluginCommand::List => list(&bridge).await,
        PluginCommand::Open(args) => open(&bridge, &args).await,
        PluginCommand::Resolve(args) => resolve(&bridge, &args).await,
    }
}

async fn install(bridge: &HostBridge<PrintOpener>, args: &InstallArgs) -> Result<()> {
    println!("Installing {}...", args.archive.display());

    let response = bridge.install_plugin(&args.archive).await;

    match (response.plugin_info, response.error) {
        (Some(plugin), _) if response.success => {
            println!(
                "Installed {} v{} ({})",
                plugin.name, plugin.version, plugin.id
            );
            Ok(())
        }
        (_, error) => anyhow::bail!(
            "failed to install {}: {}",
            args.archive.display(),
            error.unwrap_or_default()
        ),
    }
}

async fn remove(bridge: &HostBridge<PrintOpener>, args: &RemoveArgs) -> Result<()> {
    let record = bridge
        .host()
        .uninstall(&args.id)
        .await
        .with_context(|| format!("failed to remove {}", args.id))?;

    println!("Removed {} ({})", record.name, record.id);

    Ok(())
}

async fn list(bridge: &HostBridge<PrintOpener>) -> Result<()> {
    let plugins = bridge
        .get_plugin_list()
        .await
        .context("failed to read installed plugins")?;

    if plugins.is_empty() {
        println!("No plugins installed.");
        return Ok(());
    }

    println!("Installed plugins:\n");

    for plugin in plugins {
        println!("  {} v{}  [{}]", plugin.name, plugin.version, plugin.kind);
        println!("    id:   {}", plugin.id);
        println!("    root: {}", plugin.entry_url.display());
    }

    Ok(())
}

async fn open(bridge: &HostBridge<PrintOpener>, args: &OpenArgs) -> Result<()> {
    bridge
        .open_plugin(&args.id)
        .await
        .with_context(|| format!("failed to open {}", args.id))?;

    Ok(())
}

async fn resolve(bridge: &HostBridge<PrintOpener>, args: &ResolveArgs) -> Result<()> {
    let path = bridge
        .host()
        .resolve_content(&args.url)
        .await
        .with_context(|| format!("failed to resolve {}", args.url))?;

    println!("{}", path.display());

    Ok(())
}
