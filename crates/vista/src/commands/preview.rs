//! Preview command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use vista_plugin::{PreviewContainer, PreviewFile};

use super::GlobalArgs;

/// Arguments for the preview command.
#[derive(Debug, Args)]
pub struct PreviewArgs {
    /// File to preview
    pub file: PathBuf,
}

/// Runs the preview command.
pub fn run(global: &GlobalArgs, args: &PreviewArgs) -> Result<()> {
    let file = PreviewFile::from_path(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;

    let host = global.open_host()?;
    let rt = super::runtime()?;

    let loaded = rt
        .block_on(host.load_installed())
        .context("failed to load installed plugins")?;
    tracing::debug!(loaded, "loaded installed plugins");

    let report = host.activate_all();
    for (id, reason) in &report.failed {
        eprintln!("warning: plugin {id} failed to activate: {reason}");
    }

    let previewer = host
        .matching_previewer(&file.name)
        .with_context(|| format!("no installed plugin can preview {}", file.name))?;

    let container = PreviewContainer::new("preview");
    let cleanup = previewer
        .mount(&container, &file)
        .with_context(|| format!("{} failed to render {}", previewer.name(), file.name))?;

    println!("{}", container.content().unwrap_or_default());
    cleanup.run();

    Ok(())
}
