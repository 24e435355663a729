//! Upload command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use vista_plugin::PreviewFile;

use super::GlobalArgs;

/// Arguments for the upload command.
#[derive(Debug, Args)]
pub struct UploadArgs {
    /// File to upload
    pub file: PathBuf,

    /// Where the uploader should put the file
    pub destination: String,

    /// Uploader to use (defaults to the most recently registered one)
    #[arg(short, long)]
    pub uploader: Option<String>,
}

/// Runs the upload command.
pub fn run(global: &GlobalArgs, args: &UploadArgs) -> Result<()> {
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

    let uploader = host
        .uploader(args.uploader.as_deref())
        .with_context(|| match &args.uploader {
            Some(name) => format!("no installed plugin provides uploader '{name}'"),
            None => "no installed plugin can upload".to_string(),
        })?;

    uploader
        .upload(&file, &args.destination)
        .with_context(|| format!("{} failed to upload {}", uploader.name(), file.name))?;

    println!(
        "Uploaded {} to {} with {}",
        file.name,
        args.destination,
        uploader.name()
    );

    Ok(())
}
