//! CLI definition.

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands::{self, GlobalArgs};

/// Install, load and run file preview plugins.
#[derive(Debug, Parser)]
#[command(name = "vista")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage plugins (install, remove, list, open, resolve)
    Plugin(commands::plugin::PluginArgs),

    /// Preview a file with the matching installed plugin
    Preview(commands::preview::PreviewArgs),

    /// Upload a file with an installed uploader plugin
    Upload(commands::upload::UploadArgs),
}

impl Cli {
    /// Runs the CLI command.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Plugin(args) => commands::plugin::run(&self.global, args),
            Commands::Preview(args) => commands::preview::run(&self.global, &args),
            Commands::Upload(args) => commands::upload::run(&self.global, &args),
        }
    }
}
