//! CLI commands.

pub mod plugin;
pub mod preview;
pub mod upload;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use vista_config::Config;
use vista_plugin_manager::{PluginHost, PluginStorage};

/// Options shared by every command.
#[derive(Debug, Clone, Args)]
pub struct GlobalArgs {
    /// Configuration file (defaults to the nearest vista.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Plugin storage directory (overrides the configuration)
    #[arg(long, global = true, env = "VISTA_STORAGE_DIR")]
    pub storage_dir: Option<PathBuf>,
}

impl GlobalArgs {
    /// Loads the configuration, applying command-line overrides.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => vista_config::load_config(path)
                .with_context(|| format!("failed to load {}", path.display()))?,
            None => {
                let cwd = std::env::current_dir().context("failed to read current directory")?;
                vista_config::load_or_default_from(cwd).context("failed to load configuration")?
            }
        };

        if let Some(dir) = &self.storage_dir {
            config.storage.dir = Some(dir.clone());
        }

        Ok(config)
    }

    /// Creates a plugin host from the configuration.
    pub fn open_host(&self) -> Result<PluginHost> {
        let config = self.load_config()?;
        let storage =
            PluginStorage::from_config(&config).context("failed to initialize plugin storage")?;

        PluginHost::new(storage, config).context("failed to create plugin host")
    }
}

/// Creates the async runtime commands run on.
pub fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Runtime::new().context("failed to create async runtime")
}
