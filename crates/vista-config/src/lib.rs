//! Configuration management for Vista.
//!
//! This crate handles loading and validating the `vista.toml` configuration file.

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    CONFIG_FILE_NAME, find_and_load_config_from, find_config, load_config, load_or_default_from,
};
pub use schema::{Config, LoaderConfig, ProtocolConfig, StorageConfig, WindowConfig};
