//! Configuration schema.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, ConfigResult};

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Where plugins and `plugins.json` live.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Entry point and stylesheet conventions.
    #[serde(default)]
    pub loader: LoaderConfig,

    /// Custom URL scheme serving plugin files.
    #[serde(default)]
    pub protocol: ProtocolConfig,

    /// Windows opened for legacy plugins.
    #[serde(default)]
    pub window: WindowConfig,
}

impl Config {
    /// Checks values that deserialize fine but cannot work.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.loader.default_entry.trim().is_empty() {
            return Err(ConfigError::invalid("loader", "default_entry must not be empty"));
        }

        let scheme = &self.protocol.scheme;
        if scheme.is_empty()
            || !scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(ConfigError::invalid(
                "protocol",
                format!("{scheme:?} is not a valid URL scheme"),
            ));
        }

        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::invalid("window", "width and height must be positive"));
        }

        Ok(())
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory. Defaults to `~/.vista`; a leading `~/` is expanded.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Returns the configured directory with `~/` expanded.
    #[must_use]
    pub fn resolved_dir(&self) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;
        match dir.strip_prefix("~") {
            Ok(rest) => dirs::home_dir().map(|home| home.join(rest)),
            Err(_) => Some(dir.clone()),
        }
    }
}

/// Loader configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderConfig {
    /// Entry file used when a package manifest declares none.
    #[serde(default = "default_entry")]
    pub default_entry: String,

    /// Extension appended when the declared entry does not exist as written.
    #[serde(default = "default_entry_extension")]
    pub entry_extension: String,

    /// Stylesheet picked up when a package manifest declares none.
    #[serde(default = "default_stylesheet")]
    pub default_stylesheet: String,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            default_entry: default_entry(),
            entry_extension: default_entry_extension(),
            default_stylesheet: default_stylesheet(),
        }
    }
}

fn default_entry() -> String {
    "index.wasm".to_string()
}

fn default_entry_extension() -> String {
    "wasm".to_string()
}

fn default_stylesheet() -> String {
    "index.css".to_string()
}

/// Protocol configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// URL scheme, as in `plugin://{id}/index.html`.
    #[serde(default = "default_scheme")]
    pub scheme: String,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            scheme: default_scheme(),
        }
    }
}

fn default_scheme() -> String {
    "plugin".to_string()
}

/// Window configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Width in logical pixels.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Height in logical pixels.
    #[serde(default = "default_height")]
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}
