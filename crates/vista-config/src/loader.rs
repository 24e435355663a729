//! Locating and reading `vista.toml`.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{Config, ConfigError, ConfigResult};

pub const CONFIG_FILE_NAME: &str = "vista.toml";

/// Reads, parses and validates the configuration file at `path`.
///
/// # Errors
///
/// [`ConfigError::NotFound`] when the file does not exist, otherwise the
/// read, parse or validation failure.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Config> {
    let path = path.as_ref();
    debug!(?path, "loading configuration");

    let content = std::fs::read_to_string(path).map_err(|source| match source.kind() {
        ErrorKind::NotFound => ConfigError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ConfigError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let config: Config = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate()?;

    Ok(config)
}

/// Nearest `vista.toml` in `start_dir` or one of its ancestors.
#[must_use]
pub fn find_config(start_dir: &Path) -> Option<PathBuf> {
    start_dir
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

/// Loads the nearest `vista.toml` above `start_dir`.
///
/// # Errors
///
/// [`ConfigError::NotFound`] naming `start_dir/vista.toml` when no
/// directory up to the root has one.
pub fn find_and_load_config_from(start_dir: impl AsRef<Path>) -> ConfigResult<Config> {
    let start_dir = start_dir.as_ref();
    match find_config(start_dir) {
        Some(path) => load_config(path),
        None => Err(ConfigError::NotFound {
            path: start_dir.join(CONFIG_FILE_NAME),
        }),
    }
}

/// Like [`find_and_load_config_from`], but a missing file means defaults.
///
/// # Errors
///
/// Fails only when a file exists and cannot be used.
pub fn load_or_default_from(start_dir: impl AsRef<Path>) -> ConfigResult<Config> {
    let start_dir = start_dir.as_ref();
    if let Some(path) = find_config(start_dir) {
        return load_config(path);
    }

    debug!(?start_dir, "no configuration file, using defaults");
    Ok(Config::default())
}
