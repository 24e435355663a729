//! Errors raised while reading `vista.toml`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration file at {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not valid TOML", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    /// A value that deserialized but cannot be used, tagged with the
    /// `[section]` it came from.
    #[error("invalid [{section}] configuration: {reason}")]
    Invalid {
        section: &'static str,
        reason: String,
    },
}

impl ConfigError {
    pub(crate) fn invalid(section: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            section,
            reason: reason.into(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigError>;
