//! Plugin error types.

use thiserror::Error;

/// Plugin-related errors.
#[derive(Debug, Error)]
pub enum PluginError {
    /// Plugin not found.
    #[error("plugin not found: {0}")]
    NotFound(String),

    /// Plugin activation failed.
    #[error("plugin activation failed: {0}")]
    ActivationFailed(String),

    /// Plugin execution failed.
    #[error("plugin execution failed: {0}")]
    ExecutionFailed(String),

    /// An uploader rejected a file.
    #[error("upload failed: {0}")]
    UploadFailed(String),

    /// A file pattern could not be compiled.
    #[error("invalid file pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for plugin operations.
pub type PluginResult<T> = Result<T, PluginError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_display() {
        let err = PluginError::NotFound("my-plugin".to_string());
        assert_eq!(err.to_string(), "plugin not found: my-plugin");
    }

    #[test]
    fn test_activation_failed_display() {
        let err = PluginError::ActivationFailed("trap in activate".to_string());
        assert_eq!(
            err.to_string(),
            "plugin activation failed: trap in activate"
        );
    }

    #[test]
    fn test_execution_failed_display() {
        let err = PluginError::ExecutionFailed("crash".to_string());
        assert_eq!(err.to_string(), "plugin execution failed: crash");
    }

    #[test]
    fn test_invalid_pattern_display() {
        let err = PluginError::InvalidPattern {
            pattern: "[".to_string(),
            reason: "unclosed bracket".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "invalid file pattern '[': unclosed bracket"
        );
    }

    #[test]
    fn test_io_from() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: PluginError = io.into();
        assert!(matches!(err, PluginError::Io(_)));
    }
}
