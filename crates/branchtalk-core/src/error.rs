//! Core error types for Branchtalk.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading configuration.
///
/// Tree building and navigation never fail; anomalies are reported through
/// [`crate::tree::BuildReport`] instead.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// IO error
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Value out of range
    #[error("Invalid config value for {field}: {message}")]
    Invalid { field: &'static str, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ConfigError::Invalid {
            field: "max_sessions",
            message: "must be at least 1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("max_sessions"));
        assert!(msg.contains("at least 1"));
    }

    #[test]
    fn test_io_error_display_includes_path() {
        let err = ConfigError::Io {
            path: PathBuf::from("/etc/branchtalk.yaml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        };
        assert!(err.to_string().contains("/etc/branchtalk.yaml"));
    }
}
