//! Error types for SearchSync core.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for configuration loading and validation.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for projection.
pub type ProjectionResult<T> = Result<T, ProjectionError>;

/// Errors raised while loading or validating configuration.
///
/// All of these are fatal: the extension cannot start without a valid
/// configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No configuration file could be located.
    #[error("missing configuration: {message}")]
    Missing {
        /// Where the loader looked.
        message: String,
    },

    /// A configuration file exists but could not be read.
    #[error("cannot read configuration {path:?}: {source}")]
    Io {
        /// Path of the file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The configuration is not valid JSON.
    #[error("broken config file: {0}")]
    Parse(#[from] serde_json::Error),

    /// The configuration root is not a JSON object.
    #[error("broken config file: configuration is not an object")]
    NotAnObject,

    /// A required section is absent.
    #[error("broken config file: missing \"{section}\" section")]
    MissingSection {
        /// Name of the section.
        section: &'static str,
    },

    /// `server.type` does not name a known backend.
    #[error("broken config file: missing or invalid indexer type \"{kind}\"")]
    UnknownBackend {
        /// The configured type, or `Unknown` when absent.
        kind: String,
    },

    /// The backend section is present but unusable.
    #[error("invalid server configuration: {message}")]
    InvalidServer {
        /// What is wrong with it.
        message: String,
    },

    /// An index refers to a transform that was never registered.
    #[error("index \"{index}\" uses unknown transform \"{transform}\"")]
    UnknownTransform {
        /// Index name.
        index: String,
        /// Transform name.
        transform: String,
    },

    /// An index definition is unusable.
    #[error("invalid index \"{index}\": {message}")]
    InvalidIndex {
        /// Index name.
        index: String,
        /// What is wrong with it.
        message: String,
    },

    /// `batchLimit` must be positive.
    #[error("batchLimit must be at least 1")]
    InvalidBatchLimit,
}

/// Error returned by a transform strategy.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransformError {
    /// Human-readable reason.
    pub message: String,
}

impl TransformError {
    /// Creates a transform error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors produced while projecting a record into a document.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// The configured transform failed.
    #[error("transform failed for index \"{index}\": {source}")]
    Transform {
        /// Index being projected.
        index: String,
        /// Error raised by the transform.
        #[source]
        source: TransformError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ConfigError::MissingSection { section: "server" };
        assert_eq!(
            err.to_string(),
            "broken config file: missing \"server\" section"
        );

        let err = ConfigError::UnknownBackend {
            kind: "elastic".into(),
        };
        assert!(err.to_string().contains("elastic"));

        let err = ProjectionError::Transform {
            index: "articles".into(),
            source: TransformError::new("no title"),
        };
        assert!(err.to_string().contains("articles"));
        assert!(err.to_string().contains("no title"));
    }
}
