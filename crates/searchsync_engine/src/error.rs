//! Error types for the sync engine.

use searchsync_core::ProjectionError;
use serde_json::Value;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Result type for search backend operations.
pub type BackendResult<T> = Result<T, BackendError>;

/// Result type for record source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Errors reported by a search backend.
#[derive(Error, Debug, Clone)]
pub enum BackendError {
    /// The index or document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The index already exists.
    #[error("index already exists: {0}")]
    AlreadyExists(String),

    /// The backend answered with an error status.
    #[error("backend returned status {status}")]
    Api {
        /// HTTP-like status code.
        status: u16,
        /// Decoded error body, if any.
        body: Option<Value>,
    },

    /// The request never reached the backend.
    #[error("transport error: {0}")]
    Transport(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Returns a human-readable message for logs.
    ///
    /// Prefers an explicit `message` field of the error body, then a nested
    /// `error` field, then the error's display form.
    pub fn message(&self) -> String {
        if let BackendError::Api {
            body: Some(body), ..
        } = self
        {
            if let Some(message) = body.get("message").and_then(Value::as_str) {
                return message.to_string();
            }
            match body.get("error") {
                Some(Value::String(error)) => return error.clone(),
                Some(Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
        self.to_string()
    }

    /// Returns true if the error means the target is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            BackendError::NotFound(_) | BackendError::Api { status: 404, .. }
        )
    }
}

/// Errors reported by a record source.
#[derive(Error, Debug, Clone)]
pub enum SourceError {
    /// The collection does not exist.
    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    /// The query could not be executed.
    #[error("query on \"{collection}\" failed: {message}")]
    Query {
        /// Collection queried.
        collection: String,
        /// Reason.
        message: String,
    },

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Errors that can occur during sync operations.
#[derive(Error, Debug)]
pub enum SyncError {
    /// The index name is not in the registry.
    #[error("unknown index \"{0}\"")]
    UnknownIndex(String),

    /// Reading from the record source failed.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Writing to the search backend failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// A record could not be projected.
    #[error("projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// A fetched record carries no usable primary key.
    #[error("record has no usable primary key \"{field}\"")]
    MissingPrimaryKey {
        /// Primary-key field name.
        field: String,
    },

    /// The operation was cancelled.
    #[error("sync cancelled")]
    Cancelled,
}

/// Normalizes any sync error into a log message.
///
/// Backend errors go through [`BackendError::message`], everything else
/// uses its display form.
pub fn error_message(error: &SyncError) -> String {
    match error {
        SyncError::Backend(backend) => backend.message(),
        other => other.to_string(),
    }
}
