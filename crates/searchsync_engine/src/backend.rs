//! Search backend abstraction.

use crate::error::BackendResult;
use async_trait::async_trait;
use searchsync_core::{Document, RecordId};

/// A search backend holding named indexes of documents.
///
/// Every operation is idempotent with respect to the target already being in
/// the requested state. Implementations translate these calls to their wire
/// protocol; the engine never sees it.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Creates an index.
    ///
    /// Implementations may report an existing index as
    /// [`BackendError::AlreadyExists`](crate::BackendError::AlreadyExists);
    /// the engine treats that as success.
    async fn create_index(&self, index: &str) -> BackendResult<()>;

    /// Removes every document of an index. A missing index is success.
    async fn clear_index(&self, index: &str) -> BackendResult<()>;

    /// Removes one document. A missing document or index is success.
    async fn delete_document(&self, index: &str, id: &RecordId) -> BackendResult<()>;

    /// Creates or replaces one document.
    ///
    /// When `primary_key` is given and the document lacks that key, the
    /// backend stores `document[primary_key] = id`.
    async fn upsert_document(
        &self,
        index: &str,
        id: &RecordId,
        document: Document,
        primary_key: Option<&str>,
    ) -> BackendResult<()>;
}

/// Inserts the primary key into a document when it is missing.
pub fn with_primary_key(mut document: Document, id: &RecordId, primary_key: Option<&str>) -> Document {
    if let Some(key) = primary_key {
        if !document.contains_key(key) {
            document.insert(key.to_string(), id.to_value());
        }
    }
    document
}
