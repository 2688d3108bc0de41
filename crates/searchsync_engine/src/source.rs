//! Record source abstraction.

use crate::error::SourceResult;
use async_trait::async_trait;
use searchsync_core::{Record, RecordId};
use serde_json::Value;

/// Primary-key field used when a collection reports none.
pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Schema facts the engine needs about a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSchema {
    /// Whether the collection exists.
    pub exists: bool,
    /// Primary-key field name.
    pub primary_key: String,
}

impl CollectionSchema {
    /// Schema of an existing collection.
    pub fn new(primary_key: impl Into<String>) -> Self {
        Self {
            exists: true,
            primary_key: primary_key.into(),
        }
    }

    /// Schema of a collection that does not exist.
    pub fn missing() -> Self {
        Self {
            exists: false,
            primary_key: DEFAULT_PRIMARY_KEY.to_string(),
        }
    }
}

/// One page request of a key scan.
#[derive(Debug, Clone, Copy)]
pub struct KeyQuery<'a> {
    /// Index filter, passed through untouched.
    pub filter: Option<&'a Value>,
    /// Index deep options, passed through untouched.
    pub deep: Option<&'a Value>,
    /// Maximum number of keys.
    pub limit: usize,
    /// Number of matching keys to skip.
    pub offset: usize,
}

/// The system of record the indexes are built from.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Looks up a collection's schema.
    async fn schema(&self, collection: &str) -> SourceResult<CollectionSchema>;

    /// Returns one page of primary keys matching the query, in a stable order.
    ///
    /// An empty page ends the scan.
    async fn read_keys(&self, collection: &str, query: &KeyQuery<'_>) -> SourceResult<Vec<RecordId>>;

    /// Fetches full records by id.
    ///
    /// Ids that do not exist or do not match `filter` are absent from the
    /// result. `fields` restricts the returned fields; `None` means all.
    async fn read_records(
        &self,
        collection: &str,
        ids: &[RecordId],
        fields: Option<&[String]>,
        filter: Option<&Value>,
    ) -> SourceResult<Vec<Record>>;
}
