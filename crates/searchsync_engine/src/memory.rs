//! In-process backend and record source.
//!
//! Both keep a log of every call they receive so tests can assert on call
//! order and page sizes, and both support failure injection.
//! `MemoryRecordSource` can also be loaded from a JSON snapshot, which the
//! CLI uses for offline runs.

use crate::backend::{with_primary_key, SearchBackend};
use crate::error::{BackendError, BackendResult, SourceError, SourceResult};
use crate::filter::matches_filter;
use crate::source::{CollectionSchema, KeyQuery, RecordSource, DEFAULT_PRIMARY_KEY};
use async_trait::async_trait;
use parking_lot::RwLock;
use searchsync_core::{Document, Record, RecordId};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

/// A call received by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// `create_index`.
    CreateIndex(String),
    /// `clear_index`.
    ClearIndex(String),
    /// `delete_document`.
    DeleteDocument {
        /// Index name.
        index: String,
        /// Document id.
        id: String,
    },
    /// `upsert_document`.
    UpsertDocument {
        /// Index name.
        index: String,
        /// Document id.
        id: String,
    },
}

/// A search backend holding indexes in memory.
///
/// Upserting into a missing index creates it, like most search engines do.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    indexes: RwLock<BTreeMap<String, BTreeMap<String, Document>>>,
    calls: RwLock<Vec<BackendCall>>,
    failing_upserts: RwLock<HashSet<String>>,
    failing_deletes: RwLock<HashSet<String>>,
    create_failure: RwLock<Option<(u16, String)>>,
}

impl MemoryBackend {
    /// Creates an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every `create_index` fail with the given status and message.
    pub fn fail_create_index(&self, status: u16, message: impl Into<String>) {
        *self.create_failure.write() = Some((status, message.into()));
    }

    /// Makes upserts of this document id fail.
    pub fn fail_upsert_for(&self, id: impl Into<String>) {
        self.failing_upserts.write().insert(id.into());
    }

    /// Makes deletes of this document id fail.
    pub fn fail_delete_for(&self, id: impl Into<String>) {
        self.failing_deletes.write().insert(id.into());
    }

    /// Stores a document directly, bypassing the call log.
    pub fn insert_document(&self, index: &str, id: impl Into<String>, document: Document) {
        self.indexes
            .write()
            .entry(index.to_string())
            .or_default()
            .insert(id.into(), document);
    }

    /// Gets one document.
    pub fn document(&self, index: &str, id: &str) -> Option<Document> {
        self.indexes.read().get(index)?.get(id).cloned()
    }

    /// All documents of an index, ordered by id.
    pub fn documents(&self, index: &str) -> Vec<Document> {
        self.indexes
            .read()
            .get(index)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of documents in an index.
    pub fn document_count(&self, index: &str) -> usize {
        self.indexes.read().get(index).map_or(0, BTreeMap::len)
    }

    /// Names of existing indexes, sorted.
    pub fn index_names(&self) -> Vec<String> {
        self.indexes.read().keys().cloned().collect()
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.read().clone()
    }

    fn api_error(status: u16, message: &str) -> BackendError {
        BackendError::Api {
            status,
            body: Some(json!({ "message": message })),
        }
    }
}

#[async_trait]
impl SearchBackend for MemoryBackend {
    async fn create_index(&self, index: &str) -> BackendResult<()> {
        self.calls
            .write()
            .push(BackendCall::CreateIndex(index.to_string()));

        if let Some((status, message)) = self.create_failure.read().clone() {
            return Err(Self::api_error(status, &message));
        }

        let mut indexes = self.indexes.write();
        if indexes.contains_key(index) {
            return Err(BackendError::AlreadyExists(index.to_string()));
        }
        indexes.insert(index.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn clear_index(&self, index: &str) -> BackendResult<()> {
        self.calls
            .write()
            .push(BackendCall::ClearIndex(index.to_string()));

        if let Some(docs) = self.indexes.write().get_mut(index) {
            docs.clear();
        }
        Ok(())
    }

    async fn delete_document(&self, index: &str, id: &RecordId) -> BackendResult<()> {
        let key = id.key();
        self.calls.write().push(BackendCall::DeleteDocument {
            index: index.to_string(),
            id: key.clone(),
        });

        if self.failing_deletes.read().contains(&key) {
            return Err(Self::api_error(500, &format!("cannot delete document {key}")));
        }

        if let Some(docs) = self.indexes.write().get_mut(index) {
            docs.remove(&key);
        }
        Ok(())
    }

    async fn upsert_document(
        &self,
        index: &str,
        id: &RecordId,
        document: Document,
        primary_key: Option<&str>,
    ) -> BackendResult<()> {
        let key = id.key();
        self.calls.write().push(BackendCall::UpsertDocument {
            index: index.to_string(),
            id: key.clone(),
        });

        if self.failing_upserts.read().contains(&key) {
            return Err(Self::api_error(400, &format!("invalid document {key}")));
        }

        let document = with_primary_key(document, id, primary_key);
        self.insert_document(index, key, document);
        Ok(())
    }
}

/// A call received by [`MemoryRecordSource`].
#[derive(Debug, Clone, PartialEq)]
pub enum SourceCall {
    /// `schema`.
    Schema {
        /// Collection name.
        collection: String,
    },
    /// `read_keys`.
    ReadKeys {
        /// Collection name.
        collection: String,
        /// Requested page size.
        limit: usize,
        /// Requested offset.
        offset: usize,
        /// Number of keys returned.
        returned: usize,
    },
    /// `read_records`.
    ReadRecords {
        /// Collection name.
        collection: String,
        /// Requested ids.
        ids: Vec<RecordId>,
        /// Requested field list.
        fields: Option<Vec<String>>,
    },
}

#[derive(Debug, Clone)]
struct MemoryCollection {
    primary_key: String,
    records: Vec<Record>,
}

impl MemoryCollection {
    fn id_of(&self, record: &Record) -> Option<RecordId> {
        record.get(&self.primary_key).and_then(RecordId::from_value)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotCollection {
    #[serde(default = "default_primary_key")]
    primary_key: String,
    #[serde(default)]
    records: Vec<Record>,
}

fn default_primary_key() -> String {
    DEFAULT_PRIMARY_KEY.to_string()
}

/// A record source over in-memory collections.
///
/// Records keep insertion order, which is also the key scan order.
#[derive(Debug, Default)]
pub struct MemoryRecordSource {
    collections: RwLock<BTreeMap<String, MemoryCollection>>,
    calls: RwLock<Vec<SourceCall>>,
    failing_reads: RwLock<HashMap<String, String>>,
}

impl MemoryRecordSource {
    /// Creates a source with no collections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads collections from a snapshot value:
    ///
    /// ```json
    /// { "articles": { "primaryKey": "id", "records": [ { "id": 1 } ] } }
    /// ```
    pub fn from_snapshot(snapshot: Value) -> SourceResult<Self> {
        let Value::Object(collections) = snapshot else {
            return Err(SourceError::Other("snapshot is not an object".into()));
        };

        let source = Self::new();
        for (name, value) in collections {
            let collection: SnapshotCollection = serde_json::from_value(value)
                .map_err(|e| SourceError::Other(format!("snapshot collection \"{name}\": {e}")))?;
            source.add_collection(&name, collection.primary_key);
            for record in collection.records {
                source.insert(&name, record);
            }
        }
        Ok(source)
    }

    /// Loads collections from a snapshot file.
    pub fn from_snapshot_path(path: impl AsRef<Path>) -> SourceResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SourceError::Other(format!("cannot read snapshot {path:?}: {e}")))?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| SourceError::Other(format!("broken snapshot {path:?}: {e}")))?;
        Self::from_snapshot(value)
    }

    /// Creates an empty collection (or resets an existing one).
    pub fn add_collection(&self, name: &str, primary_key: impl Into<String>) {
        self.collections.write().insert(
            name.to_string(),
            MemoryCollection {
                primary_key: primary_key.into(),
                records: Vec::new(),
            },
        );
    }

    /// Inserts a record, replacing one with the same primary key.
    ///
    /// Records without a usable primary key are ignored.
    pub fn insert(&self, collection: &str, record: Record) -> Option<RecordId> {
        let mut collections = self.collections.write();
        let target = collections.get_mut(collection)?;
        let id = target.id_of(&record)?;

        let existing = target
            .records
            .iter()
            .position(|r| target.id_of(r).as_ref() == Some(&id));
        match existing {
            Some(position) => target.records[position] = record,
            None => target.records.push(record),
        }
        Some(id)
    }

    /// Removes a record; returns true if it existed.
    pub fn remove(&self, collection: &str, id: &RecordId) -> bool {
        let mut collections = self.collections.write();
        let Some(target) = collections.get_mut(collection) else {
            return false;
        };
        let before = target.records.len();
        let primary_key = target.primary_key.clone();
        target
            .records
            .retain(|r| r.get(&primary_key).and_then(RecordId::from_value).as_ref() != Some(id));
        target.records.len() != before
    }

    /// Number of records in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .get(collection)
            .map_or(0, |c| c.records.len())
    }

    /// Names of all collections, sorted.
    pub fn collection_names(&self) -> Vec<String> {
        self.collections.read().keys().cloned().collect()
    }

    /// Makes key and record reads of a collection fail.
    pub fn fail_reads(&self, collection: &str, message: impl Into<String>) {
        self.failing_reads
            .write()
            .insert(collection.to_string(), message.into());
    }

    /// Every call received so far.
    pub fn calls(&self) -> Vec<SourceCall> {
        self.calls.read().clone()
    }

    /// Number of keys returned by each `read_keys` call on a collection.
    pub fn key_page_sizes(&self, collection: &str) -> Vec<usize> {
        self.calls
            .read()
            .iter()
            .filter_map(|call| match call {
                SourceCall::ReadKeys {
                    collection: c,
                    returned,
                    ..
                } if c == collection => Some(*returned),
                _ => None,
            })
            .collect()
    }

    /// Number of `read_records` calls on a collection.
    pub fn read_records_calls(&self, collection: &str) -> usize {
        self.calls
            .read()
            .iter()
            .filter(|call| {
                matches!(call, SourceCall::ReadRecords { collection: c, .. } if c == collection)
            })
            .count()
    }

    fn check_failure(&self, collection: &str) -> SourceResult<()> {
        match self.failing_reads.read().get(collection) {
            Some(message) => Err(SourceError::Query {
                collection: collection.to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

fn select_fields(record: &Record, fields: Option<&[String]>) -> Record {
    let Some(fields) = fields else {
        return record.clone();
    };
    if fields.iter().any(|f| f == "*") {
        return record.clone();
    }

    record
        .iter()
        .filter(|(key, _)| {
            fields
                .iter()
                .any(|f| f.split('.').next() == Some(key.as_str()))
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect::<Map<String, Value>>()
}

#[async_trait]
impl RecordSource for MemoryRecordSource {
    async fn schema(&self, collection: &str) -> SourceResult<CollectionSchema> {
        self.calls.write().push(SourceCall::Schema {
            collection: collection.to_string(),
        });

        Ok(match self.collections.read().get(collection) {
            Some(c) => CollectionSchema::new(c.primary_key.clone()),
            None => CollectionSchema::missing(),
        })
    }

    async fn read_keys(&self, collection: &str, query: &KeyQuery<'_>) -> SourceResult<Vec<RecordId>> {
        self.check_failure(collection)?;

        let keys: Vec<RecordId> = {
            let collections = self.collections.read();
            let target = collections
                .get(collection)
                .ok_or_else(|| SourceError::CollectionNotFound(collection.to_string()))?;
            target
                .records
                .iter()
                .filter(|r| matches_filter(r, query.filter))
                .filter_map(|r| target.id_of(r))
                .skip(query.offset)
                .take(query.limit)
                .collect()
        };

        self.calls.write().push(SourceCall::ReadKeys {
            collection: collection.to_string(),
            limit: query.limit,
            offset: query.offset,
            returned: keys.len(),
        });
        Ok(keys)
    }

    async fn read_records(
        &self,
        collection: &str,
        ids: &[RecordId],
        fields: Option<&[String]>,
        filter: Option<&Value>,
    ) -> SourceResult<Vec<Record>> {
        self.calls.write().push(SourceCall::ReadRecords {
            collection: collection.to_string(),
            ids: ids.to_vec(),
            fields: fields.map(<[String]>::to_vec),
        });
        self.check_failure(collection)?;

        let collections = self.collections.read();
        let Some(target) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut seen = HashSet::new();
        let records = ids
            .iter()
            .filter(|id| seen.insert((*id).clone()))
            .filter_map(|id| {
                target
                    .records
                    .iter()
                    .find(|r| target.id_of(r).as_ref() == Some(id))
            })
            .filter(|r| matches_filter(r, filter))
            .map(|r| select_fields(r, fields))
            .collect();
        Ok(records)
    }
}
