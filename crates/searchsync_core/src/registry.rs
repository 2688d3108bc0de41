//! Index definitions and the process-wide index registry.

use crate::error::{ConfigError, ConfigResult};
use crate::transform::Transform;
use serde_json::Value;
use std::collections::HashMap;

/// Default number of records fetched per page during a full scan.
pub const DEFAULT_BATCH_LIMIT: usize = 100;

/// Definition of one search index and the collection feeding it.
#[derive(Debug, Clone)]
pub struct IndexDefinition {
    /// Index name in the search backend.
    pub name: String,
    /// Source collection.
    pub collection_name: String,
    /// Metadata key set to the collection name on every document.
    pub collection_field: Option<String>,
    /// Flattened field paths to keep when no transform is configured.
    pub fields: Option<Vec<String>>,
    /// Opaque filter handed to the record source.
    pub filter: Option<Value>,
    /// Opaque query-shaping hints handed to the record source.
    pub deep: Option<Value>,
    /// Custom projection; takes priority over `fields`.
    pub transform: Option<Transform>,
}

impl IndexDefinition {
    /// Creates a definition indexing `collection_name` into `name`.
    pub fn new(name: impl Into<String>, collection_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection_name: collection_name.into(),
            collection_field: None,
            fields: None,
            filter: None,
            deep: None,
            transform: None,
        }
    }

    /// Sets the collection metadata field.
    #[must_use]
    pub fn with_collection_field(mut self, field: impl Into<String>) -> Self {
        self.collection_field = Some(field.into());
        self
    }

    /// Sets the projected field list.
    #[must_use]
    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Sets the record filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Value) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sets the deep query options.
    #[must_use]
    pub fn with_deep(mut self, deep: Value) -> Self {
        self.deep = Some(deep);
        self
    }

    /// Sets the transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }
}

/// Immutable map of index definitions.
///
/// Built once at startup and shared read-only afterwards. The
/// collection-to-indexes fan-out map is computed at construction.
#[derive(Debug, Clone)]
pub struct IndexRegistry {
    definitions: Vec<IndexDefinition>,
    by_name: HashMap<String, usize>,
    fan_out: HashMap<String, Vec<String>>,
    batch_limit: usize,
    reindex_on_start: bool,
}

impl IndexRegistry {
    /// Builds a registry from definitions, in the given order.
    ///
    /// Fails on duplicate index names and on empty names.
    pub fn new(definitions: Vec<IndexDefinition>) -> ConfigResult<Self> {
        let mut by_name = HashMap::with_capacity(definitions.len());
        let mut fan_out: HashMap<String, Vec<String>> = HashMap::new();

        for (position, definition) in definitions.iter().enumerate() {
            if definition.name.is_empty() {
                return Err(ConfigError::InvalidIndex {
                    index: definition.name.clone(),
                    message: "index name is empty".into(),
                });
            }
            if definition.collection_name.is_empty() {
                return Err(ConfigError::InvalidIndex {
                    index: definition.name.clone(),
                    message: "collectionName is empty".into(),
                });
            }
            if by_name.insert(definition.name.clone(), position).is_some() {
                return Err(ConfigError::InvalidIndex {
                    index: definition.name.clone(),
                    message: "duplicate index name".into(),
                });
            }
            fan_out
                .entry(definition.collection_name.clone())
                .or_default()
                .push(definition.name.clone());
        }

        Ok(Self {
            definitions,
            by_name,
            fan_out,
            batch_limit: DEFAULT_BATCH_LIMIT,
            reindex_on_start: false,
        })
    }

    /// Sets the page size used by full scans. Zero is raised to one.
    #[must_use]
    pub fn with_batch_limit(mut self, limit: usize) -> Self {
        self.batch_limit = limit.max(1);
        self
    }

    /// Sets whether a full reindex runs when the host starts.
    #[must_use]
    pub fn with_reindex_on_start(mut self, enabled: bool) -> Self {
        self.reindex_on_start = enabled;
        self
    }

    /// Page size used by full scans.
    pub fn batch_limit(&self) -> usize {
        self.batch_limit
    }

    /// Whether a full reindex runs on host start.
    pub fn reindex_on_start(&self) -> bool {
        self.reindex_on_start
    }

    /// Looks up an index definition.
    pub fn get(&self, index_name: &str) -> Option<&IndexDefinition> {
        self.by_name
            .get(index_name)
            .map(|&position| &self.definitions[position])
    }

    /// All definitions in registry order.
    pub fn definitions(&self) -> &[IndexDefinition] {
        &self.definitions
    }

    /// Index names in registry order.
    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.definitions.iter().map(|d| d.name.as_str())
    }

    /// Indexes fed by a collection, in registry order.
    ///
    /// Returns an empty slice for collections nothing is indexed from.
    pub fn indexes_for_collection(&self, collection: &str) -> &[String] {
        self.fan_out
            .get(collection)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of indexes.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns true if no index is defined.
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}
