//! Transform strategies.
//!
//! A transform fully determines the projected document of an index. It is a
//! plain function value with a fixed signature, resolved by name when the
//! configuration is loaded and called directly for every record.

use crate::error::TransformError;
use crate::utils;
use crate::value::{Document, Record};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Helper set handed to every transform.
///
/// Exposes exactly the four pure helpers of [`crate::utils`].
#[derive(Debug, Clone, Copy, Default)]
pub struct TransformUtils;

impl TransformUtils {
    /// See [`utils::strip_tags`].
    pub fn strip_tags(&self, input: &str) -> String {
        utils::strip_tags(input)
    }

    /// See [`utils::flatten`].
    pub fn flatten(&self, object: &Map<String, Value>) -> Map<String, Value> {
        utils::flatten(object)
    }

    /// See [`utils::object_map`].
    pub fn object_map<F>(&self, object: &Map<String, Value>, map_fn: F) -> Map<String, Value>
    where
        F: Fn(&Value, &str) -> Value,
    {
        utils::object_map(object, map_fn)
    }

    /// See [`utils::filtered`].
    pub fn filtered<S: AsRef<str>>(
        &self,
        object: &Map<String, Value>,
        keys: &[S],
    ) -> Map<String, Value> {
        utils::filtered(object, keys)
    }
}

type TransformFn =
    dyn Fn(&Record, &TransformUtils, &str) -> Result<Document, TransformError> + Send + Sync;

/// A named transform strategy.
///
/// Called as `(record, utils, index_name)`; returns the document to index.
#[derive(Clone)]
pub struct Transform {
    name: String,
    func: Arc<TransformFn>,
}

impl Transform {
    /// Wraps a function as a transform.
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Record, &TransformUtils, &str) -> Result<Document, TransformError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }

    /// Name the transform was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Applies the transform to one record.
    pub fn apply(&self, record: &Record, index_name: &str) -> Result<Document, TransformError> {
        (self.func)(record, &TransformUtils, index_name)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform").field("name", &self.name).finish()
    }
}

/// Transforms available to configuration files, looked up by name.
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    transforms: HashMap<String, Transform>,
}

impl TransformRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in transforms:
    ///
    /// - `strip_tags`: strips markup from every top-level string value
    /// - `flatten`: flattens the record into dot-joined keys
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Transform::new("strip_tags", |record, utils, _index| {
            Ok(utils.object_map(record, |value, _key| match value {
                Value::String(s) => Value::String(utils.strip_tags(s)),
                other => other.clone(),
            }))
        }));
        registry.register(Transform::new("flatten", |record, utils, _index| {
            Ok(utils.flatten(record))
        }));
        registry
    }

    /// Registers a transform, replacing any previous one of the same name.
    pub fn register(&mut self, transform: Transform) -> &mut Self {
        self.transforms.insert(transform.name.clone(), transform);
        self
    }

    /// Looks up a transform by name.
    pub fn get(&self, name: &str) -> Option<&Transform> {
        self.transforms.get(name)
    }

    /// Names of all registered transforms, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.transforms.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
