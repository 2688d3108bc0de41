//! Projection of source records into index documents.

use crate::error::{ProjectionError, ProjectionResult};
use crate::registry::IndexDefinition;
use crate::utils::{filtered, flatten};
use crate::value::{Document, Record};
use serde_json::Value;

/// Turns raw records into documents according to an index definition.
///
/// Precedence: a transform fully determines the document; otherwise a field
/// list selects flattened keys; otherwise the record passes through. In all
/// three cases the collection metadata field is merged last and wins on
/// collision.
#[derive(Debug, Clone, Copy, Default)]
pub struct Projector;

impl Projector {
    /// Creates a projector.
    pub fn new() -> Self {
        Self
    }

    /// Projects one record.
    pub fn project(
        &self,
        record: &Record,
        definition: &IndexDefinition,
    ) -> ProjectionResult<Document> {
        let mut document = if let Some(transform) = &definition.transform {
            transform
                .apply(record, &definition.name)
                .map_err(|source| ProjectionError::Transform {
                    index: definition.name.clone(),
                    source,
                })?
        } else if let Some(fields) = &definition.fields {
            filtered(&flatten(record), fields)
        } else {
            record.clone()
        };

        if let Some(field) = &definition.collection_field {
            document.insert(
                field.clone(),
                Value::String(definition.collection_name.clone()),
            );
        }

        Ok(document)
    }
}
