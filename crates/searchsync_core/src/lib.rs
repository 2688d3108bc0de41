//! # SearchSync Core
//!
//! Data model and pure logic for SearchSync.
//!
//! This crate provides:
//! - `Record`/`Document` value model and `RecordId`
//! - Configuration loading and validation
//! - The immutable `IndexRegistry` with its collection fan-out map
//! - The `Projector` and the transform utility set
//!
//! There is no I/O here beyond reading the configuration file; the sync
//! engine lives in `searchsync_engine`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
mod error;
pub mod projector;
pub mod registry;
pub mod transform;
pub mod utils;
mod value;

pub use config::{
    load_config, resolve_config_path, BackendKind, IndexConfig, SearchSyncConfig, ServerConfig,
};
pub use error::{ConfigError, ConfigResult, ProjectionError, ProjectionResult, TransformError};
pub use projector::Projector;
pub use registry::{IndexDefinition, IndexRegistry, DEFAULT_BATCH_LIMIT};
pub use transform::{Transform, TransformRegistry, TransformUtils};
pub use value::{Document, Record, RecordId};
