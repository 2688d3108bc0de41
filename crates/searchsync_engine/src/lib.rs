//! # SearchSync Engine
//!
//! Keeps search indexes in line with a system of record.
//!
//! This crate provides:
//! - The `SearchBackend` and `RecordSource` abstractions
//! - The `SyncEngine`: full reindex, incremental update and delete
//! - Host hooks that fan item events out to every index of a collection
//! - In-memory backend and source for tests and offline runs
//! - A Meilisearch backend over an injected HTTP client
//!
//! ## Key Invariants
//!
//! - Work is sequential: page N is written before page N+1 is fetched
//! - One failing item never aborts its batch
//! - After `incremental_update`, every requested id is either written with
//!   its current projection or absent from the index
//! - Deleting or clearing a missing target is success

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod engine;
mod error;
mod factory;
pub mod filter;
pub mod hooks;
pub mod memory;
pub mod meilisearch;
mod source;

pub use backend::{with_primary_key, SearchBackend};
pub use engine::{DeleteSummary, ReindexSummary, SyncEngine, SyncStats, UpdateSummary};
pub use error::{
    error_message, BackendError, BackendResult, SourceError, SourceResult, SyncError, SyncResult,
};
pub use factory::{create_backend, ConfiguredBackend};
pub use hooks::{HostEvent, ItemAction, SyncHooks};
pub use memory::{BackendCall, MemoryBackend, MemoryRecordSource, SourceCall};
pub use meilisearch::{HttpClient, HttpMethod, HttpRequest, HttpResponse, MeilisearchBackend};
pub use source::{CollectionSchema, KeyQuery, RecordSource, DEFAULT_PRIMARY_KEY};

pub use searchsync_core;
