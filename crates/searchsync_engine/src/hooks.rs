//! Host integration: routes host lifecycle and item events to the engine.
//!
//! The host (a CMS, a change listener, the CLI) reports what happened to
//! which collection; the hooks resolve the indexes fed by that collection
//! and run one incremental operation per index with the same id list.
//!
//! # Usage
//!
//! ```rust,ignore
//! let hooks = SyncHooks::new(Arc::new(engine));
//! hooks.on_server_start().await;
//! hooks.dispatch(HostEvent::updated("articles", vec![RecordId::Int(7)])).await;
//! ```
//!
//! Hooks never fail: every error is logged and the next index is processed.

use crate::backend::SearchBackend;
use crate::engine::SyncEngine;
use crate::error::error_message;
use crate::source::RecordSource;
use searchsync_core::RecordId;
use std::sync::Arc;
use tracing::{debug, warn};

/// Kind of item event reported by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    /// Items were created.
    Created,
    /// Items were updated.
    Updated,
    /// Items were deleted.
    Deleted,
}

/// An event reported by the host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// The host finished starting.
    ServerStart,
    /// Items of a collection changed.
    Items {
        /// What happened.
        action: ItemAction,
        /// Collection the items belong to.
        collection: String,
        /// Primary keys of the affected items.
        keys: Vec<RecordId>,
    },
}

impl HostEvent {
    /// Creates an item-created event for a single key.
    pub fn created(collection: impl Into<String>, key: RecordId) -> Self {
        Self::Items {
            action: ItemAction::Created,
            collection: collection.into(),
            keys: vec![key],
        }
    }

    /// Creates an item-updated event.
    pub fn updated(collection: impl Into<String>, keys: Vec<RecordId>) -> Self {
        Self::Items {
            action: ItemAction::Updated,
            collection: collection.into(),
            keys,
        }
    }

    /// Creates an item-deleted event.
    pub fn deleted(collection: impl Into<String>, keys: Vec<RecordId>) -> Self {
        Self::Items {
            action: ItemAction::Deleted,
            collection: collection.into(),
            keys,
        }
    }
}

/// Event handlers bound to one engine.
pub struct SyncHooks<B: SearchBackend, S: RecordSource> {
    engine: Arc<SyncEngine<B, S>>,
}

impl<B: SearchBackend, S: RecordSource> Clone for SyncHooks<B, S> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
        }
    }
}

impl<B: SearchBackend, S: RecordSource> SyncHooks<B, S> {
    /// Creates hooks over a shared engine.
    pub fn new(engine: Arc<SyncEngine<B, S>>) -> Self {
        Self { engine }
    }

    /// The engine the hooks drive.
    pub fn engine(&self) -> &Arc<SyncEngine<B, S>> {
        &self.engine
    }

    /// Routes an event to its handler.
    ///
    /// Returns the number of indexes the event was applied to.
    pub async fn dispatch(&self, event: HostEvent) -> usize {
        match event {
            HostEvent::ServerStart => self.on_server_start().await,
            HostEvent::Items {
                action,
                collection,
                keys,
            } => match action {
                ItemAction::Created => self.on_items_changed(&collection, &keys).await,
                ItemAction::Updated => self.on_item_updated(&collection, &keys).await,
                ItemAction::Deleted => self.on_item_deleted(&collection, &keys).await,
            },
        }
    }

    /// Rebuilds every index when the registry asks for it.
    ///
    /// Returns the number of indexes rebuilt.
    pub async fn on_server_start(&self) -> usize {
        if !self.engine.registry().reindex_on_start() {
            debug!("reindex on start disabled");
            return 0;
        }

        match self.engine.init_collection_indexes().await {
            Ok(summaries) => summaries.len(),
            Err(err) => {
                warn!("Cannot rebuild indexes. {}", error_message(&err));
                debug!(error = ?err, "init_collection_indexes failed");
                0
            }
        }
    }

    /// Indexes a newly created item in every index of its collection.
    pub async fn on_item_created(&self, collection: &str, key: RecordId) -> usize {
        self.on_items_changed(collection, std::slice::from_ref(&key))
            .await
    }

    /// Re-indexes updated items in every index of their collection.
    pub async fn on_item_updated(&self, collection: &str, keys: &[RecordId]) -> usize {
        self.on_items_changed(collection, keys).await
    }

    /// Removes deleted items from every index of their collection.
    pub async fn on_item_deleted(&self, collection: &str, keys: &[RecordId]) -> usize {
        let indexes = self.engine.registry().indexes_for_collection(collection);
        for index_name in indexes {
            if let Err(err) = self.engine.incremental_delete(index_name, keys).await {
                warn!("Cannot delete from \"{index_name}\". {}", error_message(&err));
                debug!(index = %index_name, error = ?err, "incremental_delete failed");
            }
        }
        indexes.len()
    }

    async fn on_items_changed(&self, collection: &str, keys: &[RecordId]) -> usize {
        let indexes = self.engine.registry().indexes_for_collection(collection);
        if indexes.is_empty() {
            debug!(collection, "no index for collection");
        }
        for index_name in indexes {
            if let Err(err) = self.engine.incremental_update(index_name, keys).await {
                warn!("Cannot update \"{index_name}\". {}", error_message(&err));
                debug!(index = %index_name, error = ?err, "incremental_update failed");
            }
        }
        indexes.len()
    }
}
