//! The sync engine: full reindex and incremental update/delete.

use crate::backend::SearchBackend;
use crate::error::{error_message, BackendError, SyncError, SyncResult};
use crate::source::{KeyQuery, RecordSource};
use parking_lot::RwLock;
use searchsync_core::{IndexDefinition, IndexRegistry, Projector, Record, RecordId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Cumulative statistics about engine activity.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Number of full reindexes that ran to completion.
    pub reindexes_completed: u64,
    /// Documents written to the backend.
    pub documents_upserted: u64,
    /// Documents removed from the backend.
    pub documents_deleted: u64,
    /// Per-item failures that were logged and skipped.
    pub item_failures: u64,
    /// Last error that aborted an operation.
    pub last_error: Option<String>,
}

/// Outcome of one [`SyncEngine::incremental_update`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    /// Ids requested.
    pub requested: usize,
    /// Records returned by the filtered fetch.
    pub fetched: usize,
    /// Documents written.
    pub upserted: usize,
    /// Ids removed by drift reconciliation.
    pub deleted: usize,
    /// Items that failed and were skipped.
    pub failed: usize,
}

/// Outcome of one [`SyncEngine::incremental_delete`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    /// Ids requested.
    pub requested: usize,
    /// Ids removed.
    pub deleted: usize,
    /// Deletes that failed and were skipped.
    pub failed: usize,
}

/// Outcome of one [`SyncEngine::full_reindex`] call.
#[derive(Debug, Clone)]
pub struct ReindexSummary {
    /// Index rebuilt.
    pub index: String,
    /// True when the collection did not exist and nothing was done.
    pub skipped: bool,
    /// Non-empty key pages processed.
    pub pages: usize,
    /// Keys returned by the scan.
    pub keys_scanned: usize,
    /// Documents written.
    pub upserted: usize,
    /// Documents removed by drift reconciliation.
    pub deleted: usize,
    /// Items that failed and were skipped.
    pub failed: usize,
    /// Wall time of the rebuild.
    pub duration: Duration,
}

impl ReindexSummary {
    fn new(index: &str) -> Self {
        Self {
            index: index.to_string(),
            skipped: false,
            pages: 0,
            keys_scanned: 0,
            upserted: 0,
            deleted: 0,
            failed: 0,
            duration: Duration::ZERO,
        }
    }

    fn absorb(&mut self, batch: &UpdateSummary) {
        self.pages += 1;
        self.keys_scanned += batch.requested;
        self.upserted += batch.upserted;
        self.deleted += batch.deleted;
        self.failed += batch.failed;
    }
}

/// Keeps search indexes in line with the record source.
///
/// All work is sequential: one index, one page, one item at a time. Page N
/// is fully written before page N+1 is fetched, and documents of a batch are
/// written in fetch order.
pub struct SyncEngine<B: SearchBackend, S: RecordSource> {
    registry: Arc<IndexRegistry>,
    backend: Arc<B>,
    source: Arc<S>,
    projector: Projector,
    stats: RwLock<SyncStats>,
    cancelled: AtomicBool,
}

impl<B: SearchBackend, S: RecordSource> SyncEngine<B, S> {
    /// Creates a new sync engine.
    pub fn new(registry: IndexRegistry, backend: B, source: S) -> Self {
        Self::with_shared(Arc::new(registry), Arc::new(backend), Arc::new(source))
    }

    /// Creates a sync engine over already shared collaborators.
    pub fn with_shared(registry: Arc<IndexRegistry>, backend: Arc<B>, source: Arc<S>) -> Self {
        Self {
            registry,
            backend,
            source,
            projector: Projector::new(),
            stats: RwLock::new(SyncStats::default()),
            cancelled: AtomicBool::new(false),
        }
    }

    /// The index registry.
    pub fn registry(&self) -> &IndexRegistry {
        &self.registry
    }

    /// The search backend.
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// The record source.
    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Requests cancellation.
    ///
    /// The engine stops issuing backend calls at the next item or page
    /// boundary and returns [`SyncError::Cancelled`]. In-flight calls are not
    /// aborted.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Resets the cancelled flag.
    pub fn reset_cancel(&self) {
        self.cancelled.store(false, Ordering::SeqCst);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn check_cancelled(&self) -> SyncResult<()> {
        if self.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }

    fn definition(&self, index_name: &str) -> SyncResult<&IndexDefinition> {
        self.registry
            .get(index_name)
            .ok_or_else(|| SyncError::UnknownIndex(index_name.to_string()))
    }

    fn handle_error(&self, error: &SyncError) {
        self.stats.write().last_error = Some(error.to_string());
    }

    /// Creates the backend index if needed.
    ///
    /// Never fails: an existing index is success and any other error is
    /// logged.
    pub async fn ensure_collection_index(&self, index_name: &str) {
        if self.registry.get(index_name).is_none() {
            warn!(index = index_name, "cannot create unknown index");
            return;
        }
        if self.is_cancelled() {
            debug!(index = index_name, "cancelled, not creating index");
            return;
        }

        match self.backend.create_index(index_name).await {
            Ok(()) => debug!(index = index_name, "index created"),
            Err(BackendError::AlreadyExists(_)) => {
                debug!(index = index_name, "index already exists")
            }
            Err(err) => {
                let err = SyncError::from(err);
                warn!(
                    "Cannot create index \"{index_name}\". {}",
                    error_message(&err)
                );
                debug!(index = index_name, error = ?err, "create_index failed");
            }
        }
    }

    /// Creates and rebuilds every index, in registry order.
    ///
    /// Index creation and clearing failures are logged and skipped. A
    /// failure while scanning records aborts the whole run, leaving the
    /// remaining indexes untouched.
    pub async fn init_collection_indexes(&self) -> SyncResult<Vec<ReindexSummary>> {
        let mut summaries = Vec::with_capacity(self.registry.len());

        for index_name in self.registry.index_names() {
            self.check_cancelled()?;
            self.ensure_collection_index(index_name).await;
            summaries.push(self.full_reindex(index_name).await?);
        }

        Ok(summaries)
    }

    /// Rebuilds one index from a full scan of its collection.
    pub async fn full_reindex(&self, index_name: &str) -> SyncResult<ReindexSummary> {
        let result = self.full_reindex_inner(index_name).await;
        if let Err(e) = &result {
            self.handle_error(e);
        }
        result
    }

    async fn full_reindex_inner(&self, index_name: &str) -> SyncResult<ReindexSummary> {
        let start = Instant::now();
        let definition = self.definition(index_name)?;
        let collection = definition.collection_name.as_str();
        let mut summary = ReindexSummary::new(index_name);

        let schema = self.source.schema(collection).await?;
        if !schema.exists {
            warn!("Collection \"{collection}\" does not exist.");
            summary.skipped = true;
            summary.duration = start.elapsed();
            return Ok(summary);
        }

        info!(index = index_name, collection, "reindexing");

        self.check_cancelled()?;
        if let Err(err) = self.backend.clear_index(index_name).await {
            if !err.is_not_found() {
                let err = SyncError::from(err);
                warn!(
                    "Cannot clear index \"{index_name}\". {}",
                    error_message(&err)
                );
                debug!(index = index_name, error = ?err, "clear_index failed");
            }
        }

        let limit = self.registry.batch_limit();
        let mut offset = 0;

        loop {
            self.check_cancelled()?;

            let query = KeyQuery {
                filter: definition.filter.as_ref(),
                deep: definition.deep.as_ref(),
                limit,
                offset,
            };
            let keys = self.source.read_keys(collection, &query).await?;
            if keys.is_empty() {
                break;
            }

            debug!(index = index_name, offset, keys = keys.len(), "processing page");
            let batch = self.incremental_update(index_name, &keys).await?;
            summary.absorb(&batch);

            offset += limit;
        }

        summary.duration = start.elapsed();
        self.stats.write().reindexes_completed += 1;

        info!(
            index = index_name,
            pages = summary.pages,
            upserted = summary.upserted,
            deleted = summary.deleted,
            failed = summary.failed,
            duration_ms = summary.duration.as_millis() as u64,
            "reindex complete"
        );

        Ok(summary)
    }

    /// Re-projects and writes the given records.
    ///
    /// Records are fetched again through the index filter. Each one is
    /// projected and written on its own; a failing item is logged and
    /// skipped. Every requested id that was not written afterwards (gone
    /// upstream, filtered out, or failed) is deleted from the index.
    pub async fn incremental_update(
        &self,
        index_name: &str,
        ids: &[RecordId],
    ) -> SyncResult<UpdateSummary> {
        let mut summary = UpdateSummary {
            requested: ids.len(),
            ..UpdateSummary::default()
        };
        let result = self
            .incremental_update_inner(index_name, ids, &mut summary)
            .await;

        // Work done before an abort still counts.
        self.record_batch(summary.upserted, summary.deleted, summary.failed);
        match result {
            Ok(()) => Ok(summary),
            Err(e) => {
                self.handle_error(&e);
                Err(e)
            }
        }
    }

    fn record_batch(&self, upserted: usize, deleted: usize, failed: usize) {
        let mut stats = self.stats.write();
        stats.documents_upserted += upserted as u64;
        stats.documents_deleted += deleted as u64;
        stats.item_failures += failed as u64;
    }

    async fn incremental_update_inner(
        &self,
        index_name: &str,
        ids: &[RecordId],
        summary: &mut UpdateSummary,
    ) -> SyncResult<()> {
        let definition = self.definition(index_name)?;
        if ids.is_empty() {
            return Ok(());
        }

        let collection = definition.collection_name.as_str();
        let schema = self.source.schema(collection).await?;
        let primary_key = schema.primary_key.as_str();

        let fields: Option<Vec<String>> = definition.fields.as_ref().map(|fields| {
            std::iter::once(primary_key.to_string())
                .chain(fields.iter().cloned())
                .collect()
        });

        let records = self
            .source
            .read_records(
                collection,
                ids,
                fields.as_deref(),
                definition.filter.as_ref(),
            )
            .await?;
        summary.fetched = records.len();

        let mut processed: HashSet<RecordId> = HashSet::with_capacity(records.len());
        let mut failed: HashSet<RecordId> = HashSet::new();

        for record in &records {
            self.check_cancelled()?;

            let Some(id) = record.get(primary_key).and_then(RecordId::from_value) else {
                let err = SyncError::MissingPrimaryKey {
                    field: primary_key.to_string(),
                };
                warn!("Cannot index record of \"{index_name}\". {}", error_message(&err));
                debug!(index = index_name, error = ?err, "record without primary key");
                summary.failed += 1;
                continue;
            };

            match self.write_record(definition, &id, record, primary_key).await {
                Ok(()) => {
                    processed.insert(id);
                    summary.upserted += 1;
                }
                Err(err) => {
                    warn!("Cannot index \"{index_name}/{id}\". {}", error_message(&err));
                    debug!(index = index_name, id = %id, error = ?err, "upsert failed");
                    failed.insert(id);
                    summary.failed += 1;
                }
            }
        }

        for id in ids.iter().filter(|id| !processed.contains(*id)) {
            self.check_cancelled()?;

            match self.delete_one(index_name, id).await {
                Ok(()) => summary.deleted += 1,
                Err(err) => {
                    warn!("Cannot delete \"{index_name}/{id}\". {}", error_message(&err));
                    debug!(index = index_name, id = %id, error = ?err, "drift delete failed");
                    // One failure per record.
                    if !failed.contains(id) {
                        summary.failed += 1;
                    }
                }
            }
        }

        debug!(
            index = index_name,
            requested = summary.requested,
            fetched = summary.fetched,
            upserted = summary.upserted,
            deleted = summary.deleted,
            "batch complete"
        );

        Ok(())
    }

    async fn write_record(
        &self,
        definition: &IndexDefinition,
        id: &RecordId,
        record: &Record,
        primary_key: &str,
    ) -> SyncResult<()> {
        let document = self.projector.project(record, definition)?;
        self.backend
            .upsert_document(&definition.name, id, document, Some(primary_key))
            .await?;
        Ok(())
    }

    async fn delete_one(&self, index_name: &str, id: &RecordId) -> SyncResult<()> {
        match self.backend.delete_document(index_name, id).await {
            Err(err) if !err.is_not_found() => Err(err.into()),
            _ => Ok(()),
        }
    }

    /// Removes the given documents from an index.
    ///
    /// Each delete is independent; failures are logged and skipped.
    pub async fn incremental_delete(
        &self,
        index_name: &str,
        ids: &[RecordId],
    ) -> SyncResult<DeleteSummary> {
        self.definition(index_name)?;
        let mut summary = DeleteSummary {
            requested: ids.len(),
            ..DeleteSummary::default()
        };

        for id in ids {
            if let Err(e) = self.check_cancelled() {
                self.record_batch(0, summary.deleted, summary.failed);
                self.handle_error(&e);
                return Err(e);
            }

            match self.delete_one(index_name, id).await {
                Ok(()) => summary.deleted += 1,
                Err(err) => {
                    warn!("Cannot delete \"{index_name}/{id}\". {}", error_message(&err));
                    debug!(index = index_name, id = %id, error = ?err, "delete failed");
                    summary.failed += 1;
                }
            }
        }

        self.record_batch(0, summary.deleted, summary.failed);
        Ok(summary)
    }
}
