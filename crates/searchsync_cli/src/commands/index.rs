//! Index command implementation.

use crate::http::ReqwestClient;
use searchsync_core::{load_config, TransformRegistry};
use searchsync_engine::{create_backend, MemoryRecordSource, ReindexSummary, SyncEngine};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Result of an index run.
#[derive(Debug)]
pub struct IndexReport {
    /// One summary per rebuilt index.
    pub summaries: Vec<ReindexSummary>,
    /// Final document counts, when indexing into the in-process backend.
    pub document_counts: Option<Vec<(String, usize)>>,
}

/// Runs the index command.
pub async fn run(
    config_path: Option<&Path>,
    snapshot: &Path,
    only: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = execute(config_path, snapshot, only).await?;

    println!("Index results:");
    for summary in &report.summaries {
        if summary.skipped {
            println!("  {}: skipped (collection missing)", summary.index);
            continue;
        }
        println!(
            "  {}: {} upserted, {} deleted, {} failed in {} page(s), {:.2?}",
            summary.index,
            summary.upserted,
            summary.deleted,
            summary.failed,
            summary.pages,
            summary.duration
        );
    }

    if let Some(counts) = &report.document_counts {
        println!();
        println!("Documents in memory backend:");
        for (index, count) in counts {
            println!("  {index}: {count}");
        }
    }

    Ok(())
}

/// Loads configuration and snapshot, then rebuilds the requested indexes.
pub async fn execute(
    config_path: Option<&Path>,
    snapshot: &Path,
    only: Option<&str>,
) -> Result<IndexReport, Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let registry = config.to_registry(&TransformRegistry::with_builtins())?;

    if let Some(name) = only {
        if registry.get(name).is_none() {
            return Err(format!("index \"{name}\" is not configured").into());
        }
    }

    let source = MemoryRecordSource::from_snapshot_path(snapshot)?;
    let backend = create_backend(&config.server, ReqwestClient::new()?)?;
    let engine = Arc::new(SyncEngine::new(registry, backend, source));

    let signal_engine = Arc::clone(&engine);
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, stopping after the current item");
            signal_engine.cancel();
        }
    });

    let result = match only {
        Some(name) => {
            engine.ensure_collection_index(name).await;
            engine.full_reindex(name).await.map(|summary| vec![summary])
        }
        None => engine.init_collection_indexes().await,
    };
    signal_task.abort();
    let summaries = result?;

    let stats = engine.stats();
    info!(
        reindexes = stats.reindexes_completed,
        upserted = stats.documents_upserted,
        deleted = stats.documents_deleted,
        failures = stats.item_failures,
        "index run finished"
    );

    let document_counts = engine.backend().as_memory().map(|memory| {
        summaries
            .iter()
            .map(|s| (s.index.clone(), memory.document_count(&s.index)))
            .collect()
    });

    Ok(IndexReport {
        summaries,
        document_counts,
    })
}
