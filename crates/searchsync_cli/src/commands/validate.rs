//! Validate command implementation.

use searchsync_core::{load_config, IndexRegistry, SearchSyncConfig, TransformRegistry};
use std::collections::BTreeSet;
use std::path::Path;

/// Runs the validate command.
pub fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path)?;
    let registry = config.to_registry(&TransformRegistry::with_builtins())?;

    print!("{}", describe(&config, &registry));
    println!();
    println!("Configuration is valid");
    Ok(())
}

/// Renders the index layout and the collection fan-out.
fn describe(config: &SearchSyncConfig, registry: &IndexRegistry) -> String {
    let mut out = String::new();
    out.push_str(&format!("Backend: {}\n", config.server.kind));
    if let Some(host) = &config.server.host {
        out.push_str(&format!("Host: {host}\n"));
    }
    out.push_str(&format!("Batch limit: {}\n", registry.batch_limit()));
    out.push_str(&format!("Reindex on start: {}\n", registry.reindex_on_start()));

    out.push_str("\nIndexes:\n");
    let mut collections = BTreeSet::new();
    for definition in registry.definitions() {
        let transform = definition
            .transform
            .as_ref()
            .map_or("-", |t| t.name());
        out.push_str(&format!(
            "  {} <- {} (transform: {})\n",
            definition.name, definition.collection_name, transform
        ));
        collections.insert(definition.collection_name.as_str());
    }

    out.push_str("\nFan-out:\n");
    for collection in collections {
        out.push_str(&format!(
            "  {} -> {}\n",
            collection,
            registry.indexes_for_collection(collection).join(", ")
        ));
    }
    out
}
