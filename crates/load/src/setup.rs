//! Idempotent creation (and explicit removal) of the pipeline's collections
//! and indexes.

use hpetl::{CollectionSpec, DocumentStore, EtlError};
use tracing::{info, warn};

/// What a setup run changed. Both lists are empty when everything existed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetupReport {
    pub collections_created: Vec<String>,
    /// Created indexes as `collection.index_name`.
    pub indexes_created: Vec<String>,
}

/// Ensures every collection in `specs` exists with all of its indexes.
pub async fn setup_store(
    store: &dyn DocumentStore,
    specs: &[CollectionSpec],
) -> Result<SetupReport, EtlError> {
    store.ping().await?;
    info!("Starting setup on {}...", store.name());

    let mut report = SetupReport::default();
    let existing = store.list_collections().await?;

    for spec in specs {
        if existing.iter().any(|name| name == &spec.name) {
            info!("Collection '{}' already exists", spec.name);
        } else {
            store.create_collection(&spec.name).await?;
            info!("Collection '{}' created", spec.name);
            report.collections_created.push(spec.name.clone());
        }

        let indexes = store.list_indexes(&spec.name).await?;
        for index in &spec.indexes {
            let name = index.name();
            if indexes.contains(&name) {
                continue;
            }
            store.create_index(&spec.name, index).await?;
            report.indexes_created.push(format!("{}.{name}", spec.name));
        }
        info!(
            "Indexes ready for '{}': {}",
            spec.name,
            spec.indexes
                .iter()
                .map(|i| if i.unique {
                    format!("{} (unique)", i.field)
                } else {
                    i.field.clone()
                })
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    info!("Setup completed");
    Ok(report)
}

/// Drops every collection in `specs` that exists, returning the dropped names.
pub async fn drop_collections(
    store: &dyn DocumentStore,
    specs: &[CollectionSpec],
) -> Result<Vec<String>, EtlError> {
    store.ping().await?;
    let existing = store.list_collections().await?;

    let mut dropped = Vec::new();
    for spec in specs {
        if existing.iter().any(|name| name == &spec.name) {
            store.drop_collection(&spec.name).await?;
            warn!("Collection '{}' dropped", spec.name);
            dropped.push(spec.name.clone());
        }
    }
    Ok(dropped)
}
