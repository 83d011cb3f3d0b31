//! Upserts the transformed snapshot into the store, keyed by `id`.

use async_trait::async_trait;
use hpetl::constants::{CHARACTERS_COLLECTION, ID_FIELD};
use hpetl::{
    snapshot, Character, Document, DocumentStore, EtlError, LoadCounts, RetryConfig, Stage,
    StageKind, StageReport, UpsertOutcome,
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Clone)]
pub struct LoadOptions {
    pub collection: String,
    /// Delete every existing document before loading.
    pub replace: bool,
    /// Applied to each store write.
    pub retry: RetryConfig,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            collection: CHARACTERS_COLLECTION.to_string(),
            replace: false,
            retry: RetryConfig::default(),
        }
    }
}

fn to_document(character: &Character) -> Result<Document, EtlError> {
    match serde_json::to_value(character) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(EtlError::StoreWrite(format!(
            "character '{}' did not serialize to an object: {other}",
            character.id
        ))),
        Err(e) => Err(EtlError::StoreWrite(format!(
            "character '{}' could not be serialized: {e}",
            character.id
        ))),
    }
}

/// Upserts `characters` one by one.
///
/// Each write is retried per `options.retry`. A record that still fails is
/// logged and counted; an error that means the store itself is gone aborts
/// the run.
pub async fn load_characters(
    store: &dyn DocumentStore,
    characters: &[Character],
    options: &LoadOptions,
) -> Result<LoadCounts, EtlError> {
    store.ping().await?;
    info!(
        "=========Loading {} characters into {} collection '{}'=========",
        characters.len(),
        store.name(),
        options.collection
    );

    if options.replace {
        let deleted = options
            .retry
            .run("delete existing documents", || store.delete_all(&options.collection))
            .await?;
        info!("Existing documents deleted: {deleted}");
    }

    let mut counts = LoadCounts::default();
    for character in characters {
        let result = match to_document(character) {
            Ok(document) => {
                let label = format!("upsert '{}'", character.id);
                options
                    .retry
                    .run(&label, || {
                        store.upsert(&options.collection, ID_FIELD, document.clone())
                    })
                    .await
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(UpsertOutcome::Inserted) => counts.inserted += 1,
            Ok(UpsertOutcome::Updated) => counts.updated += 1,
            Ok(UpsertOutcome::Unchanged) => counts.unchanged += 1,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                error!("Error loading character '{}' ({}): {e}", character.name, character.id);
                counts.failed += 1;
            }
        }
    }

    info!(
        "Characters loaded: {} inserted, {} updated, {} unchanged, {} failed",
        counts.inserted, counts.updated, counts.unchanged, counts.failed
    );
    Ok(counts)
}

/// Reads the transformed snapshot at `input` and loads it.
///
/// The snapshot is read before the store is contacted, so a missing input
/// fails without touching the store. Elements that do not decode as a
/// `Character` are logged and counted as failed.
pub async fn load_snapshot(
    store: &dyn DocumentStore,
    input: &Path,
    options: &LoadOptions,
) -> Result<StageReport, EtlError> {
    let elements: Vec<Value> = snapshot::read_snapshot(input)?;
    let total = elements.len();

    let mut characters = Vec::with_capacity(total);
    let mut malformed = 0;
    for (index, element) in elements.into_iter().enumerate() {
        match serde_json::from_value::<Character>(element) {
            Ok(character) => characters.push(character),
            Err(e) => {
                error!("Malformed record {index} in '{}': {e}", input.display());
                malformed += 1;
            }
        }
    }

    let mut counts = load_characters(store, &characters, options).await?;
    counts.failed += malformed;

    let mut report = StageReport::new(
        StageKind::Load,
        input.display().to_string(),
        options.collection.clone(),
    );
    report.records_read = total;
    report.records_written = counts.inserted + counts.updated + counts.unchanged;
    report.records_skipped = counts.failed;
    report.load = Some(counts);
    Ok(report)
}

/// The load stage bound to its store, input path and options.
pub struct LoadStage {
    pub store: Arc<dyn DocumentStore>,
    pub input: PathBuf,
    pub options: LoadOptions,
}

#[async_trait]
impl Stage for LoadStage {
    fn kind(&self) -> StageKind {
        StageKind::Load
    }

    async fn run(&self) -> Result<StageReport, EtlError> {
        load_snapshot(self.store.as_ref(), &self.input, &self.options).await
    }
}
