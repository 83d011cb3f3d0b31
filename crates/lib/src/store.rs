//! # Document Store Abstraction
//!
//! The load and setup logic only talks to the store through `DocumentStore`.
//! The MongoDB implementation lives in `hpetl-load`; tests use an in-memory
//! implementation from `hpetl-test-utils`.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::constants::{CHARACTERS_COLLECTION, ID_FIELD};
use crate::errors::EtlError;

/// A stored document: a JSON object.
pub type Document = Map<String, Value>;

/// A single-field ascending index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    pub field: String,
    pub unique: bool,
}

impl IndexSpec {
    pub fn ascending(field: &str) -> Self {
        Self {
            field: field.to_string(),
            unique: false,
        }
    }

    pub fn unique(field: &str) -> Self {
        Self {
            field: field.to_string(),
            unique: true,
        }
    }

    /// The index name MongoDB derives for a single ascending key.
    pub fn name(&self) -> String {
        format!("{}_1", self.field)
    }
}

/// A target collection and the indexes it must carry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSpec {
    /// The `characters` collection: unique on the stable identifier, plus the
    /// lookup fields queries filter on.
    pub fn characters() -> Self {
        Self {
            name: CHARACTERS_COLLECTION.to_string(),
            indexes: vec![
                IndexSpec::unique(ID_FIELD),
                IndexSpec::ascending("name"),
                IndexSpec::ascending("house"),
                IndexSpec::ascending("ancestry"),
                IndexSpec::ascending("wand.core"),
                IndexSpec::ascending("year_of_birth"),
            ],
        }
    }
}

/// Every collection the pipeline manages.
pub fn pipeline_collections() -> Vec<CollectionSpec> {
    vec![CollectionSpec::characters()]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// A document with the same key and identical content already existed.
    Unchanged,
}

/// The operations the pipeline needs from a document database.
///
/// Implementations map unreachable-server failures to
/// `EtlError::StoreConnection` and everything else to `EtlError::StoreWrite`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// A human readable name for logs (e.g. "MongoDB").
    fn name(&self) -> &str;

    async fn ping(&self) -> Result<(), EtlError>;

    async fn list_collections(&self) -> Result<Vec<String>, EtlError>;

    async fn create_collection(&self, name: &str) -> Result<(), EtlError>;

    /// Index names present on `collection`.
    async fn list_indexes(&self, collection: &str) -> Result<Vec<String>, EtlError>;

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<(), EtlError>;

    /// Replaces the document whose `key_field` equals the one in `document`,
    /// inserting it if none exists.
    async fn upsert(
        &self,
        collection: &str,
        key_field: &str,
        document: Document,
    ) -> Result<UpsertOutcome, EtlError>;

    /// Deletes every document in `collection`, returning how many were removed.
    async fn delete_all(&self, collection: &str) -> Result<u64, EtlError>;

    async fn count(&self, collection: &str) -> Result<u64, EtlError>;

    async fn drop_collection(&self, collection: &str) -> Result<(), EtlError>;

    /// Releases the connection. Any later call on this store may fail.
    async fn close(&self) {}
}
