//! # MongoDB Store
//!
//! `DocumentStore` backed by the official `mongodb` driver.

use async_trait::async_trait;
use hpetl::{Document, DocumentStore, EtlError, IndexSpec, RetryConfig, UpsertOutcome};
use mongodb::bson::{self, doc};
use mongodb::error::{Error as MongoError, ErrorKind};
use mongodb::options::{ClientOptions, IndexOptions};
use mongodb::{Client, Collection, Database, IndexModel};
use thiserror::Error;
use tracing::info;

/// Custom error types for the MongoDB store.
#[derive(Error, Debug)]
pub enum MongoStoreError {
    #[error("MongoDB error: {0}")]
    Driver(#[from] MongoError),
    #[error("BSON conversion failed: {0}")]
    Bson(String),
}

impl From<MongoStoreError> for EtlError {
    fn from(err: MongoStoreError) -> Self {
        match &err {
            MongoStoreError::Driver(e) if is_connection_error(e) => {
                EtlError::StoreConnection(err.to_string())
            }
            _ => EtlError::StoreWrite(err.to_string()),
        }
    }
}

/// Errors that mean the server cannot be reached at all.
fn is_connection_error(err: &MongoError) -> bool {
    matches!(
        *err.kind,
        ErrorKind::ServerSelection { .. }
            | ErrorKind::Io(_)
            | ErrorKind::ConnectionPoolCleared { .. }
            | ErrorKind::DnsResolve { .. }
    )
}

pub struct MongoStore {
    client: Client,
    db: Database,
}

impl MongoStore {
    /// Connects to `uri` and verifies the server answers a ping.
    ///
    /// The ping is retried per `retry`; `connect_timeout_secs` bounds both
    /// the socket connect and server selection.
    pub async fn connect(
        uri: &str,
        database: &str,
        retry: &RetryConfig,
    ) -> Result<Self, EtlError> {
        let mut options = ClientOptions::parse(uri)
            .await
            .map_err(|e| EtlError::StoreConnection(format!("invalid connection string: {e}")))?;
        options.app_name = Some("hpetl".to_string());
        options.connect_timeout = Some(retry.connect_timeout());
        options.server_selection_timeout = Some(retry.connect_timeout());

        let client = Client::with_options(options)
            .map_err(|e| EtlError::StoreConnection(e.to_string()))?;
        let store = Self {
            db: client.database(database),
            client,
        };

        retry
            .run("MongoDB ping", || store.ping_once())
            .await
            .map_err(|e| EtlError::StoreConnection(e.to_string()))?;
        info!("Connected to MongoDB database '{database}'");
        Ok(store)
    }

    async fn ping_once(&self) -> Result<(), MongoStoreError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }

    fn collection(&self, name: &str) -> Collection<bson::Document> {
        self.db.collection(name)
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    fn name(&self) -> &str {
        "MongoDB"
    }

    async fn ping(&self) -> Result<(), EtlError> {
        Ok(self.ping_once().await?)
    }

    async fn list_collections(&self) -> Result<Vec<String>, EtlError> {
        Ok(self
            .db
            .list_collection_names()
            .await
            .map_err(MongoStoreError::from)?)
    }

    async fn create_collection(&self, name: &str) -> Result<(), EtlError> {
        self.db
            .create_collection(name)
            .await
            .map_err(MongoStoreError::from)?;
        Ok(())
    }

    async fn list_indexes(&self, collection: &str) -> Result<Vec<String>, EtlError> {
        Ok(self
            .collection(collection)
            .list_index_names()
            .await
            .map_err(MongoStoreError::from)?)
    }

    async fn create_index(&self, collection: &str, index: &IndexSpec) -> Result<(), EtlError> {
        let field = index.field.as_str();
        let model = IndexModel::builder()
            .keys(doc! { field: 1 })
            .options(
                IndexOptions::builder()
                    .name(index.name())
                    .unique(index.unique)
                    .build(),
            )
            .build();
        self.collection(collection)
            .create_index(model)
            .await
            .map_err(MongoStoreError::from)?;
        Ok(())
    }

    async fn upsert(
        &self,
        collection: &str,
        key_field: &str,
        document: Document,
    ) -> Result<UpsertOutcome, EtlError> {
        let key = document.get(key_field).cloned().ok_or_else(|| {
            EtlError::StoreWrite(format!("document has no '{key_field}' field"))
        })?;
        let key = bson::to_bson(&key).map_err(|e| MongoStoreError::Bson(e.to_string()))?;
        let replacement =
            bson::to_document(&document).map_err(|e| MongoStoreError::Bson(e.to_string()))?;

        let result = self
            .collection(collection)
            .replace_one(doc! { key_field: key }, replacement)
            .upsert(true)
            .await
            .map_err(MongoStoreError::from)?;

        Ok(if result.upserted_id.is_some() {
            UpsertOutcome::Inserted
        } else if result.modified_count > 0 {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Unchanged
        })
    }

    async fn delete_all(&self, collection: &str) -> Result<u64, EtlError> {
        let result = self
            .collection(collection)
            .delete_many(doc! {})
            .await
            .map_err(MongoStoreError::from)?;
        Ok(result.deleted_count)
    }

    async fn count(&self, collection: &str) -> Result<u64, EtlError> {
        Ok(self
            .collection(collection)
            .count_documents(doc! {})
            .await
            .map_err(MongoStoreError::from)?)
    }

    async fn drop_collection(&self, collection: &str) -> Result<(), EtlError> {
        self.collection(collection)
            .drop()
            .await
            .map_err(MongoStoreError::from)?;
        Ok(())
    }

    async fn close(&self) {
        // Shutting down a clone closes the pool shared by every handle.
        self.client.clone().shutdown().await;
        info!("MongoDB connection closed");
    }
}
