//! # `hpetl-load`: Store Setup and Load Stage
//!
//! Creates the target collections and indexes, and upserts the transformed
//! snapshot into the document store. All logic is written against the
//! `DocumentStore` trait; `MongoStore` is the production implementation.

pub mod loader;
pub mod mongo;
pub mod setup;

pub use loader::{load_characters, load_snapshot, LoadOptions, LoadStage};
pub use mongo::{MongoStore, MongoStoreError};
pub use setup::{drop_collections, setup_store, SetupReport};
