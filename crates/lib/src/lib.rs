//! # hpetl: Core Pipeline Types
//!
//! This crate holds everything the three pipeline stages (extract, transform,
//! load) share: the record types, snapshot file handling, the error taxonomy,
//! retry settings, configuration loading, and the `DocumentStore` abstraction
//! the load stage writes through.

pub mod config;
pub mod constants;
pub mod errors;
pub mod records;
pub mod retry;
pub mod snapshot;
pub mod stage;
pub mod store;

pub use config::{get_config, ConfigError, EtlConfig, ValidationPolicy};
pub use errors::EtlError;
pub use records::{Character, RawRecord, Wand};
pub use retry::RetryConfig;
pub use stage::{LoadCounts, Stage, StageKind, StageReport};
pub use store::{CollectionSpec, Document, DocumentStore, IndexSpec, UpsertOutcome};
