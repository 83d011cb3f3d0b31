use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

use crate::errors::EtlError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StageKind {
    Extract,
    Transform,
    Load,
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StageKind::Extract => "extract",
            StageKind::Transform => "transform",
            StageKind::Load => "load",
        };
        f.write_str(name)
    }
}

/// Per-record outcome counts of a load run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadCounts {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// The summary a stage returns when it finishes successfully.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageReport {
    pub stage: StageKind,
    /// Where the stage read from (URL or snapshot path).
    pub source: String,
    /// Where the stage wrote to (snapshot path or collection).
    pub destination: String,
    pub records_read: usize,
    pub records_written: usize,
    /// Records dropped by validation or rejected by the store.
    pub records_skipped: usize,
    pub load: Option<LoadCounts>,
}

impl StageReport {
    pub fn new(stage: StageKind, source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            stage,
            source: source.into(),
            destination: destination.into(),
            records_read: 0,
            records_written: 0,
            records_skipped: 0,
            load: None,
        }
    }
}

/// A single batch step of the pipeline.
///
/// Implementations carry their own explicit inputs and outputs (paths, URLs,
/// store handles) so a stage never discovers them on its own.
#[async_trait]
pub trait Stage: Send + Sync {
    fn kind(&self) -> StageKind;

    async fn run(&self) -> Result<StageReport, EtlError>;
}
