use thiserror::Error;

/// The error type shared by every pipeline stage.
///
/// Stage crates map their specific errors (HTTP, BSON, validation) into these
/// variants so the CLI can report failures uniformly.
#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Network request failed: {0}")]
    Network(String),

    #[error("Failed to parse content: {0}")]
    Parse(String),

    #[error("Record failed validation: {0}")]
    Validation(String),

    #[error("Could not connect to the document store: {0}")]
    StoreConnection(String),

    #[error("Failed to write to the document store: {0}")]
    StoreWrite(String),

    #[error("Stage precondition not met: {0}")]
    Precondition(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("An unexpected internal error occurred: {0}")]
    Internal(#[from] anyhow::Error),
}

impl EtlError {
    /// Whether the error must abort the whole stage.
    ///
    /// Only `StoreWrite` is scoped to a single record; `Validation` is decided
    /// by the transform policy before it ever becomes an `EtlError`.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, EtlError::StoreWrite(_))
    }
}

impl From<serde_json::Error> for EtlError {
    fn from(err: serde_json::Error) -> Self {
        EtlError::Parse(err.to_string())
    }
}
