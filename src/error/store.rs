use thiserror::Error;

/// Errors from the durable key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not determine a data directory")]
    NoDataDirectory,

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store contents are not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}
