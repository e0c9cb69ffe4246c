use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or saving persisted state
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing file failed
    #[error("state file {path}: {source}")]
    Io {
        /// File that could not be accessed
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored bytes could not be decoded, or state could not be encoded
    #[error("state serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}
