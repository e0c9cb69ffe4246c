use thiserror::Error;
use tiergate_core::StoreError;

/// Cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Writing the persisted cache failed
    #[error("cache persistence: {0}")]
    Persistence(#[from] StoreError),
}
