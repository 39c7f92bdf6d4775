//! Error type for cache handler operations.

use edge_core::ConfigurationError;
use edge_data::StoreError;

use crate::codec::EncodingError;
use crate::revalidate::PurgeError;

/// Errors surfaced by the cache handler.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error(transparent)]
    Purge(#[from] PurgeError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

/// Result type for cache handler operations.
pub type CacheResult<T> = Result<T, CacheError>;
