//! Error types for the cache core

use thiserror::Error;

/// Errors raised by cache operations.
///
/// Staleness and lock contention are not errors: stale entries are evicted
/// silently and a lock timeout is reported through [`AddOutcome`](crate::AddOutcome).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// Programmer error: an empty cache key
    #[error("cache key must not be empty")]
    InvalidKey,

    /// The entry store could not serve the request
    #[error("entry store unavailable: {0}")]
    StoreUnavailable(String),

    /// An invalidation event could not be published
    #[error("failed to publish invalidation event on channel '{channel}': {reason}")]
    Propagation { channel: String, reason: String },

    /// An inbound event could not be translated into cache keys
    #[error("failed to translate invalidation event: {0}")]
    Translation(String),

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Result alias used throughout the crate
pub type Result<T, E = CacheError> = std::result::Result<T, E>;
