//! Cache error types

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors produced by cache backends
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CacheError {
    /// Redis transport or protocol error
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Operation exceeded its deadline
    #[error("cache operation timed out after {timeout_ms}ms")]
    Timeout {
        /// Deadline that was exceeded, in milliseconds
        timeout_ms: u64,
    },
}
