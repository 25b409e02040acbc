//! The key-value cache contract

use std::time::Duration;

use async_trait::async_trait;

use crate::error::CacheResult;

/// One command inside an atomic pipeline
///
/// Pipelines execute all-or-nothing; the session registry relies on this to
/// keep `session:<sid>` and `user_sessions:<uid>` in step.
#[derive(Debug, Clone)]
pub enum KvOp {
    /// Write a string value with a TTL
    SetEx {
        /// Key to write
        key: String,
        /// Value to store
        value: String,
        /// Time to live
        ttl: Duration,
    },
    /// Delete a key
    Del {
        /// Key to delete
        key: String,
    },
    /// Add a member to a set
    SAdd {
        /// Set key
        key: String,
        /// Member to add
        member: String,
    },
    /// Remove a member from a set
    SRem {
        /// Set key
        key: String,
        /// Member to remove
        member: String,
    },
    /// Reset a key's TTL
    Expire {
        /// Key to touch
        key: String,
        /// New time to live
        ttl: Duration,
    },
}

/// TTL-bearing key-value store used for sessions, OAuth state and the
/// token denylist
///
/// All operations are bounded by the backend's per-operation deadline so a
/// stalled cache cannot hold a request open past its own timeout.
#[async_trait]
pub trait KvCache: Send + Sync + std::fmt::Debug {
    /// Read a string value
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;

    /// Write a string value with a TTL
    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()>;

    /// Delete a key, reporting whether it existed
    async fn del(&self, key: &str) -> CacheResult<bool>;

    /// Atomically read and delete a key
    ///
    /// This is the single-use primitive: exactly one caller observes the
    /// value, every later caller observes `None`.
    async fn get_del(&self, key: &str) -> CacheResult<Option<String>>;

    /// Add a member to a set
    async fn sadd(&self, key: &str, member: &str) -> CacheResult<()>;

    /// Remove a member from a set
    async fn srem(&self, key: &str, member: &str) -> CacheResult<()>;

    /// List all members of a set
    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>>;

    /// Reset a key's TTL
    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<()>;

    /// Remaining TTL of a key, `None` when the key is missing or unbounded
    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>>;

    /// Execute several commands atomically
    async fn pipeline(&self, ops: Vec<KvOp>) -> CacheResult<()>;
}
