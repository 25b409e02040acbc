//! # Kyros Cache - Ephemeral Key-Value Store Contract
//!
//! The gateway's OAuth state tickets, sessions, token denylist and
//! WebSocket admission tickets all live in a TTL-bearing key-value store.
//! This crate defines the [`KvCache`] contract and two backends:
//!
//! - [`RedisKv`] - production backend over a Redis connection manager
//! - [`MemoryKv`] - in-process backend for tests and explicitly
//!   single-instance deployments
//!
//! The cache is an *optional* dependency of the gateway: callers hold an
//! `Option<Arc<dyn KvCache>>` and degrade the affected feature when it is
//! absent.

pub mod error;
pub mod kv;
pub mod memory;
pub mod redis_kv;

pub use error::{CacheError, CacheResult};
pub use kv::{KvCache, KvOp};
pub use memory::MemoryKv;
pub use redis_kv::RedisKv;
