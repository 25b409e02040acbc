//! Redis backend for the cache contract
//!
//! Runs over a [`redis::aio::ConnectionManager`], which multiplexes one
//! connection and reconnects on failure. Every operation is wrapped in a
//! per-operation deadline so a wedged Redis surfaces as
//! [`CacheError::Timeout`] instead of a hung request.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;

use crate::error::{CacheError, CacheResult};
use crate::kv::{KvCache, KvOp};

/// Default per-operation deadline
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(2);

/// Redis-backed [`KvCache`]
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
    op_timeout: Duration,
}

impl std::fmt::Debug for RedisKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisKv")
            .field("op_timeout", &self.op_timeout)
            .finish()
    }
}

impl RedisKv {
    /// Connect to Redis and build the cache backend
    pub async fn connect(url: &str) -> CacheResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self {
            conn,
            op_timeout: DEFAULT_OP_TIMEOUT,
        })
    }

    /// Override the per-operation deadline
    pub fn with_op_timeout(mut self, op_timeout: Duration) -> Self {
        self.op_timeout = op_timeout;
        self
    }

    async fn bounded<T, F>(&self, fut: F) -> CacheResult<T>
    where
        F: Future<Output = Result<T, redis::RedisError>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(CacheError::Timeout {
                timeout_ms: self.op_timeout.as_millis() as u64,
            }),
        }
    }
}

#[async_trait]
impl KvCache for RedisKv {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let mut conn = self.conn.clone();
        self.bounded(async move { conn.get(key).await }).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1);
        self.bounded(async move { conn.set_ex(key, value, seconds).await })
            .await
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = self.bounded(async move { conn.del(key).await }).await?;
        Ok(removed > 0)
    }

    async fn get_del(&self, key: &str) -> CacheResult<Option<String>> {
        // MULTI { GET key; DEL key } EXEC - the read and the delete commit
        // together, so a concurrent consumer cannot observe the same value.
        let mut conn = self.conn.clone();
        let (value, _removed): (Option<String>, i64) = self
            .bounded(async move {
                redis::pipe()
                    .atomic()
                    .get(key)
                    .del(key)
                    .query_async(&mut conn)
                    .await
            })
            .await?;
        Ok(value)
    }

    async fn sadd(&self, key: &str, member: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = self
            .bounded(async move { conn.sadd(key, member).await })
            .await?;
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = self
            .bounded(async move { conn.srem(key, member).await })
            .await?;
        Ok(())
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        let mut conn = self.conn.clone();
        self.bounded(async move { conn.smembers(key).await }).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let seconds = ttl.as_secs().max(1) as i64;
        let _: bool = self
            .bounded(async move { conn.expire(key, seconds).await })
            .await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let mut conn = self.conn.clone();
        let seconds: i64 = self.bounded(async move { conn.ttl(key).await }).await?;
        // -2 = missing key, -1 = no expiry
        if seconds >= 0 {
            Ok(Some(Duration::from_secs(seconds as u64)))
        } else {
            Ok(None)
        }
    }

    async fn pipeline(&self, ops: Vec<KvOp>) -> CacheResult<()> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in ops {
            match op {
                KvOp::SetEx { key, value, ttl } => {
                    pipe.set_ex(key, value, ttl.as_secs().max(1));
                }
                KvOp::Del { key } => {
                    pipe.del(key);
                }
                KvOp::SAdd { key, member } => {
                    pipe.sadd(key, member);
                }
                KvOp::SRem { key, member } => {
                    pipe.srem(key, member);
                }
                KvOp::Expire { key, ttl } => {
                    pipe.expire(key, ttl.as_secs().max(1) as i64);
                }
            }
        }
        self.bounded(async move { pipe.query_async::<()>(&mut conn).await })
            .await
    }
}
