//! In-process backend for the cache contract
//!
//! Holds the same contract as Redis inside one process: string keys,
//! member sets, per-key expiry, and atomic pipelines under a single lock.
//! Suitable for tests and for deployments explicitly pinned to a single
//! instance; state does not survive the process and is invisible to any
//! other replica.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::CacheResult;
use crate::kv::{KvCache, KvOp};

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// In-memory [`KvCache`]
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryKv {
    /// Create an empty in-memory cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop all expired entries, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired(now));
        before - entries.len()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// Whether the cache holds no live entries
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply(entries: &mut HashMap<String, Entry>, op: KvOp, now: Instant) {
        match op {
            KvOp::SetEx { key, value, ttl } => {
                entries.insert(
                    key,
                    Entry {
                        value: Value::Str(value),
                        expires_at: Some(now + ttl),
                    },
                );
            }
            KvOp::Del { key } => {
                entries.remove(&key);
            }
            KvOp::SAdd { key, member } => {
                let entry = entries.entry(key).or_insert_with(|| Entry {
                    value: Value::Set(HashSet::new()),
                    expires_at: None,
                });
                if entry.is_expired(now) {
                    entry.value = Value::Set(HashSet::new());
                    entry.expires_at = None;
                }
                match &mut entry.value {
                    Value::Set(set) => {
                        set.insert(member);
                    }
                    Value::Str(_) => {
                        entry.value = Value::Set(HashSet::from([member]));
                    }
                }
            }
            KvOp::SRem { key, member } => {
                if let Some(Entry {
                    value: Value::Set(set),
                    ..
                }) = entries.get_mut(&key)
                {
                    set.remove(&member);
                }
            }
            KvOp::Expire { key, ttl } => {
                if let Some(entry) = entries.get_mut(&key) {
                    entry.expires_at = Some(now + ttl);
                }
            }
        }
    }
}

#[async_trait]
impl KvCache for MemoryKv {
    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        let entries = self.entries.lock();
        Ok(entries.get(key).and_then(|entry| {
            if entry.is_expired(now) {
                return None;
            }
            match &entry.value {
                Value::Str(s) => Some(s.clone()),
                Value::Set(_) => None,
            }
        }))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let mut entries = self.entries.lock();
        Self::apply(
            &mut entries,
            KvOp::SetEx {
                key: key.to_string(),
                value: value.to_string(),
                ttl,
            },
            Instant::now(),
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> CacheResult<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        match entries.remove(key) {
            Some(entry) => Ok(!entry.is_expired(now)),
            None => Ok(false),
        }
    }

    async fn get_del(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Ok(entries.remove(key).and_then(|entry| {
            if entry.is_expired(now) {
                return None;
            }
            match entry.value {
                Value::Str(s) => Some(s),
                Value::Set(_) => None,
            }
        }))
    }

    async fn sadd(&self, key: &str, member: &str) -> CacheResult<()> {
        let mut entries = self.entries.lock();
        Self::apply(
            &mut entries,
            KvOp::SAdd {
                key: key.to_string(),
                member: member.to_string(),
            },
            Instant::now(),
        );
        Ok(())
    }

    async fn srem(&self, key: &str, member: &str) -> CacheResult<()> {
        let mut entries = self.entries.lock();
        Self::apply(
            &mut entries,
            KvOp::SRem {
                key: key.to_string(),
                member: member.to_string(),
            },
            Instant::now(),
        );
        Ok(())
    }

    async fn smembers(&self, key: &str) -> CacheResult<Vec<String>> {
        let now = Instant::now();
        let entries = self.entries.lock();
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| match &entry.value {
                Value::Set(set) => set.iter().cloned().collect(),
                Value::Str(_) => Vec::new(),
            })
            .unwrap_or_default())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> CacheResult<()> {
        let mut entries = self.entries.lock();
        Self::apply(
            &mut entries,
            KvOp::Expire {
                key: key.to_string(),
                ttl,
            },
            Instant::now(),
        );
        Ok(())
    }

    async fn ttl(&self, key: &str) -> CacheResult<Option<Duration>> {
        let now = Instant::now();
        let entries = self.entries.lock();
        Ok(entries
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .and_then(|entry| entry.expires_at)
            .map(|deadline| deadline.saturating_duration_since(now)))
    }

    async fn pipeline(&self, ops: Vec<KvOp>) -> CacheResult<()> {
        // One lock acquisition covers every op - the in-process equivalent
        // of MULTI/EXEC.
        let now = Instant::now();
        let mut entries = self.entries.lock();
        for op in ops {
            Self::apply(&mut entries, op, now);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_roundtrip() {
        let kv = MemoryKv::new();
        kv.set_ex("k", "v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_expired_entry_is_gone() {
        let kv = MemoryKv::new();
        kv.set_ex("k", "v", Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(kv.get("k").await.unwrap(), None);
        assert!(!kv.del("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_del_reports_existence() {
        let kv = MemoryKv::new();
        kv.set_ex("k", "v", Duration::from_secs(60)).await.unwrap();
        assert!(kv.del("k").await.unwrap());
        assert!(!kv.del("k").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_del_is_single_use() {
        let kv = MemoryKv::new();
        kv.set_ex("state", "ticket", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(kv.get_del("state").await.unwrap(), Some("ticket".into()));
        assert_eq!(kv.get_del("state").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_set_membership() {
        let kv = MemoryKv::new();
        kv.sadd("sids", "a").await.unwrap();
        kv.sadd("sids", "b").await.unwrap();
        kv.srem("sids", "a").await.unwrap();
        assert_eq!(kv.smembers("sids").await.unwrap(), vec!["b".to_string()]);
    }

    #[tokio::test]
    async fn test_pipeline_applies_all_ops() {
        let kv = MemoryKv::new();
        kv.pipeline(vec![
            KvOp::SetEx {
                key: "session:s1".into(),
                value: "{}".into(),
                ttl: Duration::from_secs(60),
            },
            KvOp::SAdd {
                key: "user_sessions:u1".into(),
                member: "s1".into(),
            },
            KvOp::Expire {
                key: "user_sessions:u1".into(),
                ttl: Duration::from_secs(60),
            },
        ])
        .await
        .unwrap();
        assert_eq!(kv.get("session:s1").await.unwrap(), Some("{}".into()));
        assert_eq!(
            kv.smembers("user_sessions:u1").await.unwrap(),
            vec!["s1".to_string()]
        );
        assert!(kv.ttl("user_sessions:u1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let kv = MemoryKv::new();
        kv.set_ex("a", "1", Duration::from_millis(5)).await.unwrap();
        kv.set_ex("b", "2", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(kv.purge_expired(), 1);
        assert_eq!(kv.len(), 1);
    }
}
