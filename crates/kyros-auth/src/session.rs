//! Server-side session registry
//!
//! Sessions are the durable record of an authenticated device binding,
//! independent of bearer-token lifetime. Two key shapes in the cache:
//!
//! - `session:<sid>` - the session document, JSON, TTL = session lifetime
//! - `user_sessions:<uid>` - set of the user's session ids, same TTL
//!
//! Writes that touch both keys go through one atomic pipeline so the set
//! never references a session that was only half-created or half-revoked.
//! `touch` is last-writer-wins; concurrent requests racing on
//! `last_active` are harmless.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kyros_cache::{KvCache, KvOp};
use kyros_crypto::random;

use crate::error::AuthResult;

/// A server-side session document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Opaque 128-bit id, base64url
    pub id: String,
    /// Owning user
    pub user_id: Uuid,
    /// Coarse device descriptor derived from the user agent
    pub device: String,
    /// Client IP at creation
    pub ip: String,
    /// Full user agent at creation
    pub user_agent: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last observed activity
    pub last_active: DateTime<Utc>,
    /// Hard expiry
    pub expires_at: DateTime<Utc>,
}

/// Cache-backed session registry
#[derive(Clone)]
pub struct SessionRegistry {
    kv: Arc<dyn KvCache>,
    ttl: Duration,
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("ttl", &self.ttl)
            .finish()
    }
}

fn session_key(sid: &str) -> String {
    format!("session:{sid}")
}

fn user_key(uid: Uuid) -> String {
    format!("user_sessions:{uid}")
}

impl SessionRegistry {
    /// Build a registry over a cache with the given session TTL
    pub fn new(kv: Arc<dyn KvCache>, ttl: Duration) -> Self {
        Self { kv, ttl }
    }

    /// Create a session for a freshly authenticated device
    pub async fn create(
        &self,
        user_id: Uuid,
        device: &str,
        ip: &str,
        user_agent: &str,
    ) -> AuthResult<Session> {
        let now = Utc::now();
        let session = Session {
            id: random::session_id(),
            user_id,
            device: device.to_string(),
            ip: ip.to_string(),
            user_agent: user_agent.to_string(),
            created_at: now,
            last_active: now,
            expires_at: now
                + chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::zero()),
        };

        let payload = serde_json::to_string(&session)?;
        self.kv
            .pipeline(vec![
                KvOp::SetEx {
                    key: session_key(&session.id),
                    value: payload,
                    ttl: self.ttl,
                },
                KvOp::SAdd {
                    key: user_key(user_id),
                    member: session.id.clone(),
                },
                KvOp::Expire {
                    key: user_key(user_id),
                    ttl: self.ttl,
                },
            ])
            .await?;

        Ok(session)
    }

    /// Look up a session by id
    pub async fn get(&self, sid: &str) -> AuthResult<Option<Session>> {
        let Some(payload) = self.kv.get(&session_key(sid)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&payload)?))
    }

    /// Record activity on a session, preserving its remaining TTL
    ///
    /// Tolerant of races: the last writer wins, and a session that expired
    /// between read and write is simply gone.
    pub async fn touch(&self, sid: &str) -> AuthResult<()> {
        let key = session_key(sid);
        let Some(mut session) = self.get(sid).await? else {
            return Ok(());
        };
        session.last_active = Utc::now();

        let remaining = self.kv.ttl(&key).await?.unwrap_or(self.ttl);
        let payload = serde_json::to_string(&session)?;
        self.kv.set_ex(&key, &payload, remaining).await?;
        Ok(())
    }

    /// Enumerate a user's live sessions, pruning stale set entries
    pub async fn list(&self, user_id: Uuid) -> AuthResult<Vec<Session>> {
        let sids = self.kv.smembers(&user_key(user_id)).await?;
        let mut sessions = Vec::with_capacity(sids.len());
        for sid in sids {
            match self.get(&sid).await? {
                Some(session) => sessions.push(session),
                None => {
                    // Session expired out from under its set entry.
                    self.kv.srem(&user_key(user_id), &sid).await?;
                }
            }
        }
        sessions.sort_by(|a, b| b.last_active.cmp(&a.last_active));
        Ok(sessions)
    }

    /// Revoke one session belonging to the user
    ///
    /// Returns whether a session was actually removed.
    pub async fn revoke(&self, sid: &str, user_id: Uuid) -> AuthResult<bool> {
        let Some(session) = self.get(sid).await? else {
            return Ok(false);
        };
        if session.user_id != user_id {
            return Ok(false);
        }
        self.kv
            .pipeline(vec![
                KvOp::Del {
                    key: session_key(sid),
                },
                KvOp::SRem {
                    key: user_key(user_id),
                    member: sid.to_string(),
                },
            ])
            .await?;
        Ok(true)
    }

    /// Revoke every session except the one to keep
    ///
    /// Returns how many sessions were removed.
    pub async fn revoke_all_except(&self, user_id: Uuid, keep_sid: &str) -> AuthResult<usize> {
        let sids = self.kv.smembers(&user_key(user_id)).await?;
        let mut removed = 0;
        for sid in sids {
            if sid == keep_sid {
                continue;
            }
            if self.revoke(&sid, user_id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Revoke every session and the set itself
    pub async fn revoke_all(&self, user_id: Uuid) -> AuthResult<usize> {
        let sids = self.kv.smembers(&user_key(user_id)).await?;
        let removed = sids.len();
        let mut ops: Vec<KvOp> = sids
            .into_iter()
            .map(|sid| KvOp::Del {
                key: session_key(&sid),
            })
            .collect();
        ops.push(KvOp::Del {
            key: user_key(user_id),
        });
        self.kv.pipeline(ops).await?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyros_cache::MemoryKv;

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(MemoryKv::new()), Duration::from_secs(3600))
    }

    #[tokio::test]
    async fn test_create_then_get() {
        let registry = registry();
        let uid = Uuid::new_v4();
        let session = registry
            .create(uid, "Firefox on Linux", "10.0.0.1", "Mozilla/5.0")
            .await
            .unwrap();

        let fetched = registry.get(&session.id).await.unwrap().unwrap();
        assert_eq!(fetched.user_id, uid);
        assert_eq!(fetched.ip, "10.0.0.1");
        assert!(fetched.expires_at > fetched.created_at);
    }

    #[tokio::test]
    async fn test_list_contains_all_devices() {
        let registry = registry();
        let uid = Uuid::new_v4();
        registry.create(uid, "a", "1.1.1.1", "ua-a").await.unwrap();
        registry.create(uid, "b", "2.2.2.2", "ua-b").await.unwrap();
        assert_eq!(registry.list(uid).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_revoke_removes_from_list() {
        let registry = registry();
        let uid = Uuid::new_v4();
        let session = registry.create(uid, "a", "1.1.1.1", "ua").await.unwrap();
        assert!(registry.revoke(&session.id, uid).await.unwrap());

        let listed = registry.list(uid).await.unwrap();
        assert!(listed.iter().all(|s| s.id != session.id));
    }

    #[tokio::test]
    async fn test_revoke_rejects_foreign_session() {
        let registry = registry();
        let owner = Uuid::new_v4();
        let attacker = Uuid::new_v4();
        let session = registry.create(owner, "a", "1.1.1.1", "ua").await.unwrap();

        assert!(!registry.revoke(&session.id, attacker).await.unwrap());
        assert!(registry.get(&session.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_revoke_all_except_keeps_current() {
        let registry = registry();
        let uid = Uuid::new_v4();
        let keep = registry.create(uid, "a", "1.1.1.1", "ua").await.unwrap();
        registry.create(uid, "b", "2.2.2.2", "ua").await.unwrap();
        registry.create(uid, "c", "3.3.3.3", "ua").await.unwrap();

        let removed = registry.revoke_all_except(uid, &keep.id).await.unwrap();
        assert_eq!(removed, 2);

        let remaining = registry.list(uid).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }

    #[tokio::test]
    async fn test_revoke_all_clears_everything() {
        let registry = registry();
        let uid = Uuid::new_v4();
        registry.create(uid, "a", "1.1.1.1", "ua").await.unwrap();
        registry.create(uid, "b", "2.2.2.2", "ua").await.unwrap();

        assert_eq!(registry.revoke_all(uid).await.unwrap(), 2);
        assert!(registry.list(uid).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_touch_updates_last_active() {
        let registry = registry();
        let uid = Uuid::new_v4();
        let session = registry.create(uid, "a", "1.1.1.1", "ua").await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        registry.touch(&session.id).await.unwrap();

        let touched = registry.get(&session.id).await.unwrap().unwrap();
        assert!(touched.last_active > session.last_active);
    }

    #[tokio::test]
    async fn test_touch_missing_session_is_noop() {
        registry().touch("missing").await.unwrap();
    }
}
