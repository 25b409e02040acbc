//! Bearer token minting and verification
//!
//! Tokens are HMAC-SHA256 JWTs carrying the subject id, subject email, an
//! explicit `kind` claim and a `jti` for revocation. The kind claim is the
//! defence against refresh-for-access confusion: every verification names
//! the kind it expects and anything else is rejected. Only HMAC algorithms
//! are accepted; `none` and asymmetric headers fail before signature
//! checking.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, decode_header, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use kyros_cache::KvCache;

use crate::error::{AuthError, AuthResult};

/// Tolerated clock skew for future-dated `iat`, in seconds
const IAT_LEEWAY_SECS: i64 = 30;

/// Denylist key prefix
const DENYLIST_PREFIX: &str = "token_denylist:";

/// The two token kinds the gateway issues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    /// Short-lived credential for resource requests
    Access,
    /// Longer-lived credential exchangeable for a new access token
    Refresh,
}

impl std::fmt::Display for TokenKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Access => f.write_str("access"),
            Self::Refresh => f.write_str("refresh"),
        }
    }
}

/// Claims carried by every gateway token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject user id
    pub sub: Uuid,
    /// Subject email at issuance time
    pub email: String,
    /// Token kind (`access` / `refresh`)
    pub kind: TokenKind,
    /// Token id, used by the revocation denylist
    pub jti: String,
    /// Issued-at, unix seconds
    pub iat: i64,
    /// Expires-at, unix seconds
    pub exp: i64,
}

impl Claims {
    /// Seconds until expiry, clamped at zero
    pub fn remaining(&self) -> Duration {
        let secs = self.exp - Utc::now().timestamp();
        Duration::from_secs(secs.max(0) as u64)
    }
}

/// Signs, parses and verifies bearer tokens
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    secret_is_empty: bool,
    production: bool,
    denylist: Option<Arc<dyn KvCache>>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("production", &self.production)
            .field("denylist", &self.denylist.is_some())
            .finish()
    }
}

impl TokenCodec {
    /// Create a codec over an HMAC secret
    pub fn new(secret: &str, production: bool) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            secret_is_empty: secret.is_empty(),
            production,
            denylist: None,
        }
    }

    /// Attach a cache for the revocation denylist
    ///
    /// Without one the denylist is treated as empty.
    pub fn with_denylist(mut self, kv: Arc<dyn KvCache>) -> Self {
        self.denylist = Some(kv);
        self
    }

    /// Mint a token of the given kind
    pub fn mint(
        &self,
        kind: TokenKind,
        user_id: Uuid,
        email: &str,
        ttl: Duration,
    ) -> AuthResult<String> {
        if self.secret_is_empty && self.production {
            return Err(AuthError::MissingSecret);
        }

        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            email: email.to_string(),
            kind,
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + ttl.as_secs() as i64,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            AuthError::InvalidToken {
                reason: format!("signing failed: {e}"),
            }
        })
    }

    /// Verify a token and assert its kind
    pub async fn verify(&self, token: &str, expected: TokenKind) -> AuthResult<Claims> {
        // Algorithm pinning happens on the raw header, before any signature
        // work: `none` and asymmetric algs never reach the verifier.
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken {
            reason: format!("malformed header: {e}"),
        })?;
        if !matches!(header.alg, Algorithm::HS256) {
            return Err(AuthError::InvalidToken {
                reason: format!("algorithm {:?} is not accepted", header.alg),
            });
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;

        let data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken {
                    reason: e.to_string(),
                },
            }
        })?;
        let claims = data.claims;

        if claims.iat > Utc::now().timestamp() + IAT_LEEWAY_SECS {
            return Err(AuthError::InvalidToken {
                reason: "token issued in the future".to_string(),
            });
        }

        if claims.kind != expected {
            return Err(AuthError::WrongTokenKind {
                expected: expected.to_string(),
                actual: claims.kind.to_string(),
            });
        }

        if let Some(kv) = &self.denylist
            && kv
                .get(&format!("{DENYLIST_PREFIX}{}", claims.jti))
                .await?
                .is_some()
        {
            return Err(AuthError::TokenRevoked);
        }

        Ok(claims)
    }

    /// Denylist a token id for the remainder of its lifetime
    ///
    /// A no-op without a cache; logout stays best-effort.
    pub async fn revoke(&self, claims: &Claims) -> AuthResult<()> {
        let Some(kv) = &self.denylist else {
            return Ok(());
        };
        let remaining = claims.remaining();
        if remaining.is_zero() {
            return Ok(());
        }
        kv.set_ex(&format!("{DENYLIST_PREFIX}{}", claims.jti), "1", remaining)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kyros_cache::MemoryKv;

    fn codec() -> TokenCodec {
        TokenCodec::new("a-test-secret-that-is-long-enough", false)
    }

    fn user() -> (Uuid, &'static str) {
        (Uuid::new_v4(), "o@x.io")
    }

    #[tokio::test]
    async fn test_mint_verify_roundtrip() {
        let codec = codec();
        let (id, email) = user();
        let token = codec
            .mint(TokenKind::Access, id, email, Duration::from_secs(900))
            .unwrap();
        let claims = codec.verify(&token, TokenKind::Access).await.unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.email, email);
        assert_eq!(claims.kind, TokenKind::Access);
    }

    #[tokio::test]
    async fn test_kind_confusion_rejected_both_ways() {
        let codec = codec();
        let (id, email) = user();
        let access = codec
            .mint(TokenKind::Access, id, email, Duration::from_secs(900))
            .unwrap();
        let refresh = codec
            .mint(TokenKind::Refresh, id, email, Duration::from_secs(900))
            .unwrap();

        assert!(matches!(
            codec.verify(&refresh, TokenKind::Access).await,
            Err(AuthError::WrongTokenKind { .. })
        ));
        assert!(matches!(
            codec.verify(&access, TokenKind::Refresh).await,
            Err(AuthError::WrongTokenKind { .. })
        ));
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let codec = codec();
        let (id, email) = user();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: id,
            email: email.to_string(),
            kind: TokenKind::Access,
            jti: Uuid::new_v4().to_string(),
            iat: now - 120,
            exp: now - 1,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"a-test-secret-that-is-long-enough"),
        )
        .unwrap();
        assert!(matches!(
            codec.verify(&token, TokenKind::Access).await,
            Err(AuthError::TokenExpired)
        ));
    }

    #[tokio::test]
    async fn test_future_dated_token_rejected() {
        let codec = codec();
        let (id, email) = user();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: id,
            email: email.to_string(),
            kind: TokenKind::Access,
            jti: Uuid::new_v4().to_string(),
            iat: now + 3600,
            exp: now + 7200,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(b"a-test-secret-that-is-long-enough"),
        )
        .unwrap();
        assert!(matches!(
            codec.verify(&token, TokenKind::Access).await,
            Err(AuthError::InvalidToken { .. })
        ));
    }

    #[tokio::test]
    async fn test_wrong_signature_rejected() {
        let other = TokenCodec::new("a-different-secret-entirely-here", false);
        let (id, email) = user();
        let token = other
            .mint(TokenKind::Access, id, email, Duration::from_secs(900))
            .unwrap();
        assert!(matches!(
            codec().verify(&token, TokenKind::Access).await,
            Err(AuthError::InvalidToken { .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_secret_refused_in_production() {
        let codec = TokenCodec::new("", true);
        let (id, email) = user();
        assert!(matches!(
            codec.mint(TokenKind::Access, id, email, Duration::from_secs(900)),
            Err(AuthError::MissingSecret)
        ));
    }

    #[tokio::test]
    async fn test_revoked_token_rejected_when_cache_present() {
        let kv = Arc::new(MemoryKv::new());
        let codec = codec().with_denylist(kv);
        let (id, email) = user();
        let token = codec
            .mint(TokenKind::Access, id, email, Duration::from_secs(900))
            .unwrap();

        let claims = codec.verify(&token, TokenKind::Access).await.unwrap();
        codec.revoke(&claims).await.unwrap();

        assert!(matches!(
            codec.verify(&token, TokenKind::Access).await,
            Err(AuthError::TokenRevoked)
        ));
    }

    #[tokio::test]
    async fn test_revoke_without_cache_is_noop() {
        let codec = codec();
        let (id, email) = user();
        let token = codec
            .mint(TokenKind::Access, id, email, Duration::from_secs(900))
            .unwrap();
        let claims = codec.verify(&token, TokenKind::Access).await.unwrap();
        codec.revoke(&claims).await.unwrap();
        // Denylist treated as empty - the token still verifies.
        assert!(codec.verify(&token, TokenKind::Access).await.is_ok());
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        assert!(matches!(
            codec().verify("not.a.jwt", TokenKind::Access).await,
            Err(AuthError::InvalidToken { .. })
        ));
    }
}
