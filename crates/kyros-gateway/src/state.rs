//! Shared application state
//!
//! One [`AppState`] is built at startup and cloned into every request. All
//! fields are cheap clones (Arcs or small handles); the heavy resources
//! behind them (connection pools, provider clients, limiter maps) are
//! shared.

use std::sync::Arc;

use kyros_auth::{OAuthBroker, SessionRegistry, TokenCodec};
use kyros_cache::KvCache;
use kyros_crypto::{Aead, Totp};
use kyros_store::{ProjectStore, User, UserStore};

use crate::config::GatewayConfig;
use crate::error::ApiError;
use crate::middleware::csrf::CsrfStore;
use crate::middleware::rate_limit::SlidingWindowLimiter;

/// The authenticated user attached to a request by the auth middleware
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Everything handlers and middleware need, cloned per request
#[derive(Clone)]
pub struct AppState {
    /// Startup configuration
    pub config: Arc<GatewayConfig>,
    /// User queries
    pub users: Arc<dyn UserStore>,
    /// Project/task queries
    pub projects: Arc<dyn ProjectStore>,
    /// Optional key-value cache; absence degrades features
    pub kv: Option<Arc<dyn KvCache>>,
    /// Bearer-token codec
    pub tokens: TokenCodec,
    /// Session registry, present only with a cache
    pub sessions: Option<SessionRegistry>,
    /// OAuth broker
    pub oauth: Arc<OAuthBroker>,
    /// TOTP helper bound to the configured issuer
    pub totp: Totp,
    /// At-rest encryption for MFA secrets and provider tokens
    pub aead: Aead,
    /// Server-side CSRF token table
    pub csrf: Arc<CsrfStore>,
    /// General sliding-window limiter
    pub limiter: Arc<SlidingWindowLimiter>,
    /// MFA-specific limiter (5 per 5 minutes)
    pub mfa_limiter: Arc<SlidingWindowLimiter>,
    /// Outbound client for the reverse proxy
    pub proxy_client: reqwest::Client,
}

impl AppState {
    /// Assemble the state from configuration and backends
    ///
    /// Backends are injected so tests can run the full router over the
    /// in-memory store and cache.
    pub fn build(
        config: GatewayConfig,
        users: Arc<dyn UserStore>,
        projects: Arc<dyn ProjectStore>,
        kv: Option<Arc<dyn KvCache>>,
    ) -> anyhow::Result<Self> {
        let mut tokens = TokenCodec::new(
            &config.jwt_secret,
            config.env == crate::config::Environment::Production,
        );
        if let Some(kv) = &kv {
            tokens = tokens.with_denylist(kv.clone());
        }

        let sessions = kv
            .as_ref()
            .map(|kv| SessionRegistry::new(kv.clone(), config.session_ttl));

        let oauth = Arc::new(OAuthBroker::new(config.providers.clone(), kv.clone())?);

        let aead = match &config.token_encryption_key {
            Some(key) => Aead::new(key)?,
            None => Aead::disabled(),
        };

        let limiter = Arc::new(SlidingWindowLimiter::new(
            config.rate_limit_rpm as usize,
            std::time::Duration::from_secs(60),
        ));
        let mfa_limiter = Arc::new(SlidingWindowLimiter::new(
            5,
            std::time::Duration::from_secs(5 * 60),
        ));

        Ok(Self {
            totp: Totp::new(config.mfa_issuer.clone()),
            config: Arc::new(config),
            users,
            projects,
            kv,
            tokens,
            sessions,
            oauth,
            aead,
            csrf: Arc::new(CsrfStore::default()),
            limiter,
            mfa_limiter,
            proxy_client: reqwest::Client::new(),
        })
    }

    /// The session registry, or the documented 503 when the cache is absent
    pub fn sessions_or_unavailable(&self) -> Result<&SessionRegistry, ApiError> {
        self.sessions
            .as_ref()
            .ok_or_else(|| ApiError::unavailable("session tracking requires the cache backend"))
    }
}
