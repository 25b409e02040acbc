//! Auth error types

/// Result type for auth operations
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors produced by the authentication engine
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AuthError {
    /// Token failed structural or signature validation
    #[error("invalid token: {reason}")]
    InvalidToken {
        /// What made the token unusable
        reason: String,
    },

    /// Token is past its expiry
    #[error("token expired")]
    TokenExpired,

    /// Token kind does not match the endpoint's expectation
    #[error("wrong token kind: expected {expected}, got {actual}")]
    WrongTokenKind {
        /// Kind the endpoint requires
        expected: String,
        /// Kind the token carries
        actual: String,
    },

    /// Token id is on the revocation denylist
    #[error("token revoked")]
    TokenRevoked,

    /// Signing secret is empty in an environment that requires one
    #[error("signing secret is not configured")]
    MissingSecret,

    /// Named provider is not registered
    #[error("unknown OAuth provider: {name}")]
    UnknownProvider {
        /// Provider name as received from the client
        name: String,
    },

    /// Provider settings are unusable (bad URL, bad redirect)
    #[error("provider configuration error: {reason}")]
    ProviderConfig {
        /// What was wrong with the configuration
        reason: String,
    },

    /// OAuth state was missing, expired or already consumed
    #[error("invalid or expired OAuth state")]
    InvalidState,

    /// Authorization-code exchange failed at the provider
    #[error("token exchange failed: {reason}")]
    Exchange {
        /// Provider-side failure detail
        reason: String,
    },

    /// GitHub account has no primary verified email
    #[error("no verified email on provider account")]
    NoVerifiedEmail,

    /// Profile endpoint returned an unusable document
    #[error("malformed provider profile: {reason}")]
    MalformedProfile {
        /// What was missing or wrong
        reason: String,
    },

    /// Cache transport failure
    #[error(transparent)]
    Cache(#[from] kyros_cache::CacheError),

    /// Crypto primitive failure
    #[error(transparent)]
    Crypto(#[from] kyros_crypto::CryptoError),

    /// Serialization failure for cache payloads
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP failure talking to a provider
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),
}
