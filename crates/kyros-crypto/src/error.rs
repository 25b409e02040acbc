//! Crypto error types

/// Result type for crypto operations
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors produced by the crypto primitives
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CryptoError {
    /// Password hashing or verification failed at the bcrypt layer
    #[error("password hashing failed: {0}")]
    Password(#[from] bcrypt::BcryptError),

    /// At-rest encryption key has the wrong length
    #[error("encryption key must be exactly {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required key length in bytes
        expected: usize,
        /// Length that was supplied
        actual: usize,
    },

    /// AEAD encryption failed
    #[error("encryption failed")]
    Encrypt,

    /// AEAD decryption failed (wrong key, truncated or tampered ciphertext)
    #[error("decryption failed: {reason}")]
    Decrypt {
        /// What made the ciphertext unusable
        reason: String,
    },

    /// Ciphertext is marked as encrypted but no key is configured
    #[error("input is encrypted but no encryption key is configured")]
    MissingKey,

    /// TOTP secret is not valid base32
    #[error("invalid TOTP secret: {reason}")]
    InvalidSecret {
        /// What made the secret unusable
        reason: String,
    },
}
