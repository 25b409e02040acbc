//! At-rest encryption for MFA secrets and provider tokens
//!
//! AES-256-GCM with a random 96-bit nonce per message. Ciphertexts are
//! wrapped in a marked envelope (`enc:` + base64(nonce || ciphertext)) so a
//! value can always be classified as encrypted or plaintext on read.
//!
//! Encryption is optional: without a configured key the envelope functions
//! are identity, except that decrypting a marked envelope without a key is
//! an error - a deployment that loses its key must notice, not silently
//! serve ciphertext as data.

use aes_gcm::aead::{Aead as _, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use rand::RngCore;
use rand::rngs::OsRng;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::{CryptoError, CryptoResult};

/// Prefix marking a value as an encrypted envelope
pub const ENVELOPE_MARKER: &str = "enc:";

/// Required key length in bytes (AES-256)
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;

/// At-rest AEAD envelope codec
///
/// Cheap to clone around; the cipher state is rebuilt from the key on
/// construction only.
#[derive(Clone)]
pub struct Aead {
    cipher: Option<Aes256Gcm>,
}

impl std::fmt::Debug for Aead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aead")
            .field("enabled", &self.cipher.is_some())
            .finish()
    }
}

impl Aead {
    /// Create a codec from a 32-byte key
    pub fn new(key: &[u8]) -> CryptoResult<Self> {
        if key.len() != KEY_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_LEN,
                actual: key.len(),
            });
        }
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
        Ok(Self {
            cipher: Some(cipher),
        })
    }

    /// Create a disabled codec whose operations are identity functions
    pub fn disabled() -> Self {
        Self { cipher: None }
    }

    /// Whether a key is configured
    pub fn is_enabled(&self) -> bool {
        self.cipher.is_some()
    }

    /// Encrypt a value into a marked envelope
    ///
    /// Without a key the input is returned unchanged.
    pub fn encrypt(&self, plaintext: &str) -> CryptoResult<String> {
        let Some(cipher) = &self.cipher else {
            return Ok(plaintext.to_string());
        };

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut envelope = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        envelope.extend_from_slice(&nonce_bytes);
        envelope.extend_from_slice(&ciphertext);

        Ok(format!("{ENVELOPE_MARKER}{}", BASE64.encode(envelope)))
    }

    /// Decrypt a value, passing unmarked input through unchanged
    pub fn decrypt(&self, value: &str) -> CryptoResult<String> {
        let Some(encoded) = value.strip_prefix(ENVELOPE_MARKER) else {
            return Ok(value.to_string());
        };

        let Some(cipher) = &self.cipher else {
            return Err(CryptoError::MissingKey);
        };

        let envelope = BASE64.decode(encoded).map_err(|e| CryptoError::Decrypt {
            reason: format!("invalid base64: {e}"),
        })?;
        if envelope.len() < NONCE_LEN {
            return Err(CryptoError::Decrypt {
                reason: "envelope shorter than nonce".to_string(),
            });
        }

        let (nonce_bytes, ciphertext) = envelope.split_at(NONCE_LEN);
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::Decrypt {
                reason: "authentication failed".to_string(),
            })?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Decrypt {
            reason: "plaintext is not UTF-8".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> Vec<u8> {
        (0u8..32).collect()
    }

    #[test]
    fn test_roundtrip() {
        let aead = Aead::new(&key()).unwrap();
        let ct = aead.encrypt("totp-secret-material").unwrap();
        assert!(ct.starts_with(ENVELOPE_MARKER));
        assert_eq!(aead.decrypt(&ct).unwrap(), "totp-secret-material");
    }

    #[test]
    fn test_ciphertexts_are_nondeterministic() {
        let aead = Aead::new(&key()).unwrap();
        let a = aead.encrypt("same plaintext").unwrap();
        let b = aead.encrypt("same plaintext").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let aead = Aead::new(&key()).unwrap();
        let other = Aead::new(&[7u8; 32]).unwrap();
        let ct = aead.encrypt("secret").unwrap();
        assert!(matches!(
            other.decrypt(&ct),
            Err(CryptoError::Decrypt { .. })
        ));
    }

    #[test]
    fn test_disabled_is_identity() {
        let aead = Aead::disabled();
        assert_eq!(aead.encrypt("plain").unwrap(), "plain");
        assert_eq!(aead.decrypt("plain").unwrap(), "plain");
    }

    #[test]
    fn test_marked_input_without_key_fails() {
        let aead = Aead::disabled();
        assert!(matches!(
            aead.decrypt("enc:AAAA"),
            Err(CryptoError::MissingKey)
        ));
    }

    #[test]
    fn test_invalid_key_length_rejected() {
        assert!(matches!(
            Aead::new(&[0u8; 16]),
            Err(CryptoError::InvalidKeyLength {
                expected: 32,
                actual: 16
            })
        ));
    }

    #[test]
    fn test_truncated_envelope_rejected() {
        let aead = Aead::new(&key()).unwrap();
        assert!(aead.decrypt("enc:AAAA").is_err());
        assert!(aead.decrypt("enc:!!!not-base64!!!").is_err());
    }
}
