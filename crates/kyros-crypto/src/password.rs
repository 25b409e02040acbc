//! Password hashing and timing-equalised verification
//!
//! Passwords are stored as bcrypt hashes only; plaintext never persists.
//! Callers that cannot find a user MUST still call [`dummy_verify`] so the
//! response time does not reveal whether an account exists.

use crate::error::CryptoResult;

/// bcrypt work factor for new hashes
pub const HASH_COST: u32 = 12;

/// A syntactically valid bcrypt hash of no real password. Verifying against
/// it burns the same work factor as a real verification.
const FAKE_HASH: &str = "$2b$12$abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0";

/// Hash a plaintext password with bcrypt
pub fn hash(plaintext: &str) -> CryptoResult<String> {
    Ok(bcrypt::hash(plaintext, HASH_COST)?)
}

/// Verify a plaintext password against a stored bcrypt hash
///
/// Malformed hashes verify as `false` rather than erroring; a corrupt stored
/// hash must not be distinguishable from a wrong password.
pub fn verify(plaintext: &str, hash: &str) -> bool {
    bcrypt::verify(plaintext, hash).unwrap_or(false)
}

/// Run a verification against a fixed fake hash
///
/// Called on the unknown-user path of login so that lookups which find no
/// account take the same time as lookups which find one.
pub fn dummy_verify(plaintext: &str) {
    let _ = bcrypt::verify(plaintext, FAKE_HASH);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_then_verify_roundtrip() {
        let hashed = hash("Abcd!234").unwrap();
        assert!(verify("Abcd!234", &hashed));
        assert!(!verify("Abcd!235", &hashed));
    }

    #[test]
    fn test_hashes_are_salted() {
        let a = hash("same-password").unwrap();
        let b = hash("same-password").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_malformed_hash_is_false() {
        assert!(!verify("whatever", "not-a-bcrypt-hash"));
        assert!(!verify("whatever", ""));
    }

    #[test]
    fn test_dummy_verify_does_not_panic() {
        dummy_verify("any input at all");
        dummy_verify("");
    }
}
