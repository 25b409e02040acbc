//! RFC 6238 time-based one-time passwords and backup codes
//!
//! 30-second period, 6 digits, SHA-1 - the parameters every authenticator
//! app ships with. Validation accepts neighbouring steps within a
//! configurable skew to absorb clock drift; code comparison is
//! constant-time.
//!
//! Backup codes are one-time recovery codes in `XXXX-XXXX` base32 form.
//! Only their SHA-256 digests are ever stored; [`hash_backup_code`]
//! normalises a candidate for lookup against the stored digests.

use std::time::{SystemTime, UNIX_EPOCH};

use data_encoding::{BASE32_NOPAD, HEXLOWER};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use totp_lite::{Sha1, totp_custom};

use crate::error::{CryptoError, CryptoResult};

/// TOTP step length in seconds
pub const PERIOD: u64 = 30;

/// Number of code digits
pub const DIGITS: u32 = 6;

/// Backup codes issued per enrollment
pub const BACKUP_CODE_COUNT: usize = 10;

const SECRET_LEN: usize = 20;

/// Result of a fresh TOTP enrollment
///
/// The plaintext backup codes appear here exactly once; persist only their
/// hashes.
#[derive(Debug, Clone)]
pub struct TotpEnrollment {
    /// Base32-encoded shared secret
    pub secret: String,
    /// `otpauth://` provisioning URL for authenticator apps
    pub otpauth_url: String,
    /// One-time recovery codes, plaintext
    pub backup_codes: Vec<String>,
}

/// TOTP generator/validator bound to an issuer label
#[derive(Debug, Clone)]
pub struct Totp {
    issuer: String,
}

impl Totp {
    /// Create a TOTP helper for the given issuer label
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    /// Generate a fresh secret, provisioning URL and backup codes
    pub fn generate(&self, account: &str) -> TotpEnrollment {
        let mut secret_bytes = [0u8; SECRET_LEN];
        OsRng.fill_bytes(&mut secret_bytes);
        let secret = BASE32_NOPAD.encode(&secret_bytes);

        let otpauth_url = format!(
            "otpauth://totp/{issuer}:{account}?secret={secret}&issuer={issuer}&algorithm=SHA1&digits={DIGITS}&period={PERIOD}",
            issuer = urlencoding::encode(&self.issuer),
            account = urlencoding::encode(account),
        );

        let backup_codes = backup_codes(BACKUP_CODE_COUNT);

        TotpEnrollment {
            secret,
            otpauth_url,
            backup_codes,
        }
    }

    /// Validate a code against a base32 secret at the current time
    pub fn validate(secret: &str, code: &str, skew: u64) -> CryptoResult<bool> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        Self::validate_at(secret, code, skew, now)
    }

    /// Validate a code at an explicit unix timestamp
    ///
    /// Accepts the step containing `now` plus `skew` steps on either side.
    pub fn validate_at(secret: &str, code: &str, skew: u64, now: u64) -> CryptoResult<bool> {
        let secret_bytes = decode_secret(secret)?;

        for offset in 0..=skew {
            let behind = now.saturating_sub(offset * PERIOD);
            let ahead = now.saturating_add(offset * PERIOD);
            for t in [behind, ahead] {
                let expected = totp_custom::<Sha1>(PERIOD, DIGITS, &secret_bytes, t);
                if bool::from(expected.as_bytes().ct_eq(code.as_bytes())) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

/// Compute the code for a secret at a given time (test and setup tooling)
pub fn code_at(secret: &str, now: u64) -> CryptoResult<String> {
    let secret_bytes = decode_secret(secret)?;
    Ok(totp_custom::<Sha1>(PERIOD, DIGITS, &secret_bytes, now))
}

/// Hash a backup code candidate for storage or lookup
///
/// Normalises case and strips separators first so `ab3d-efg2` and
/// `AB3DEFG2` hash identically.
pub fn hash_backup_code(code: &str) -> String {
    let normalised: String = code
        .trim()
        .chars()
        .filter(|c| *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();
    let digest = Sha256::digest(normalised.as_bytes());
    HEXLOWER.encode(&digest)
}

/// Generate a fresh set of plaintext backup codes
pub fn backup_codes(count: usize) -> Vec<String> {
    (0..count).map(|_| generate_backup_code()).collect()
}

fn generate_backup_code() -> String {
    let mut raw = [0u8; 5];
    OsRng.fill_bytes(&mut raw);
    let encoded = BASE32_NOPAD.encode(&raw);
    format!("{}-{}", &encoded[..4], &encoded[4..])
}

fn decode_secret(secret: &str) -> CryptoResult<Vec<u8>> {
    let normalised: String = secret
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .collect();
    BASE32_NOPAD
        .decode(normalised.as_bytes())
        .map_err(|e| CryptoError::InvalidSecret {
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: u64 = 1_700_000_000;

    fn secret() -> String {
        BASE32_NOPAD.encode(b"12345678901234567890")
    }

    #[test]
    fn test_current_step_accepted() {
        let code = code_at(&secret(), NOW).unwrap();
        assert!(Totp::validate_at(&secret(), &code, 1, NOW).unwrap());
    }

    #[test]
    fn test_previous_step_needs_skew() {
        let previous = code_at(&secret(), NOW - PERIOD).unwrap();
        assert!(!Totp::validate_at(&secret(), &previous, 0, NOW).unwrap());
        assert!(Totp::validate_at(&secret(), &previous, 1, NOW).unwrap());
    }

    #[test]
    fn test_two_steps_out_rejected_at_skew_one() {
        let stale = code_at(&secret(), NOW - 2 * PERIOD).unwrap();
        assert!(!Totp::validate_at(&secret(), &stale, 1, NOW).unwrap());
    }

    #[test]
    fn test_wrong_code_rejected() {
        assert!(!Totp::validate_at(&secret(), "000000", 1, NOW).unwrap());
    }

    #[test]
    fn test_invalid_secret_errors() {
        assert!(Totp::validate_at("not base32!!", "123456", 1, NOW).is_err());
    }

    #[test]
    fn test_enrollment_shape() {
        let enrollment = Totp::new("Kyros").generate("o@x.io");
        assert_eq!(enrollment.backup_codes.len(), BACKUP_CODE_COUNT);
        assert!(enrollment.otpauth_url.starts_with("otpauth://totp/Kyros"));
        assert!(enrollment.otpauth_url.contains("digits=6"));
        assert!(enrollment.otpauth_url.contains("period=30"));
        for code in &enrollment.backup_codes {
            assert_eq!(code.len(), 9);
            assert_eq!(code.chars().nth(4), Some('-'));
        }
        // The secret round-trips through the validator
        let code = code_at(&enrollment.secret, NOW).unwrap();
        assert!(Totp::validate_at(&enrollment.secret, &code, 0, NOW).unwrap());
    }

    #[test]
    fn test_backup_code_hash_normalisation() {
        assert_eq!(hash_backup_code("ab3d-efg2"), hash_backup_code("AB3DEFG2"));
        assert_ne!(hash_backup_code("AB3D-EFG2"), hash_backup_code("AB3D-EFG3"));
    }
}
