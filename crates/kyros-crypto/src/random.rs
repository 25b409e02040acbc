//! CSPRNG helpers for opaque identifiers
//!
//! OAuth states, session ids and WebSocket admission tickets are all opaque
//! base64url strings drawn from the OS RNG.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use rand::rngs::OsRng;

/// Byte length of a session id (128 bits)
pub const SESSION_ID_LEN: usize = 16;

/// Byte length of an OAuth state (256 bits)
pub const STATE_LEN: usize = 32;

/// Generate `n_bytes` of OS randomness, base64url-encoded without padding
pub fn state(n_bytes: usize) -> String {
    let mut buf = vec![0u8; n_bytes];
    OsRng.fill_bytes(&mut buf);
    URL_SAFE_NO_PAD.encode(buf)
}

/// Generate an opaque 128-bit session id
pub fn session_id() -> String {
    state(SESSION_ID_LEN)
}

/// Generate an opaque 256-bit OAuth correlation state
pub fn oauth_state() -> String {
    state(STATE_LEN)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_length_and_alphabet() {
        let s = state(32);
        // 32 bytes -> ceil(32 * 4 / 3) = 43 chars unpadded
        assert_eq!(s.len(), 43);
        assert!(
            s.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_states_are_unique() {
        let a = oauth_state();
        let b = oauth_state();
        assert_ne!(a, b);
    }

    #[test]
    fn test_session_id_is_128_bit() {
        // 16 bytes -> 22 base64url chars
        assert_eq!(session_id().len(), 22);
    }
}
