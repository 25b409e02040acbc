//! # Kyros Crypto - Gateway Cryptographic Primitives
//!
//! Low-level cryptographic building blocks shared by the Kyros gateway:
//!
//! - **Password hashing** - bcrypt with timing-equalised verification
//! - **At-rest encryption** - AES-256-GCM envelopes for MFA secrets and
//!   provider tokens
//! - **TOTP** - RFC 6238 second factor with backup codes
//! - **Randomness** - CSPRNG state and session-id generation
//!
//! Every fallible operation returns a structured [`CryptoError`]; nothing in
//! this crate panics on untrusted input.

pub mod aead;
pub mod error;
pub mod password;
pub mod random;
pub mod totp;

pub use aead::Aead;
pub use error::{CryptoError, CryptoResult};
pub use totp::Totp;
