//! # Kyros Auth - Credential Issuance and Verification
//!
//! The authentication engine behind the Kyros gateway:
//!
//! - `token` - HMAC-signed bearer tokens with explicit kinds (access vs
//!   refresh) and a cache-backed revocation denylist
//! - `oauth` - authorization-code federation against a closed provider set
//!   (Google, GitHub) with single-use state tickets
//! - `session` - server-side session registry with multi-device
//!   enumeration and revocation
//!
//! Everything stateful lives in the external key-value cache
//! ([`kyros_cache::KvCache`]); the crate degrades the way the gateway
//! requires when the cache is absent (empty denylist, in-process OAuth
//! state, sessions disabled upstream).

pub mod error;
pub mod oauth;
pub mod session;
pub mod token;

pub use error::{AuthError, AuthResult};
pub use oauth::{OAuthBroker, Profile, ProviderSettings, ProviderSnapshot};
pub use session::{Session, SessionRegistry};
pub use token::{Claims, TokenCodec, TokenKind};
