//! CSRF double-submit protection
//!
//! Safe requests without a `csrf_token` cookie get one issued; unsafe
//! requests must echo the cookie's value in `X-CSRF-Token`, and the value
//! must still be live in the server-side table (1 h TTL). Requests that
//! carry an `Authorization` header are API clients and skip the check -
//! bearer tokens cannot be sent cross-site by a browser.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use parking_lot::RwLock;
use subtle::ConstantTimeEq;

use kyros_crypto::random;

use crate::error::ApiError;
use crate::middleware::rate_limit::Sweep;
use crate::state::AppState;

/// Cookie and header names
pub const CSRF_COOKIE: &str = "csrf_token";
const CSRF_HEADER: &str = "x-csrf-token";

/// Token lifetime
pub const CSRF_TTL: Duration = Duration::from_secs(60 * 60);

/// Server-side table of live CSRF tokens
///
/// Read-heavy: every unsafe request checks membership, writes happen only
/// on issuance.
#[derive(Debug)]
pub struct CsrfStore {
    tokens: RwLock<HashMap<String, Instant>>,
    ttl: Duration,
}

impl Default for CsrfStore {
    fn default() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
            ttl: CSRF_TTL,
        }
    }
}

impl CsrfStore {
    /// Mint and register a fresh token
    pub fn issue(&self) -> String {
        let token = random::state(16);
        self.tokens
            .write()
            .insert(token.clone(), Instant::now() + self.ttl);
        token
    }

    /// Whether a token is known and unexpired
    pub fn is_valid(&self, token: &str) -> bool {
        self.tokens
            .read()
            .get(token)
            .is_some_and(|deadline| *deadline > Instant::now())
    }

    /// Number of live tokens
    pub fn len(&self) -> usize {
        self.tokens.read().len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.tokens.read().is_empty()
    }
}

impl Sweep for CsrfStore {
    fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut tokens = self.tokens.write();
        let before = tokens.len();
        tokens.retain(|_, deadline| *deadline > now);
        before - tokens.len()
    }
}

fn is_unsafe(method: &Method) -> bool {
    matches!(method.as_str(), "POST" | "PUT" | "DELETE" | "PATCH")
}

/// The double-submit middleware
pub async fn csrf_protect(
    State(state): State<AppState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Response {
    // Bearer-authenticated API clients are exempt.
    if request.headers().contains_key(header::AUTHORIZATION) {
        return next.run(request).await;
    }

    let cookie_value = jar.get(CSRF_COOKIE).map(|c| c.value().to_string());

    if is_unsafe(request.method()) {
        let Some(cookie_value) = cookie_value else {
            return ApiError::new(
                axum::http::StatusCode::FORBIDDEN,
                "csrf_token_missing",
                "CSRF token cookie is missing",
            )
            .into_response();
        };
        let Some(header_value) = request
            .headers()
            .get(CSRF_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
        else {
            return ApiError::new(
                axum::http::StatusCode::FORBIDDEN,
                "csrf_token_missing",
                "X-CSRF-Token header is missing",
            )
            .into_response();
        };

        let matches: bool = cookie_value
            .as_bytes()
            .ct_eq(header_value.as_bytes())
            .into();
        if !matches || !state.csrf.is_valid(&cookie_value) {
            return ApiError::new(
                axum::http::StatusCode::FORBIDDEN,
                "csrf_token_invalid",
                "CSRF token mismatch or expired",
            )
            .into_response();
        }

        return next.run(request).await;
    }

    // Safe request: make sure the client leaves with a usable token.
    let needs_cookie = cookie_value
        .map(|v| !state.csrf.is_valid(&v))
        .unwrap_or(true);

    let mut response = next.run(request).await;

    if needs_cookie {
        let token = state.csrf.issue();
        let cookie = Cookie::build((CSRF_COOKIE, token))
            .path("/")
            .same_site(SameSite::Strict)
            .http_only(false)
            .secure(state.config.secure_cookies())
            .max_age(time::Duration::seconds(CSRF_TTL.as_secs() as i64))
            .build();
        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_then_validate() {
        let store = CsrfStore::default();
        let token = store.issue();
        assert!(store.is_valid(&token));
        assert!(!store.is_valid("forged"));
    }

    #[test]
    fn test_sweep_drops_expired() {
        let store = CsrfStore {
            tokens: RwLock::new(HashMap::new()),
            ttl: Duration::from_millis(5),
        };
        store.issue();
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(store.sweep(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_unsafe_methods() {
        assert!(is_unsafe(&Method::POST));
        assert!(is_unsafe(&Method::DELETE));
        assert!(!is_unsafe(&Method::GET));
        assert!(!is_unsafe(&Method::OPTIONS));
    }
}
