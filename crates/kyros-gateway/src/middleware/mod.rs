//! Request admission middleware
//!
//! The chain runs in a fixed order, outermost first:
//!
//! 1. [`panic_guard`] - contain handler faults (tower-http catch-panic)
//! 2. [`access_log`] - structured request logging
//! 3. [`rate_limit::general_rate_limit`] - sliding-window limiting
//! 4. [`rate_limit::mfa_rate_limit`] - stricter limiter, gated to the
//!    TOTP-verification route
//! 5. CORS ([`cors`])
//! 6. [`headers`] - security response headers
//! 7. [`csrf`] - double-submit cookie protection
//! 8. [`auth`] - identity population and `RequireAuth`

pub mod access_log;
pub mod auth;
pub mod cors;
pub mod csrf;
pub mod headers;
pub mod panic_guard;
pub mod rate_limit;

use axum::extract::ConnectInfo;
use axum::http::Request;
use std::net::SocketAddr;

/// Best client identity available: first `X-Forwarded-For` entry, else the
/// peer address, else a fixed marker
pub fn client_key<B>(request: &Request<B>) -> String {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(str::trim)
        .filter(|h| !h.is_empty())
    {
        return forwarded.to_string();
    }

    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_forwarded_header_wins() {
        let request = Request::builder()
            .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "203.0.113.9");
    }

    #[test]
    fn test_peer_address_fallback() {
        let mut request = Request::builder().body(Body::empty()).unwrap();
        request
            .extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("10.1.2.3:55555".parse().unwrap()));
        assert_eq!(client_key(&request), "10.1.2.3");
    }

    #[test]
    fn test_unknown_when_nothing_available() {
        let request = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&request), "unknown");
    }
}
