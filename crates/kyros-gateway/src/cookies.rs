//! Cookie construction helpers
//!
//! All auth cookies share the same shape: httpOnly, SameSite=Lax, Secure in
//! production, path `/`. The CSRF cookie is the deliberate exception
//! (non-httpOnly, SameSite=Strict) and is built where it is issued.

use std::time::Duration;

use axum_extra::extract::cookie::{Cookie, SameSite};

/// Access-token cookie name
pub const ACCESS_COOKIE: &str = "access_token";

/// Refresh-token cookie name
pub const REFRESH_COOKIE: &str = "refresh_token";

/// Session-id cookie name
pub const SESSION_COOKIE: &str = "session_id";

/// Build an httpOnly auth cookie
pub fn auth_cookie(
    name: &'static str,
    value: String,
    max_age: Duration,
    secure: bool,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(time::Duration::seconds(max_age.as_secs() as i64))
        .build()
}

/// Build a removal cookie matching [`auth_cookie`]'s attributes
pub fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build((name, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::ZERO)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_cookie_flags() {
        let cookie = auth_cookie(ACCESS_COOKIE, "tok".to_string(), Duration::from_secs(900), true);
        let rendered = cookie.to_string();
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("SameSite=Lax"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("Max-Age=900"));
    }

    #[test]
    fn test_dev_cookie_is_not_secure() {
        let cookie = auth_cookie(ACCESS_COOKIE, "tok".to_string(), Duration::from_secs(900), false);
        assert!(!cookie.to_string().contains("Secure"));
    }

    #[test]
    fn test_removal_expires_immediately() {
        assert!(removal(ACCESS_COOKIE).to_string().contains("Max-Age=0"));
    }
}
