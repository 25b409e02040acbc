//! Security response headers
//!
//! Applied to every response. HSTS is only emitted when TLS material is
//! configured - advertising it over plain HTTP would be a lie browsers
//! remember for a year.

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

use crate::state::AppState;

const CSP: &str = "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; \
                   img-src 'self' data: https:; connect-src 'self'";

const HSTS: &str = "max-age=31536000; includeSubDomains; preload";

/// Apply the standard security header set
pub async fn security_headers(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert("Content-Security-Policy", HeaderValue::from_static(CSP));

    if state.config.tls.enabled() {
        headers.insert(
            "Strict-Transport-Security",
            HeaderValue::from_static(HSTS),
        );
    }

    response
}
