//! Structured access logging
//!
//! One line per request with method, path, status, duration and client IP.
//! Errors get `warn`, everything else `info`; the log write itself never
//! blocks the response path.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, warn};

use crate::middleware::client_key;

/// Log every request after it completes
pub async fn access_log(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client_ip = client_key(&request);
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis() as u64;

    if status >= 500 {
        warn!(
            method = %method,
            path = %path,
            status,
            duration_ms,
            client_ip = %client_ip,
            "request failed"
        );
    } else {
        info!(
            method = %method,
            path = %path,
            status,
            duration_ms,
            client_ip = %client_ip,
            "request completed"
        );
    }

    response
}
