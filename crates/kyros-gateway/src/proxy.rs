//! Reverse proxy to the internal worker service
//!
//! Unmatched routes fall through to here. The request is replayed against
//! the configured upstream with hop-by-hop headers stripped and `Host`
//! rewritten to the upstream authority (reqwest derives it from the URL);
//! bodies stream in both directions. An unreachable worker is a 502.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::response::{IntoResponse, Response};

use crate::error::ApiError;
use crate::state::AppState;

const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Forward a request to the worker upstream
pub async fn forward(State(state): State<AppState>, request: Request) -> Response {
    let Some(base) = state.config.worker_base_url.clone() else {
        return ApiError::not_found().into_response();
    };

    let path_and_query = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let url = format!("{base}{path_and_query}");

    let (parts, body) = request.into_parts();
    let mut headers = parts.headers;
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);

    let upstream = match state
        .proxy_client
        .request(parts.method, url.clone())
        .headers(headers)
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, url = %url, "worker upstream unreachable");
            return ApiError::bad_gateway().into_response();
        }
    };

    let status = upstream.status();
    let mut upstream_headers = upstream.headers().clone();
    strip_hop_by_hop(&mut upstream_headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = upstream_headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hop_by_hop_headers_are_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", "keep-alive".parse().unwrap());
        headers.insert("transfer-encoding", "chunked".parse().unwrap());
        headers.insert("x-request-id", "abc".parse().unwrap());

        strip_hop_by_hop(&mut headers);

        assert!(!headers.contains_key("connection"));
        assert!(!headers.contains_key("transfer-encoding"));
        assert!(headers.contains_key("x-request-id"));
    }
}
