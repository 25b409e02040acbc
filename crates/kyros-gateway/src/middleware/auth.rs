//! Identity population and enforcement
//!
//! `auth_populate` runs on every request: it extracts a bearer token from
//! the `Authorization` header or the `access_token` cookie, verifies it as
//! an access token, loads the user, and attaches [`CurrentUser`] to the
//! request when everything checks out. It never rejects - routes that need
//! identity opt in with `require_auth`, which turns an absent identity into
//! 401.

use axum::extract::{Request, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::CookieJar;

use kyros_auth::{Claims, TokenKind};

use crate::cookies::{self, ACCESS_COOKIE};
use crate::error::ApiError;
use crate::state::{AppState, CurrentUser};

/// Verified access-token claims, kept for best-effort logout revocation
#[derive(Debug, Clone)]
pub struct AccessClaims(pub Claims);

fn bearer_token(request: &Request, jar: &CookieJar) -> Option<String> {
    if let Some(token) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
    {
        return Some(token.to_string());
    }
    jar.get(ACCESS_COOKIE).map(|c| c.value().to_string())
}

/// Attach the authenticated user to the request context, if any
///
/// Also clears auth cookies on any 401 produced below this layer for a
/// cookie-authenticated request, so browsers do not get stuck replaying a
/// dead token.
pub async fn auth_populate(
    State(state): State<AppState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let via_cookie = !request.headers().contains_key(header::AUTHORIZATION)
        && jar.get(ACCESS_COOKIE).is_some();

    if let Some(token) = bearer_token(&request, &jar)
        && let Ok(claims) = state.tokens.verify(&token, TokenKind::Access).await
        && let Ok(user) = state.users.get_user_by_id(claims.sub).await
        && user.is_active
    {
        request.extensions_mut().insert(AccessClaims(claims));
        request.extensions_mut().insert(CurrentUser(user));
    }

    let mut response = next.run(request).await;

    if via_cookie && response.status() == StatusCode::UNAUTHORIZED {
        for name in [
            cookies::ACCESS_COOKIE,
            cookies::REFRESH_COOKIE,
            cookies::SESSION_COOKIE,
        ] {
            let cookie = cookies::removal(name);
            if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
        }
    }

    response
}

/// Reject requests that reached a protected route without identity
pub async fn require_auth(request: Request, next: Next) -> Response {
    if request.extensions().get::<CurrentUser>().is_none() {
        return ApiError::unauthorized().into_response();
    }
    next.run(request).await
}
