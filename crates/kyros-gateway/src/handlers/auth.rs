//! Password authentication: register, login, refresh, logout, me, ws-token
//!
//! Login is timing-equalised: whether or not the account exists, exactly
//! one bcrypt verification runs before the response is produced, so the
//! answer time does not reveal which emails are registered.

use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use kyros_auth::TokenKind;
use kyros_crypto::{password, random};
use kyros_store::{NewUser, PublicUser, StoreError, User};

use crate::cookies::{self, ACCESS_COOKIE, REFRESH_COOKIE, SESSION_COOKIE};
use crate::error::{ApiError, ApiResult};
use crate::middleware::auth::AccessClaims;
use crate::state::{AppState, CurrentUser};

/// TTL of WebSocket admission tickets
const WS_TICKET_TTL: Duration = Duration::from_secs(5 * 60);

const SPECIAL_CHARS: &str = "!@#$%^&*()-_=+[]{};:,.<>?";

/// Enforce the password policy: length plus all four character classes
pub fn check_password_policy(candidate: &str) -> Result<(), String> {
    let mut missing = Vec::new();
    if candidate.len() < 8 {
        missing.push("at least 8 characters");
    }
    if !candidate.chars().any(|c| c.is_ascii_uppercase()) {
        missing.push("an uppercase letter");
    }
    if !candidate.chars().any(|c| c.is_ascii_lowercase()) {
        missing.push("a lowercase letter");
    }
    if !candidate.chars().any(|c| c.is_ascii_digit()) {
        missing.push("a digit");
    }
    if !candidate.chars().any(|c| SPECIAL_CHARS.contains(c)) {
        missing.push("a special character");
    }
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("password needs {}", missing.join(", ")))
    }
}

/// Coarse device label from a user agent, for the session list UI
pub fn device_label(user_agent: &str) -> &'static str {
    for (needle, label) in [
        ("Firefox", "Firefox"),
        ("Edg", "Edge"),
        ("Chrome", "Chrome"),
        ("Safari", "Safari"),
        ("curl", "curl"),
    ] {
        if user_agent.contains(needle) {
            return label;
        }
    }
    "unknown"
}

fn client_ip(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.split(',').next())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Registration payload
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    /// Desired username
    #[validate(length(min = 3, max = 32))]
    pub username: String,
    /// Account email
    #[validate(email)]
    pub email: String,
    /// Plaintext password, policy-checked then hashed
    #[validate(length(max = 128))]
    pub password: String,
}

/// Login payload
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    /// Account email
    #[validate(email)]
    pub email: String,
    /// Plaintext password
    pub password: String,
}

/// Successful token issuance
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Bearer access token
    pub access_token: String,
    /// Always `bearer`
    pub token_type: &'static str,
    /// Refresh token
    pub refresh_token: String,
    /// Access-token lifetime in seconds
    pub expires_in: u64,
    /// Server-side session id, when session tracking is available
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct MfaChallenge {
    mfa_required: bool,
    user_id: Uuid,
    message: &'static str,
}

/// Refresh result: a fresh access token only
#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    /// Bearer access token
    pub access_token: String,
    /// Always `bearer`
    pub token_type: &'static str,
    /// Access-token lifetime in seconds
    pub expires_in: u64,
}

/// WebSocket admission ticket
#[derive(Debug, Serialize)]
pub struct WsTokenResponse {
    /// Opaque single-handshake token
    pub ws_token: String,
    /// Ticket lifetime in seconds
    pub expires_in: u64,
}

/// Mint both tokens, create a session when possible, and set the cookies
pub(crate) async fn issue_tokens(
    state: &AppState,
    user: &User,
    jar: CookieJar,
    headers: &HeaderMap,
) -> ApiResult<(CookieJar, TokenResponse)> {
    let access = state
        .tokens
        .mint(TokenKind::Access, user.id, &user.email, state.config.access_ttl)?;
    let refresh = state
        .tokens
        .mint(TokenKind::Refresh, user.id, &user.email, state.config.refresh_ttl)?;

    let mut session_id = None;
    if let Some(sessions) = &state.sessions {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");
        match sessions
            .create(user.id, device_label(user_agent), &client_ip(headers), user_agent)
            .await
        {
            Ok(session) => session_id = Some(session.id),
            Err(e) => tracing::warn!(error = %e, user_id = %user.id, "session creation failed"),
        }
    }

    let secure = state.config.secure_cookies();
    let mut jar = jar
        .add(cookies::auth_cookie(
            ACCESS_COOKIE,
            access.clone(),
            state.config.access_ttl,
            secure,
        ))
        .add(cookies::auth_cookie(
            REFRESH_COOKIE,
            refresh.clone(),
            state.config.refresh_ttl,
            secure,
        ));
    if let Some(sid) = &session_id {
        jar = jar.add(cookies::auth_cookie(
            SESSION_COOKIE,
            sid.clone(),
            state.config.session_ttl,
            secure,
        ));
    }

    Ok((
        jar,
        TokenResponse {
            access_token: access,
            token_type: "bearer",
            refresh_token: refresh,
            expires_in: state.config.access_ttl.as_secs(),
            session_id,
        },
    ))
}

/// `POST /auth/register`
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<PublicUser>)> {
    req.validate()?;
    check_password_policy(&req.password).map_err(ApiError::weak_password)?;

    let password_hash = password::hash(&req.password)?;
    let user = state
        .users
        .create_user(NewUser {
            username: req.username,
            email: req.email,
            password_hash,
            role: "user".to_string(),
        })
        .await?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user.public())))
}

/// `POST /auth/login`
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Response> {
    req.validate()?;

    let user = match state.users.get_user_by_email(&req.email).await {
        Ok(user) => Some(user),
        Err(StoreError::NotFound) => None,
        Err(e) => return Err(e.into()),
    };

    // Exactly one bcrypt verification on every path.
    let verified = match &user {
        Some(user) => password::verify(&req.password, &user.password_hash),
        None => {
            password::dummy_verify(&req.password);
            false
        }
    };

    let Some(user) = user else {
        return Err(ApiError::invalid_credentials());
    };
    if !verified || !user.is_active {
        return Err(ApiError::invalid_credentials());
    }

    if user.mfa_enabled {
        // No cookies until the second factor clears.
        return Ok(Json(MfaChallenge {
            mfa_required: true,
            user_id: user.id,
            message: "second factor required",
        })
        .into_response());
    }

    let (jar, body) = issue_tokens(&state, &user, jar, &headers).await?;
    Ok((jar, Json(body)).into_response())
}

/// `POST /auth/refresh` - refresh-token cookie to a new access token
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
) -> ApiResult<(CookieJar, Json<RefreshResponse>)> {
    let token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(ApiError::unauthorized)?;

    let claims = state.tokens.verify(&token, TokenKind::Refresh).await?;
    let user = match state.users.get_user_by_id(claims.sub).await {
        Ok(user) if user.is_active => user,
        _ => return Err(ApiError::unauthorized()),
    };

    let access = state
        .tokens
        .mint(TokenKind::Access, user.id, &user.email, state.config.access_ttl)?;

    if let (Some(sessions), Some(sid)) = (&state.sessions, jar.get(SESSION_COOKIE)) {
        if let Err(e) = sessions.touch(sid.value()).await {
            tracing::warn!(error = %e, "session touch failed");
        }
    }

    let jar = jar.add(cookies::auth_cookie(
        ACCESS_COOKIE,
        access.clone(),
        state.config.access_ttl,
        state.config.secure_cookies(),
    ));

    Ok((
        jar,
        Json(RefreshResponse {
            access_token: access,
            token_type: "bearer",
            expires_in: state.config.access_ttl.as_secs(),
        }),
    ))
}

/// `POST /auth/logout` - idempotent; clears cookies and best-effort
/// denylists the presented access token
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
    request: axum::extract::Request,
) -> ApiResult<(CookieJar, Json<serde_json::Value>)> {
    if let Some(AccessClaims(claims)) = request.extensions().get::<AccessClaims>() {
        if let Err(e) = state.tokens.revoke(claims).await {
            tracing::warn!(error = %e, "token denylist write failed");
        }
    }

    let jar = jar
        .add(cookies::removal(ACCESS_COOKIE))
        .add(cookies::removal(REFRESH_COOKIE))
        .add(cookies::removal(SESSION_COOKIE));

    Ok((jar, Json(serde_json::json!({"message": "logged out"}))))
}

/// `GET /auth/me`
pub async fn me(Extension(CurrentUser(user)): Extension<CurrentUser>) -> Json<PublicUser> {
    Json(user.public())
}

/// `POST /auth/ws-token` - short-lived ticket for WebSocket handshakes,
/// where cookies cannot be attached
pub async fn ws_token(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<WsTokenResponse>> {
    let Some(kv) = &state.kv else {
        return Err(ApiError::unavailable(
            "WebSocket tickets require the cache backend",
        ));
    };

    let ticket = random::state(32);
    kv.set_ex(&format!("ws_ticket:{ticket}"), &user.id.to_string(), WS_TICKET_TTL)
        .await?;

    Ok(Json(WsTokenResponse {
        ws_token: ticket,
        expires_in: WS_TICKET_TTL.as_secs(),
    }))
}
