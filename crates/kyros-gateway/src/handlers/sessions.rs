//! Session enumeration and revocation
//!
//! All three endpoints require auth. Without a cache the read stubs out
//! (empty list plus an explanatory message) and the mutations return the
//! documented 503.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::{Extension, Json};
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, CurrentUser};

/// Header naming the caller's current session for `DELETE /auth/sessions`
const SESSION_HEADER: &str = "x-session-id";

/// `GET /auth/sessions`
pub async fn list(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<serde_json::Value>> {
    match &state.sessions {
        None => Ok(Json(json!({
            "sessions": [],
            "message": "session tracking requires the cache backend",
        }))),
        Some(registry) => {
            let sessions = registry.list(user.id).await?;
            Ok(Json(json!({"sessions": sessions})))
        }
    }
}

/// `DELETE /auth/sessions/{id}`
pub async fn revoke(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(session_id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let registry = state.sessions_or_unavailable()?;
    if !registry.revoke(&session_id, user.id).await? {
        return Err(ApiError::not_found());
    }
    tracing::info!(user_id = %user.id, session_id = %session_id, "session revoked");
    Ok(Json(json!({"message": "session revoked"})))
}

/// `DELETE /auth/sessions` - revoke everything, keeping the session named
/// by `X-Session-ID` when present
pub async fn revoke_all(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    headers: HeaderMap,
) -> ApiResult<Json<serde_json::Value>> {
    let registry = state.sessions_or_unavailable()?;

    let current = headers
        .get(SESSION_HEADER)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string);

    let revoked = match &current {
        Some(keep) => registry.revoke_all_except(user.id, keep).await?,
        None => registry.revoke_all(user.id).await?,
    };

    tracing::info!(user_id = %user.id, revoked, kept = current.as_deref().unwrap_or(""), "sessions revoked");
    let mut body = json!({"revoked": revoked});
    if let Some(keep) = current {
        body["kept"] = json!(keep);
    }
    Ok(Json(body))
}
