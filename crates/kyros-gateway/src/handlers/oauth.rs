//! OAuth federation endpoints: provider list, start, callback
//!
//! Start mints a single-use state ticket and bounces the browser to the
//! provider; the callback consumes the ticket, exchanges the code, links or
//! creates the local account by verified email, and lands the browser on
//! the front-end dashboard with cookies set. Provider-side denials redirect
//! back to the front-end; state and code problems are hard 400s.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;

use kyros_auth::Profile;
use kyros_crypto::{password, random};
use kyros_store::{NewUser, StoreError, User};

use crate::error::{ApiError, ApiResult};
use crate::handlers::auth::issue_tokens;
use crate::state::AppState;

/// Query parameters a provider may send to the callback
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    /// Echoed correlation state
    pub state: Option<String>,
    /// Authorization code
    pub code: Option<String>,
    /// Provider-side error (user denied, etc.)
    pub error: Option<String>,
}

/// `GET /auth/oauth/providers`
pub async fn providers(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({"providers": state.oauth.names()}))
}

/// `GET /auth/oauth/{provider}` - 307 to the provider's authorization URL
pub async fn start(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> ApiResult<Redirect> {
    let login = state.oauth.begin(&provider).await?;
    tracing::info!(provider = %provider, "OAuth flow started");
    Ok(Redirect::temporary(&login.url))
}

/// `GET /auth/oauth/{provider}/callback`
pub async fn callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
    jar: CookieJar,
) -> ApiResult<Response> {
    if let Some(error) = query.error {
        tracing::warn!(provider = %provider, error = %error, "provider declined authorization");
        let target = format!("{}/login?error=oauth_failed", state.config.frontend_origin());
        return Ok(Redirect::temporary(&target).into_response());
    }

    let Some(ticket_state) = query.state else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_state",
            "callback is missing the state parameter",
        ));
    };
    let ticket = state.oauth.consume_state(&ticket_state).await?;
    if ticket.provider != provider {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "invalid_state",
            "state was issued for a different provider",
        ));
    }

    let Some(code) = query.code else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "missing_code",
            "callback is missing the authorization code",
        ));
    };

    let profile = state
        .oauth
        .exchange(&provider, &code, &ticket.pkce_verifier)
        .await?;
    let user = find_or_create_user(&state, &profile).await?;
    if !user.is_active {
        return Err(ApiError::unauthorized());
    }

    let (jar, _tokens) = issue_tokens(&state, &user, jar, &headers).await?;
    tracing::info!(user_id = %user.id, provider = %provider, "OAuth login completed");

    let target = format!("{}/dashboard", state.config.frontend_origin());
    Ok((jar, Redirect::temporary(&target)).into_response())
}

/// Link by verified email, or provision a fresh account
///
/// The provider email is verified (GitHub flows refuse unverified
/// addresses), so an existing account with the same email is the same
/// person: link, don't duplicate.
async fn find_or_create_user(state: &AppState, profile: &Profile) -> ApiResult<User> {
    match state.users.get_user_by_email(&profile.email).await {
        Ok(user) => Ok(user),
        Err(StoreError::NotFound) => {
            let base = username_from_email(&profile.email);
            // A few attempts with a random suffix absorb username collisions.
            for attempt in 0..3 {
                let username = if attempt == 0 {
                    base.clone()
                } else {
                    format!("{base}-{}", random::state(3))
                };
                // OAuth accounts get an unguessable local password.
                let password_hash = password::hash(&random::state(24))?;
                match state
                    .users
                    .create_user(NewUser {
                        username,
                        email: profile.email.clone(),
                        password_hash,
                        role: "user".to_string(),
                    })
                    .await
                {
                    Ok(user) => {
                        tracing::info!(user_id = %user.id, provider = %profile.provider, "user provisioned from OAuth");
                        return Ok(user);
                    }
                    Err(StoreError::Conflict { field }) if field == "username" => continue,
                    Err(e) => return Err(e.into()),
                }
            }
            tracing::error!(email = %profile.email, "could not find a free username");
            Err(ApiError::internal())
        }
        Err(e) => Err(e.into()),
    }
}

fn username_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or(email);
    let cleaned: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_' || *c == '.')
        .collect();
    if cleaned.len() >= 3 {
        cleaned
    } else {
        format!("user-{}", random::state(4))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_from_email_strips_junk() {
        assert_eq!(username_from_email("ops.lead@x.io"), "ops.lead");
        assert_eq!(username_from_email("o+tag@x.io"), "otag");
    }

    #[test]
    fn test_short_local_part_gets_generated_name() {
        let name = username_from_email("o@x.io");
        assert!(name.starts_with("user-"));
        assert!(name.len() > 5);
    }
}
