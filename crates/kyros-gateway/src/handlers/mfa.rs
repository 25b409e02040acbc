//! TOTP second factor: setup, enable, verify, disable
//!
//! The secret round-trips through the client between setup and enable (the
//! server keeps no pending-enrollment state), and is persisted encrypted
//! once a valid code proves the authenticator holds it. Backup codes are
//! stored as SHA-256 digests; a consumed digest is rewritten with a
//! `used:` prefix so it can never match again.

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use kyros_crypto::Totp;
use kyros_crypto::totp;
use kyros_store::User;

use crate::error::{ApiError, ApiResult};
use crate::handlers::auth::issue_tokens;
use crate::state::{AppState, CurrentUser};

/// Accepted clock skew, in 30-second steps
const TOTP_SKEW: u64 = 1;

/// Enrollment material returned by setup - shown exactly once
#[derive(Debug, Serialize)]
pub struct MfaSetupResponse {
    /// Base32 TOTP secret
    pub secret: String,
    /// `otpauth://` provisioning URL
    pub url: String,
    /// Plaintext one-time recovery codes
    pub backup_codes: Vec<String>,
}

/// Enable payload: the secret from setup plus a live code proving it
#[derive(Debug, Deserialize, Validate)]
pub struct MfaEnableRequest {
    /// Base32 secret from setup
    #[validate(length(min = 16, max = 128))]
    pub secret: String,
    /// Current 6-digit code
    #[validate(length(min = 6, max = 6))]
    pub code: String,
    /// Backup codes from setup; omitted, a fresh set is issued
    #[validate(length(max = 10))]
    pub backup_codes: Option<Vec<String>>,
}

/// Second-factor verification during login
#[derive(Debug, Deserialize, Validate)]
pub struct MfaVerifyRequest {
    /// User completing the login
    pub user_id: Uuid,
    /// TOTP code or backup code
    #[validate(length(min = 6, max = 16))]
    pub code: String,
}

/// Disable payload
#[derive(Debug, Deserialize, Validate)]
pub struct MfaDisableRequest {
    /// Current 6-digit code
    #[validate(length(min = 6, max = 6))]
    pub code: String,
}

/// `POST /auth/mfa/setup` - generate enrollment material
pub async fn setup(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<MfaSetupResponse> {
    let enrollment = state.totp.generate(&user.email);
    Json(MfaSetupResponse {
        secret: enrollment.secret,
        url: enrollment.otpauth_url,
        backup_codes: enrollment.backup_codes,
    })
}

/// `POST /auth/mfa/enable` - verify a live code and persist the enrollment
pub async fn enable(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<MfaEnableRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    req.validate()?;

    let valid = Totp::validate(&req.secret, &req.code, TOTP_SKEW)
        .map_err(|_| ApiError::invalid_code())?;
    if !valid {
        return Err(ApiError::invalid_code());
    }

    // Codes from setup are hashed as-is; without them a fresh set is issued
    // so recovery is never silently absent.
    let (hashes, issued) = match req.backup_codes {
        Some(codes) => {
            let hashes = codes.iter().map(|c| totp::hash_backup_code(c)).collect();
            (hashes, None)
        }
        None => {
            let fresh = totp::backup_codes(totp::BACKUP_CODE_COUNT);
            let hashes = fresh.iter().map(|c| totp::hash_backup_code(c)).collect();
            (hashes, Some(fresh))
        }
    };

    let encrypted = state.aead.encrypt(&req.secret)?;
    state
        .users
        .update_user_mfa(user.id, true, Some(encrypted), Some(hashes))
        .await?;

    tracing::info!(user_id = %user.id, "MFA enabled");
    let mut body = json!({"message": "MFA enabled"});
    if let Some(codes) = issued {
        body["backup_codes"] = json!(codes);
    }
    Ok(Json(body))
}

/// `POST /auth/mfa/verify` - second factor during login; rate-limited
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
    Json(req): Json<MfaVerifyRequest>,
) -> ApiResult<Response> {
    req.validate()?;

    // Unknown user, MFA off, missing secret: all collapse to invalid_code
    // so the endpoint cannot be used to probe accounts.
    let user = state
        .users
        .get_user_by_id(req.user_id)
        .await
        .map_err(|_| ApiError::invalid_code())?;
    if !user.mfa_enabled || !user.is_active {
        return Err(ApiError::invalid_code());
    }
    let Some(stored) = &user.mfa_secret else {
        return Err(ApiError::invalid_code());
    };

    let secret = state.aead.decrypt(stored)?;
    let mut accepted = Totp::validate(&secret, &req.code, TOTP_SKEW).unwrap_or(false);
    if !accepted {
        accepted = consume_backup_code(&state, &user, &req.code).await?;
    }
    if !accepted {
        return Err(ApiError::invalid_code());
    }

    let (jar, body) = issue_tokens(&state, &user, jar, &headers).await?;
    Ok((jar, Json(body)).into_response())
}

/// `POST /auth/mfa/disable` - requires a valid current code
pub async fn disable(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<MfaDisableRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    req.validate()?;

    if !user.mfa_enabled {
        return Err(ApiError::invalid_code());
    }
    let Some(stored) = &user.mfa_secret else {
        return Err(ApiError::invalid_code());
    };

    let secret = state.aead.decrypt(stored)?;
    if !Totp::validate(&secret, &req.code, TOTP_SKEW).unwrap_or(false) {
        return Err(ApiError::invalid_code());
    }

    state.users.update_user_mfa(user.id, false, None, None).await?;
    tracing::info!(user_id = %user.id, "MFA disabled");
    Ok(Json(json!({"message": "MFA disabled"})))
}

/// Match a candidate against the stored digests, marking the hit consumed
async fn consume_backup_code(state: &AppState, user: &User, candidate: &str) -> ApiResult<bool> {
    let Some(stored) = &user.backup_codes else {
        return Ok(false);
    };
    let digest = totp::hash_backup_code(candidate);

    let mut matched = false;
    let rewritten: Vec<String> = stored
        .iter()
        .map(|entry| {
            if !matched && *entry == digest {
                matched = true;
                format!("used:{entry}")
            } else {
                entry.clone()
            }
        })
        .collect();

    if matched {
        state.users.update_backup_codes(user.id, rewritten).await?;
        tracing::info!(user_id = %user.id, "backup code consumed");
    }
    Ok(matched)
}
