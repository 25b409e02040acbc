//! Gateway error responses
//!
//! Every failure a client can see is an [`ApiError`]: an HTTP status plus a
//! stable string code and a human message, rendered as
//! `{error, message, details?}`. Internal failures (database, cache,
//! signing) are logged with context and collapse to `internal_error` -
//! nothing transport-level leaks to clients.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use kyros_auth::AuthError;
use kyros_store::StoreError;

/// Result type for handler bodies
pub type ApiResult<T> = Result<T, ApiError>;

/// A client-visible error
#[derive(Debug)]
pub struct ApiError {
    /// HTTP status
    pub status: StatusCode,
    /// Stable string code from the error taxonomy
    pub code: &'static str,
    /// Human-readable message
    pub message: String,
    /// Optional extra detail (field lists, sub-codes)
    pub details: Option<String>,
    /// `Retry-After` value for rate-limit responses
    pub retry_after: Option<u32>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a str>,
}

impl ApiError {
    /// Build an error with a status, code and message
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            details: None,
            retry_after: None,
        }
    }

    /// Attach a details string
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// 400 `validation_error`
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }

    /// 400 `weak_password`
    pub fn weak_password(details: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "weak_password",
            "password does not meet the policy",
        )
        .with_details(details)
    }

    /// 401 `invalid_credentials`
    pub fn invalid_credentials() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "invalid_credentials",
            "invalid email or password",
        )
    }

    /// 401 `unauthorized`
    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "authentication required",
        )
    }

    /// 400 `invalid_code`
    pub fn invalid_code() -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            "invalid_code",
            "the provided code is not valid",
        )
    }

    /// 404 `not_found`
    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", "resource not found")
    }

    /// 400 `invalid_id`
    pub fn invalid_id() -> Self {
        Self::new(StatusCode::BAD_REQUEST, "invalid_id", "malformed identifier")
    }

    /// 503 `unavailable` for cache-dependent features
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "unavailable", message)
    }

    /// 429 with the given code and `Retry-After`
    pub fn rate_limited(code: &'static str, retry_after: u32) -> Self {
        let mut err = Self::new(
            StatusCode::TOO_MANY_REQUESTS,
            code,
            "too many requests, slow down",
        );
        err.retry_after = Some(retry_after);
        err
    }

    /// 500 `internal_error`
    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal_error",
            "an internal error occurred",
        )
    }

    /// 502 when the worker upstream cannot be reached
    pub fn bad_gateway() -> Self {
        Self::new(
            StatusCode::BAD_GATEWAY,
            "unavailable",
            "upstream worker unreachable",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.code,
            message: &self.message,
            details: self.details.as_deref(),
        });
        let mut response = (self.status, body).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => Self::not_found(),
            StoreError::Conflict { field } if field == "email" => Self::new(
                StatusCode::BAD_REQUEST,
                "email_exists",
                "an account with this email already exists",
            ),
            StoreError::Conflict { field } if field == "username" => Self::new(
                StatusCode::BAD_REQUEST,
                "username_exists",
                "this username is already taken",
            ),
            StoreError::Conflict { .. } => Self::validation("duplicate value"),
            other => {
                tracing::error!(error = %other, "store backend error");
                Self::internal()
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::TokenExpired
            | AuthError::TokenRevoked
            | AuthError::InvalidToken { .. }
            | AuthError::WrongTokenKind { .. } => Self::unauthorized(),
            AuthError::UnknownProvider { name } => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_provider",
                format!("provider {name} is not configured"),
            ),
            AuthError::InvalidState => Self::new(
                StatusCode::BAD_REQUEST,
                "invalid_state",
                "OAuth state is missing, expired or already used",
            ),
            AuthError::NoVerifiedEmail => Self::new(
                StatusCode::BAD_REQUEST,
                "oauth_failed",
                "no verified email on provider account",
            )
            .with_details("no_verified_email"),
            AuthError::Exchange { reason } => {
                tracing::warn!(reason = %reason, "OAuth exchange failed");
                Self::new(
                    StatusCode::BAD_REQUEST,
                    "oauth_failed",
                    "authorization could not be completed",
                )
            }
            AuthError::Http(e) => {
                tracing::warn!(error = %e, "provider request failed");
                Self::new(
                    StatusCode::BAD_REQUEST,
                    "oauth_failed",
                    "authorization could not be completed",
                )
            }
            AuthError::MalformedProfile { reason } => {
                tracing::warn!(reason = %reason, "malformed provider profile");
                Self::new(
                    StatusCode::BAD_REQUEST,
                    "oauth_failed",
                    "authorization could not be completed",
                )
            }
            other => {
                tracing::error!(error = %other, "auth engine error");
                Self::internal()
            }
        }
    }
}

impl From<kyros_crypto::CryptoError> for ApiError {
    fn from(err: kyros_crypto::CryptoError) -> Self {
        tracing::error!(error = %err, "crypto primitive error");
        Self::internal()
    }
}

impl From<kyros_cache::CacheError> for ApiError {
    fn from(err: kyros_cache::CacheError) -> Self {
        tracing::error!(error = %err, "cache error");
        Self::internal()
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::validation("request validation failed").with_details(err.to_string())
    }
}
