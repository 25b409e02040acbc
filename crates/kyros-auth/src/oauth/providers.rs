//! Provider registry and profile normalisation
//!
//! The provider set is closed and configured at startup: a provider whose
//! credentials are absent from the environment simply does not exist as far
//! as the gateway is concerned. Each provider carries its own endpoint set
//! and quirks; the output of every exchange is the same [`Profile`] shape.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Static configuration for one OAuth provider
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    /// Provider name as it appears in URLs (`google`, `github`)
    pub name: String,
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: SecretString,
    /// Redirect URL registered with the provider
    pub redirect_url: String,
    /// Scopes requested at authorization
    pub scopes: Vec<String>,
    /// Authorization-code endpoint
    pub auth_url: String,
    /// Token endpoint
    pub token_url: String,
    /// Profile endpoint
    pub userinfo_url: String,
    /// Email-listing endpoint (GitHub only)
    pub emails_url: Option<String>,
}

impl ProviderSettings {
    /// Google with its standard endpoints and scopes
    pub fn google(client_id: String, client_secret: String, redirect_url: String) -> Self {
        Self {
            name: "google".to_string(),
            client_id,
            client_secret: SecretString::new(client_secret),
            redirect_url,
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            emails_url: None,
        }
    }

    /// GitHub with its standard endpoints and scopes
    pub fn github(client_id: String, client_secret: String, redirect_url: String) -> Self {
        Self {
            name: "github".to_string(),
            client_id,
            client_secret: SecretString::new(client_secret),
            redirect_url,
            scopes: vec!["read:user".to_string(), "user:email".to_string()],
            auth_url: "https://github.com/login/oauth/authorize".to_string(),
            token_url: "https://github.com/login/oauth/access_token".to_string(),
            userinfo_url: "https://api.github.com/user".to_string(),
            emails_url: Some("https://api.github.com/user/emails".to_string()),
        }
    }
}

/// Config snapshot safe to expose on the admin surface - no secrets
#[derive(Debug, Clone, Serialize)]
pub struct ProviderSnapshot {
    /// Provider name
    pub name: String,
    /// OAuth client id
    pub client_id: String,
    /// Registered redirect URL
    pub redirect_url: String,
    /// Requested scopes
    pub scopes: Vec<String>,
}

/// A federated identity, normalised across providers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Provider-side stable id
    pub provider_id: String,
    /// Provider name
    pub provider: String,
    /// Verified email
    pub email: String,
    /// Display name, falling back to the provider login
    pub display_name: String,
    /// Avatar URL if the provider exposes one
    pub avatar: Option<String>,
    /// Provider access token
    pub access_token: String,
    /// Provider refresh token, when issued
    pub refresh_token: Option<String>,
}

/// One entry of GitHub's `/user/emails` response
#[derive(Debug, Clone, Deserialize)]
pub struct GithubEmail {
    /// Email address
    pub email: String,
    /// Whether this is the account's primary address
    pub primary: bool,
    /// Whether GitHub has verified the address
    pub verified: bool,
}

/// Pick the primary verified address from a GitHub email listing
pub fn pick_verified_email(entries: &[GithubEmail]) -> Option<String> {
    entries
        .iter()
        .find(|e| e.primary && e.verified)
        .map(|e| e.email.clone())
}

/// Map a Google userinfo document to a [`Profile`] (minus tokens)
pub fn parse_google_profile(doc: &serde_json::Value) -> AuthResult<(String, String, String, Option<String>)> {
    let id = doc
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AuthError::MalformedProfile {
            reason: "missing id".to_string(),
        })?
        .to_string();
    let email = doc
        .get("email")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AuthError::MalformedProfile {
            reason: "missing email".to_string(),
        })?
        .to_string();
    let name = doc
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or(&email)
        .to_string();
    let picture = doc
        .get("picture")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    Ok((id, email, name, picture))
}

/// Map a GitHub `/user` document to (id, login-or-name, avatar)
pub fn parse_github_user(doc: &serde_json::Value) -> AuthResult<(String, String, Option<String>)> {
    let id = doc
        .get("id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| AuthError::MalformedProfile {
            reason: "missing id".to_string(),
        })?
        .to_string();
    let login = doc.get("login").and_then(|v| v.as_str()).unwrap_or_default();
    let name = doc
        .get("name")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(login)
        .to_string();
    let avatar = doc
        .get("avatar_url")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    Ok((id, name, avatar))
}
