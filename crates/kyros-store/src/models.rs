//! Row types and projections

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A platform account as stored
///
/// `password_hash` is always a bcrypt hash; `mfa_secret` is an at-rest
/// envelope (or plaintext when encryption is disabled); `backup_codes`
/// holds SHA-256 digests, with consumed entries prefixed `used:`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct User {
    /// Stable account id
    pub id: Uuid,
    /// Unique username
    pub username: String,
    /// Unique email (case-insensitive)
    pub email: String,
    /// bcrypt hash of the password
    pub password_hash: String,
    /// Coarse role label (`user`, `admin`)
    pub role: String,
    /// Inactive accounts cannot authenticate
    pub is_active: bool,
    /// Whether a second factor is required at login
    pub mfa_enabled: bool,
    /// TOTP secret, enveloped at rest
    pub mfa_secret: Option<String>,
    /// Hashed one-time recovery codes
    pub backup_codes: Option<Vec<String>>,
    /// Account creation time
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Public projection safe to return to clients
    pub fn public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            mfa_enabled: self.mfa_enabled,
            created_at: self.created_at,
        }
    }
}

/// Client-facing user shape - no hashes, no secrets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    /// Stable account id
    pub id: Uuid,
    /// Username
    pub username: String,
    /// Email
    pub email: String,
    /// Role label
    pub role: String,
    /// Whether MFA is enabled
    pub mfa_enabled: bool,
    /// Account creation time
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a user
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Unique username
    pub username: String,
    /// Unique email
    pub email: String,
    /// bcrypt hash, never plaintext
    pub password_hash: String,
    /// Role label
    pub role: String,
}

/// A project row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Project {
    /// Project id
    pub id: Uuid,
    /// Owning user
    pub owner_id: Uuid,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a project
#[derive(Debug, Clone)]
pub struct NewProject {
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
}

/// A task row
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Task {
    /// Task id
    pub id: Uuid,
    /// Parent project
    pub project_id: Uuid,
    /// Task title
    pub title: String,
    /// Workflow status (`todo`, `doing`, `done`)
    pub status: String,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a task
#[derive(Debug, Clone)]
pub struct NewTask {
    /// Task title
    pub title: String,
}
