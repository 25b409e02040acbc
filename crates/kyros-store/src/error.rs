//! Store error types

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors produced by store backends
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The requested row does not exist
    ///
    /// A sentinel, not a failure: callers branch on it (login timing
    /// equalisation, find-or-create) without touching the error path used
    /// for transport problems.
    #[error("not found")]
    NotFound,

    /// A unique constraint was violated
    #[error("conflict on {field}")]
    Conflict {
        /// Field whose uniqueness was violated (`email`, `username`)
        field: String,
    },

    /// Database transport or query error
    #[error("database error: {0}")]
    Database(sqlx::Error),

    /// Migration failure at startup
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                let constraint = db.constraint().unwrap_or_default();
                let field = if constraint.contains("email") {
                    "email"
                } else if constraint.contains("username") {
                    "username"
                } else {
                    "unique"
                };
                Self::Conflict {
                    field: field.to_string(),
                }
            }
            _ => Self::Database(err),
        }
    }
}

impl StoreError {
    /// Whether this error is the not-found sentinel
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
