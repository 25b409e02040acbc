//! Postgres backend
//!
//! Thin typed queries over a bounded `sqlx` pool. The pool is sized for
//! bursty gateway traffic and checks connection liveness before handing a
//! connection out; embedded migrations run at startup.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{NewProject, NewTask, NewUser, Project, Task, User};
use crate::store::{ProjectStore, UserStore};

/// Connection-pool sizing
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Connections kept warm
    pub min_connections: u32,
    /// Hard cap on concurrent connections
    pub max_connections: u32,
    /// Recycle connections after this lifetime
    pub max_lifetime: Duration,
    /// Close connections idle longer than this
    pub idle_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 2,
            max_connections: 20,
            max_lifetime: Duration::from_secs(60 * 60),
            idle_timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Postgres-backed store
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect, size the pool, and run migrations
    pub async fn connect(url: &str, config: PoolConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .max_lifetime(config.max_lifetime)
            .idle_timeout(config.idle_timeout)
            .test_before_acquire(true)
            .connect(url)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Build a store over an existing pool (tests, shared pools)
    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username, email, password_hash, role) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(&new.role)
        .fetch_one(&self.pool)
        .await?;
        Ok(user)
    }

    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<User> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn update_user_mfa(
        &self,
        id: Uuid,
        enabled: bool,
        secret: Option<String>,
        backup_codes: Option<Vec<String>>,
    ) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE users SET mfa_enabled = $2, mfa_secret = $3, backup_codes = $4 WHERE id = $1",
        )
        .bind(id)
        .bind(enabled)
        .bind(secret)
        .bind(backup_codes)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn update_backup_codes(&self, id: Uuid, backup_codes: Vec<String>) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET backup_codes = $2 WHERE id = $1")
            .bind(id)
            .bind(backup_codes)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for PgStore {
    async fn create_project(&self, owner: Uuid, new: NewProject) -> StoreResult<Project> {
        let project = sqlx::query_as::<_, Project>(
            "INSERT INTO projects (id, owner_id, name, description) \
             VALUES ($1, $2, $3, $4) \
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(owner)
        .bind(&new.name)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(project)
    }

    async fn list_projects(&self, owner: Uuid) -> StoreResult<Vec<Project>> {
        Ok(sqlx::query_as::<_, Project>(
            "SELECT * FROM projects WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn get_project(&self, id: Uuid, owner: Uuid) -> StoreResult<Project> {
        sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn update_project(&self, id: Uuid, owner: Uuid, new: NewProject) -> StoreResult<Project> {
        sqlx::query_as::<_, Project>(
            "UPDATE projects SET name = $3, description = $4 \
             WHERE id = $1 AND owner_id = $2 \
             RETURNING *",
        )
        .bind(id)
        .bind(owner)
        .bind(&new.name)
        .bind(&new.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn delete_project(&self, id: Uuid, owner: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM projects WHERE id = $1 AND owner_id = $2")
            .bind(id)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn create_task(&self, project_id: Uuid, owner: Uuid, new: NewTask) -> StoreResult<Task> {
        // Ownership check rides along in the INSERT ... SELECT.
        sqlx::query_as::<_, Task>(
            "INSERT INTO tasks (id, project_id, title) \
             SELECT $1, p.id, $3 FROM projects p WHERE p.id = $2 AND p.owner_id = $4 \
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(project_id)
        .bind(&new.title)
        .bind(owner)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn list_tasks(&self, project_id: Uuid, owner: Uuid) -> StoreResult<Vec<Task>> {
        Ok(sqlx::query_as::<_, Task>(
            "SELECT t.* FROM tasks t \
             JOIN projects p ON p.id = t.project_id \
             WHERE t.project_id = $1 AND p.owner_id = $2 \
             ORDER BY t.created_at",
        )
        .bind(project_id)
        .bind(owner)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_task(
        &self,
        id: Uuid,
        owner: Uuid,
        title: Option<String>,
        status: Option<String>,
    ) -> StoreResult<Task> {
        sqlx::query_as::<_, Task>(
            "UPDATE tasks t SET title = COALESCE($3, t.title), status = COALESCE($4, t.status) \
             FROM projects p \
             WHERE t.id = $1 AND p.id = t.project_id AND p.owner_id = $2 \
             RETURNING t.*",
        )
        .bind(id)
        .bind(owner)
        .bind(title)
        .bind(status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)
    }

    async fn delete_task(&self, id: Uuid, owner: Uuid) -> StoreResult<()> {
        let result = sqlx::query(
            "DELETE FROM tasks t \
             USING projects p \
             WHERE t.id = $1 AND p.id = t.project_id AND p.owner_id = $2",
        )
        .bind(id)
        .bind(owner)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}
