//! Store contracts consumed by the gateway

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{NewProject, NewTask, NewUser, Project, Task, User};

/// User queries the authentication core depends on
#[async_trait]
pub trait UserStore: Send + Sync + std::fmt::Debug {
    /// Insert a new user; `Conflict` on duplicate email or username
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;

    /// Look up a user by id; `NotFound` sentinel when absent
    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<User>;

    /// Look up a user by email, case-insensitively
    async fn get_user_by_email(&self, email: &str) -> StoreResult<User>;

    /// Look up a user by username
    async fn get_user_by_username(&self, username: &str) -> StoreResult<User>;

    /// Replace the user's MFA state in one write
    async fn update_user_mfa(
        &self,
        id: Uuid,
        enabled: bool,
        secret: Option<String>,
        backup_codes: Option<Vec<String>>,
    ) -> StoreResult<()>;

    /// Rewrite the stored backup-code digests (marks consumption)
    async fn update_backup_codes(&self, id: Uuid, backup_codes: Vec<String>) -> StoreResult<()>;
}

/// Project/task CRUD the gateway merely proxies
///
/// Every operation is scoped to an owner so a handler cannot reach across
/// accounts by id guessing.
#[async_trait]
pub trait ProjectStore: Send + Sync + std::fmt::Debug {
    /// Create a project owned by `owner`
    async fn create_project(&self, owner: Uuid, new: NewProject) -> StoreResult<Project>;

    /// List the owner's projects, newest first
    async fn list_projects(&self, owner: Uuid) -> StoreResult<Vec<Project>>;

    /// Fetch one project owned by `owner`
    async fn get_project(&self, id: Uuid, owner: Uuid) -> StoreResult<Project>;

    /// Update name/description of an owned project
    async fn update_project(&self, id: Uuid, owner: Uuid, new: NewProject) -> StoreResult<Project>;

    /// Delete an owned project (tasks cascade)
    async fn delete_project(&self, id: Uuid, owner: Uuid) -> StoreResult<()>;

    /// Create a task under an owned project
    async fn create_task(&self, project_id: Uuid, owner: Uuid, new: NewTask) -> StoreResult<Task>;

    /// List tasks of an owned project
    async fn list_tasks(&self, project_id: Uuid, owner: Uuid) -> StoreResult<Vec<Task>>;

    /// Update title/status of a task in an owned project
    async fn update_task(
        &self,
        id: Uuid,
        owner: Uuid,
        title: Option<String>,
        status: Option<String>,
    ) -> StoreResult<Task>;

    /// Delete a task in an owned project
    async fn delete_task(&self, id: Uuid, owner: Uuid) -> StoreResult<()>;
}
