//! In-process backend
//!
//! Mirrors the Postgres contracts over plain maps for tests and local
//! development. Uniqueness checks match the database indices: exact on
//! username, case-insensitive on email.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::models::{NewProject, NewTask, NewUser, Project, Task, User};
use crate::store::{ProjectStore, UserStore};

/// In-memory [`UserStore`] + [`ProjectStore`]
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    projects: RwLock<HashMap<Uuid, Project>>,
    tasks: RwLock<HashMap<Uuid, Task>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn owned_project(&self, id: Uuid, owner: Uuid) -> StoreResult<Project> {
        self.projects
            .read()
            .get(&id)
            .filter(|p| p.owner_id == owner)
            .cloned()
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut users = self.users.write();
        if users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(&new.email))
        {
            return Err(StoreError::Conflict {
                field: "email".to_string(),
            });
        }
        if users.values().any(|u| u.username == new.username) {
            return Err(StoreError::Conflict {
                field: "username".to_string(),
            });
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            is_active: true,
            mfa_enabled: false,
            mfa_secret: None,
            backup_codes: None,
            created_at: Utc::now(),
        };
        users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn get_user_by_id(&self, id: Uuid) -> StoreResult<User> {
        self.users
            .read()
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<User> {
        self.users
            .read()
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<User> {
        self.users
            .read()
            .values()
            .find(|u| u.username == username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_user_mfa(
        &self,
        id: Uuid,
        enabled: bool,
        secret: Option<String>,
        backup_codes: Option<Vec<String>>,
    ) -> StoreResult<()> {
        let mut users = self.users.write();
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.mfa_enabled = enabled;
        user.mfa_secret = secret;
        user.backup_codes = backup_codes;
        Ok(())
    }

    async fn update_backup_codes(&self, id: Uuid, backup_codes: Vec<String>) -> StoreResult<()> {
        let mut users = self.users.write();
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.backup_codes = Some(backup_codes);
        Ok(())
    }
}

#[async_trait]
impl ProjectStore for MemoryStore {
    async fn create_project(&self, owner: Uuid, new: NewProject) -> StoreResult<Project> {
        let project = Project {
            id: Uuid::new_v4(),
            owner_id: owner,
            name: new.name,
            description: new.description,
            created_at: Utc::now(),
        };
        self.projects.write().insert(project.id, project.clone());
        Ok(project)
    }

    async fn list_projects(&self, owner: Uuid) -> StoreResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .projects
            .read()
            .values()
            .filter(|p| p.owner_id == owner)
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn get_project(&self, id: Uuid, owner: Uuid) -> StoreResult<Project> {
        self.owned_project(id, owner)
    }

    async fn update_project(&self, id: Uuid, owner: Uuid, new: NewProject) -> StoreResult<Project> {
        let mut projects = self.projects.write();
        let project = projects
            .get_mut(&id)
            .filter(|p| p.owner_id == owner)
            .ok_or(StoreError::NotFound)?;
        project.name = new.name;
        project.description = new.description;
        Ok(project.clone())
    }

    async fn delete_project(&self, id: Uuid, owner: Uuid) -> StoreResult<()> {
        let removed = {
            let mut projects = self.projects.write();
            let owned = projects.get(&id).is_some_and(|p| p.owner_id == owner);
            if owned {
                projects.remove(&id);
            }
            owned
        };
        if !removed {
            return Err(StoreError::NotFound);
        }
        self.tasks.write().retain(|_, t| t.project_id != id);
        Ok(())
    }

    async fn create_task(&self, project_id: Uuid, owner: Uuid, new: NewTask) -> StoreResult<Task> {
        self.owned_project(project_id, owner)?;
        let task = Task {
            id: Uuid::new_v4(),
            project_id,
            title: new.title,
            status: "todo".to_string(),
            created_at: Utc::now(),
        };
        self.tasks.write().insert(task.id, task.clone());
        Ok(task)
    }

    async fn list_tasks(&self, project_id: Uuid, owner: Uuid) -> StoreResult<Vec<Task>> {
        self.owned_project(project_id, owner)?;
        let mut tasks: Vec<Task> = self
            .tasks
            .read()
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(tasks)
    }

    async fn update_task(
        &self,
        id: Uuid,
        owner: Uuid,
        title: Option<String>,
        status: Option<String>,
    ) -> StoreResult<Task> {
        let project_id = self
            .tasks
            .read()
            .get(&id)
            .map(|t| t.project_id)
            .ok_or(StoreError::NotFound)?;
        self.owned_project(project_id, owner)?;

        let mut tasks = self.tasks.write();
        let task = tasks.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(title) = title {
            task.title = title;
        }
        if let Some(status) = status {
            task.status = status;
        }
        Ok(task.clone())
    }

    async fn delete_task(&self, id: Uuid, owner: Uuid) -> StoreResult<()> {
        let project_id = self
            .tasks
            .read()
            .get(&id)
            .map(|t| t.project_id)
            .ok_or(StoreError::NotFound)?;
        self.owned_project(project_id, owner)?;
        self.tasks.write().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$2b$12$hash".to_string(),
            role: "user".to_string(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_email_conflicts_case_insensitively() {
        let store = MemoryStore::new();
        store.create_user(new_user("a", "O@X.IO")).await.unwrap();
        let err = store.create_user(new_user("b", "o@x.io")).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field } if field == "email"));
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let store = MemoryStore::new();
        store.create_user(new_user("ops", "a@x.io")).await.unwrap();
        let err = store
            .create_user(new_user("ops", "b@x.io"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { field } if field == "username"));
    }

    #[tokio::test]
    async fn test_lookup_sentinel() {
        let store = MemoryStore::new();
        assert!(
            store
                .get_user_by_email("missing@x.io")
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_mfa_update_roundtrip() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("ops", "o@x.io")).await.unwrap();
        store
            .update_user_mfa(
                user.id,
                true,
                Some("enc:secret".to_string()),
                Some(vec!["digest".to_string()]),
            )
            .await
            .unwrap();
        let reloaded = store.get_user_by_id(user.id).await.unwrap();
        assert!(reloaded.mfa_enabled);
        assert_eq!(reloaded.mfa_secret.as_deref(), Some("enc:secret"));
    }

    #[tokio::test]
    async fn test_project_ownership_is_enforced() {
        let store = MemoryStore::new();
        let owner = store.create_user(new_user("a", "a@x.io")).await.unwrap();
        let other = store.create_user(new_user("b", "b@x.io")).await.unwrap();
        let project = store
            .create_project(
                owner.id,
                NewProject {
                    name: "p".to_string(),
                    description: String::new(),
                },
            )
            .await
            .unwrap();
        assert!(
            store
                .get_project(project.id, other.id)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_deleting_project_drops_tasks() {
        let store = MemoryStore::new();
        let owner = store.create_user(new_user("a", "a@x.io")).await.unwrap();
        let project = store
            .create_project(
                owner.id,
                NewProject {
                    name: "p".to_string(),
                    description: String::new(),
                },
            )
            .await
            .unwrap();
        let task = store
            .create_task(
                project.id,
                owner.id,
                NewTask {
                    title: "t".to_string(),
                },
            )
            .await
            .unwrap();
        store.delete_project(project.id, owner.id).await.unwrap();
        assert!(
            store
                .delete_task(task.id, owner.id)
                .await
                .unwrap_err()
                .is_not_found()
        );
    }
}
