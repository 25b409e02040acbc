//! Project and task CRUD
//!
//! Thin proxies over the store; the gateway adds authentication, input
//! validation and owner scoping, nothing more. Identifiers are parsed by
//! hand so a malformed id yields the taxonomy's `invalid_id` instead of a
//! framework rejection.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use kyros_store::{NewProject, NewTask, Project, Task};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, CurrentUser};

const TASK_STATUSES: [&str; 3] = ["todo", "doing", "done"];

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::invalid_id())
}

/// Project create/update payload
#[derive(Debug, Deserialize, Validate)]
pub struct ProjectRequest {
    /// Display name
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    /// Free-form description
    #[serde(default)]
    #[validate(length(max = 1000))]
    pub description: String,
}

/// Task creation payload
#[derive(Debug, Deserialize, Validate)]
pub struct TaskCreateRequest {
    /// Task title
    #[validate(length(min = 1, max = 200))]
    pub title: String,
}

/// Task update payload; absent fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct TaskUpdateRequest {
    /// New title
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    /// New workflow status
    pub status: Option<String>,
}

/// `GET /api/projects`
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> ApiResult<Json<Vec<Project>>> {
    Ok(Json(state.projects.list_projects(user.id).await?))
}

/// `POST /api/projects`
pub async fn create_project(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<ProjectRequest>,
) -> ApiResult<(StatusCode, Json<Project>)> {
    req.validate()?;
    let project = state
        .projects
        .create_project(
            user.id,
            NewProject {
                name: req.name,
                description: req.description,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// `GET /api/projects/{id}`
pub async fn get_project(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<Project>> {
    let id = parse_id(&id)?;
    Ok(Json(state.projects.get_project(id, user.id).await?))
}

/// `PUT /api/projects/{id}`
pub async fn update_project(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<ProjectRequest>,
) -> ApiResult<Json<Project>> {
    req.validate()?;
    let id = parse_id(&id)?;
    let project = state
        .projects
        .update_project(
            id,
            user.id,
            NewProject {
                name: req.name,
                description: req.description,
            },
        )
        .await?;
    Ok(Json(project))
}

/// `DELETE /api/projects/{id}`
pub async fn delete_project(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    state.projects.delete_project(id, user.id).await?;
    Ok(Json(json!({"message": "project deleted"})))
}

/// `GET /api/projects/{id}/tasks`
pub async fn list_tasks(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Task>>> {
    let id = parse_id(&id)?;
    Ok(Json(state.projects.list_tasks(id, user.id).await?))
}

/// `POST /api/projects/{id}/tasks`
pub async fn create_task(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<TaskCreateRequest>,
) -> ApiResult<(StatusCode, Json<Task>)> {
    req.validate()?;
    let id = parse_id(&id)?;
    let task = state
        .projects
        .create_task(id, user.id, NewTask { title: req.title })
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// `PUT /api/tasks/{id}`
pub async fn update_task(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<TaskUpdateRequest>,
) -> ApiResult<Json<Task>> {
    req.validate()?;
    if let Some(status) = &req.status
        && !TASK_STATUSES.contains(&status.as_str())
    {
        return Err(
            ApiError::validation("unknown task status").with_details(TASK_STATUSES.join(", "))
        );
    }
    let id = parse_id(&id)?;
    let task = state
        .projects
        .update_task(id, user.id, req.title, req.status)
        .await?;
    Ok(Json(task))
}

/// `DELETE /api/tasks/{id}`
pub async fn delete_task(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let id = parse_id(&id)?;
    state.projects.delete_task(id, user.id).await?;
    Ok(Json(json!({"message": "task deleted"})))
}
