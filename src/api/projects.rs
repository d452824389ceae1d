//! Project API endpoints
//!
//! - GET    /api/v1/projects - List projects with pagination
//! - POST   /api/v1/projects - Create a project
//! - GET    /api/v1/projects/{id} - Get a project
//! - PUT    /api/v1/projects/{id} - Update a project
//! - DELETE /api/v1/projects/{id} - Delete a project (and its tasks)
//! - GET    /api/v1/projects/{id}/tasks - List the project's tasks
//! - POST   /api/v1/projects/{id}/tasks - Create a task in the project

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::str::FromStr;

use crate::api::common::{default_page, default_per_page};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{
    Capability, CreateProjectInput, CreateTaskInput, ListParams, PagedResult, Project,
    ProjectStatus, Task, TaskStatus,
};

/// Query parameters for listing projects
#[derive(Debug, Deserialize)]
pub struct ListProjectsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Filter by status
    pub status: Option<String>,
}

/// Query parameters for listing a project's tasks
#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub status: Option<String>,
}

/// Build the projects router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_projects))
        .route("/", post(create_project))
        .route("/{id}", get(get_project))
        .route("/{id}", put(update_project))
        .route("/{id}", delete(delete_project))
        .route("/{id}/tasks", get(list_project_tasks))
        .route("/{id}/tasks", post(create_task))
}

/// GET /api/v1/projects
async fn list_projects(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListProjectsQuery>,
) -> Result<Json<PagedResult<Project>>, ApiError> {
    user.require(Capability::ProjectsView)?;

    let status = match query.status.as_deref() {
        Some(raw) => Some(
            ProjectStatus::from_str(raw)
                .map_err(|_| ApiError::validation_error(format!("Invalid status: {}", raw)))?,
        ),
        None => None,
    };
    let params = ListParams::new(query.page, query.per_page);

    let result = state
        .project_service
        .list(user.org_id(), &params, status)
        .await?;
    Ok(Json(result))
}

/// POST /api/v1/projects
async fn create_project(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<CreateProjectInput>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    user.require(Capability::ProjectsManage)?;

    let project = state.project_service.create(user.org_id(), input).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// GET /api/v1/projects/{id}
async fn get_project(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Project>, ApiError> {
    user.require(Capability::ProjectsView)?;

    let project = state.project_service.get(user.org_id(), id).await?;
    Ok(Json(project))
}

/// PUT /api/v1/projects/{id}
async fn update_project(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(input): Json<crate::models::UpdateProjectInput>,
) -> Result<Json<Project>, ApiError> {
    user.require(Capability::ProjectsManage)?;

    let project = state
        .project_service
        .update(user.org_id(), id, input)
        .await?;
    Ok(Json(project))
}

/// DELETE /api/v1/projects/{id}
async fn delete_project(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require(Capability::ProjectsManage)?;

    state.project_service.delete(user.org_id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/projects/{id}/tasks
async fn list_project_tasks(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<PagedResult<Task>>, ApiError> {
    user.require(Capability::ProjectsView)?;

    let status = match query.status.as_deref() {
        Some(raw) => Some(
            TaskStatus::from_str(raw)
                .map_err(|_| ApiError::validation_error(format!("Invalid status: {}", raw)))?,
        ),
        None => None,
    };
    let params = ListParams::new(query.page, query.per_page);

    let result = state
        .task_service
        .list_by_project(user.org_id(), id, &params, status)
        .await?;
    Ok(Json(result))
}

/// POST /api/v1/projects/{id}/tasks
async fn create_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(input): Json<CreateTaskInput>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    user.require(Capability::ProjectsManage)?;

    let task = state.task_service.create(user.org_id(), id, input).await?;
    Ok((StatusCode::CREATED, Json(task)))
}
