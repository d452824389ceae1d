//! Task API endpoints (cross-project operations)
//!
//! - GET    /api/v1/tasks/mine - Open tasks assigned to the caller
//! - GET    /api/v1/tasks/{id} - Get a task
//! - PUT    /api/v1/tasks/{id} - Update a task
//! - DELETE /api/v1/tasks/{id} - Delete a task
//!
//! Task creation and per-project listing live under /projects/{id}/tasks.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Capability, Task, UpdateTaskInput};

/// Build the tasks router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/mine", get(my_tasks))
        .route("/{id}", get(get_task))
        .route("/{id}", put(update_task))
        .route("/{id}", delete(delete_task))
}

/// GET /api/v1/tasks/mine
async fn my_tasks(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Task>>, ApiError> {
    // Every role may see its own assignments
    let tasks = state
        .task_service
        .list_assigned(user.org_id(), user.0.id)
        .await?;
    Ok(Json(tasks))
}

/// GET /api/v1/tasks/{id}
async fn get_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Task>, ApiError> {
    user.require(Capability::ProjectsView)?;

    let task = state.task_service.get(user.org_id(), id).await?;
    Ok(Json(task))
}

/// PUT /api/v1/tasks/{id}
///
/// Assignees may update their own tasks (status moves, notes); everything
/// else needs the projects-manage capability.
async fn update_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateTaskInput>,
) -> Result<Json<Task>, ApiError> {
    let task = state.task_service.get(user.org_id(), id).await?;
    let is_assignee = task.assignee_id == Some(user.0.id);
    if !is_assignee {
        user.require(Capability::ProjectsManage)?;
    }

    let task = state.task_service.update(user.org_id(), id, input).await?;
    Ok(Json(task))
}

/// DELETE /api/v1/tasks/{id}
async fn delete_task(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require(Capability::ProjectsManage)?;

    state.task_service.delete(user.org_id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
