//! Shared file API endpoints
//!
//! - POST   /api/v1/files - Upload a file (multipart field "file")
//! - GET    /api/v1/files - List files, newest first
//! - GET    /api/v1/files/{id} - Download a file
//! - DELETE /api/v1/files/{id} - Delete a file
//!
//! File bytes live on disk under the configured upload directory with
//! UUID-based names; only metadata is stored in the database.

use axum::{
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::Response,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::Utc;
use uuid::Uuid;

use crate::api::common::PaginationQuery;
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{Capability, FileShare, PagedResult};

/// Build the files router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(upload_file))
        .route("/", get(list_files))
        .route("/{id}", get(download_file))
        .route("/{id}", delete(delete_file))
}

/// POST /api/v1/files
async fn upload_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileShare>), ApiError> {
    user.require(Capability::FilesManage)?;

    let field = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Invalid multipart body: {}", e)))?
        .ok_or_else(|| ApiError::validation_error("Missing file field"))?;

    if field.name() != Some("file") {
        return Err(ApiError::validation_error(
            "Expected a multipart field named 'file'",
        ));
    }

    let filename = field
        .file_name()
        .map(sanitize_filename)
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::validation_error("Missing filename"))?;
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();

    if !state.upload_config.is_type_allowed(&content_type) {
        return Err(ApiError::validation_error(format!(
            "File type '{}' is not allowed",
            content_type
        )));
    }

    let data = field
        .bytes()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read upload: {}", e)))?;

    if data.len() as u64 > state.upload_config.max_file_size {
        return Err(ApiError::validation_error(format!(
            "File exceeds the maximum size of {} bytes",
            state.upload_config.max_file_size
        )));
    }
    if data.is_empty() {
        return Err(ApiError::validation_error("Uploaded file is empty"));
    }

    // UUID-based name on disk; the extension is kept for convenience
    let extension = std::path::Path::new(&filename)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("bin");
    let stored_name = format!("{}.{}", Uuid::new_v4().simple(), extension);

    tokio::fs::create_dir_all(&state.upload_config.path)
        .await
        .map_err(ApiError::internal_error)?;
    let disk_path = state.upload_config.path.join(&stored_name);
    tokio::fs::write(&disk_path, &data)
        .await
        .map_err(ApiError::internal_error)?;

    let record = FileShare {
        id: 0,
        org_id: user.org_id(),
        filename,
        stored_name,
        content_type,
        size_bytes: data.len() as i64,
        uploaded_by: user.0.id,
        created_at: Utc::now(),
    };

    let created = match state.file_repo.create(&record).await {
        Ok(created) => created,
        Err(err) => {
            // Don't leave orphaned bytes behind if the metadata insert fails
            tokio::fs::remove_file(&disk_path).await.ok();
            return Err(ApiError::internal_error(err));
        }
    };

    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/v1/files
async fn list_files(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<PagedResult<FileShare>>, ApiError> {
    user.require(Capability::FilesView)?;

    let result = state
        .file_repo
        .list(user.org_id(), &query.params())
        .await
        .map_err(ApiError::internal_error)?;
    Ok(Json(result))
}

/// GET /api/v1/files/{id}
async fn download_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    user.require(Capability::FilesView)?;

    let record = state
        .file_repo
        .get_by_id(user.org_id(), id)
        .await
        .map_err(ApiError::internal_error)?
        .ok_or_else(|| ApiError::not_found(format!("File not found: {}", id)))?;

    let disk_path = state.upload_config.path.join(&record.stored_name);
    let data = tokio::fs::read(&disk_path)
        .await
        .map_err(|_| ApiError::not_found(format!("File not found: {}", id)))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, record.content_type)
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", record.filename),
        )
        .body(Body::from(data))
        .map_err(ApiError::internal_error)
}

/// DELETE /api/v1/files/{id}
async fn delete_file(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require(Capability::FilesManage)?;

    let record = state
        .file_repo
        .get_by_id(user.org_id(), id)
        .await
        .map_err(ApiError::internal_error)?
        .ok_or_else(|| ApiError::not_found(format!("File not found: {}", id)))?;

    state
        .file_repo
        .delete(user.org_id(), id)
        .await
        .map_err(ApiError::internal_error)?;

    // Remove the bytes after the record; a missing file is not an error
    let disk_path = state.upload_config.path.join(&record.stored_name);
    tokio::fs::remove_file(&disk_path).await.ok();

    Ok(StatusCode::NO_CONTENT)
}

/// Strip any path components from a client-supplied filename
fn sanitize_filename(raw: &str) -> String {
    raw.rsplit(['/', '\\'])
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_control())
        .take(255)
        .collect()
}
