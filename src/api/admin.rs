//! Admin API endpoints
//!
//! All routes require the admin role on top of authentication:
//! - GET  /api/v1/admin/dashboard - Entity counts for the admin overview
//! - GET  /api/v1/admin/stats - Process/system resource statistics
//! - POST /api/v1/admin/backup - Write a tar.gz backup archive
//! - GET  /api/v1/admin/users - List the organization's users
//! - POST /api/v1/admin/users - Create a user
//! - PUT  /api/v1/admin/users/{id}/role - Change a user's role
//! - PUT  /api/v1/admin/users/{id}/status - Suspend or reactivate a user

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::process;
use sysinfo::{Pid, System};

use crate::api::auth::{create_user, UserResponse};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::config::DatabaseDriver;

/// Response for the admin dashboard
#[derive(Debug, Serialize)]
pub struct DashboardResponse {
    pub users: i64,
    pub contacts: i64,
    pub projects: i64,
    pub active_projects: i64,
    pub tasks: i64,
    pub journal_entries: i64,
    pub budgets: i64,
    pub files: i64,
}

/// Response for system stats (CPU, memory usage)
#[derive(Debug, Serialize)]
pub struct SystemStatsResponse {
    /// App version
    pub version: String,
    /// Process memory usage in bytes
    pub memory_bytes: u64,
    /// Process memory usage formatted (e.g., "45.2 MB")
    pub memory_formatted: String,
    /// System total memory in bytes
    pub system_total_memory: u64,
    /// System used memory in bytes
    pub system_used_memory: u64,
    /// Operating system name
    pub os_name: String,
    /// Process uptime in seconds
    pub uptime_seconds: u64,
    /// Uptime formatted (e.g., "2h 15m")
    pub uptime_formatted: String,
    /// Total requests processed
    pub total_requests: u64,
    /// Average response time in milliseconds
    pub avg_response_time_ms: f64,
}

/// Response for a completed backup
#[derive(Debug, Serialize)]
pub struct BackupResponse {
    pub archive: String,
    pub size_bytes: u64,
}

/// Request body for changing a user's role
#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: String,
}

/// Request body for changing a user's status
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

/// Build the admin router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/stats", get(get_system_stats))
        .route("/backup", post(run_backup))
        .route("/users", get(list_users))
        .route("/users", post(create_user))
        .route("/users/{id}/role", put(set_user_role))
        .route("/users/{id}/status", put(set_user_status))
}

/// GET /api/v1/admin/dashboard
async fn get_dashboard(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<DashboardResponse>, ApiError> {
    let org_id = user.org_id();

    let users = state
        .user_service
        .list_users(org_id)
        .await
        .map_err(ApiError::internal_error)?
        .len() as i64;
    let contacts = state
        .contact_service
        .list(
            org_id,
            &crate::models::ListParams::new(1, 1),
            &crate::db::repositories::ContactFilter {
                include_archived: true,
                ..Default::default()
            },
        )
        .await?
        .total;
    let projects = state.project_service.count(org_id, None).await?;
    let active_projects = state
        .project_service
        .count(org_id, Some(crate::models::ProjectStatus::Active))
        .await?;
    let journal_entries = state.ledger_service.count_entries(org_id).await?;
    let budgets = state.budget_service.count(org_id).await?;

    let tasks = state.task_service.count(org_id).await?;
    let files = state
        .file_repo
        .count_by_org(org_id)
        .await
        .map_err(ApiError::internal_error)?;

    Ok(Json(DashboardResponse {
        users,
        contacts,
        projects,
        active_projects,
        tasks,
        journal_entries,
        budgets,
        files,
    }))
}

/// GET /api/v1/admin/stats
async fn get_system_stats(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<SystemStatsResponse>, ApiError> {
    let mut sys = System::new_all();
    sys.refresh_all();

    let pid = Pid::from_u32(process::id());
    let memory_bytes = sys.process(pid).map(|proc| proc.memory()).unwrap_or(0);

    let uptime_seconds = state.request_stats.uptime_seconds();

    Ok(Json(SystemStatsResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        memory_bytes,
        memory_formatted: format_bytes(memory_bytes),
        system_total_memory: sys.total_memory(),
        system_used_memory: sys.used_memory(),
        os_name: System::name().unwrap_or_else(|| "unknown".to_string()),
        uptime_seconds,
        uptime_formatted: format_uptime(uptime_seconds),
        total_requests: state.request_stats.total_requests(),
        avg_response_time_ms: state.request_stats.avg_response_time_us() / 1000.0,
    }))
}

/// POST /api/v1/admin/backup
///
/// Writes `backups/atrium-backup-<timestamp>.tar.gz` containing the SQLite
/// database file and the uploads directory. MySQL deployments are refused;
/// dump those server-side.
async fn run_backup(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<Json<BackupResponse>, ApiError> {
    if state.pool.driver() != DatabaseDriver::Sqlite {
        return Err(ApiError::validation_error(
            "Online backup is only supported for SQLite deployments",
        ));
    }

    let db_path = crate::services::backup::database_file_path(&state.database_url)
        .ok_or_else(|| ApiError::validation_error("Database file path is not available"))?;
    let uploads = state.upload_config.path.clone();

    let archive = tokio::task::spawn_blocking(move || {
        crate::services::backup::write_backup_archive(
            &db_path,
            &uploads,
            std::path::Path::new("backups"),
        )
    })
    .await
    .map_err(ApiError::internal_error)?
    .map_err(ApiError::internal_error)?;

    let size_bytes = std::fs::metadata(&archive)
        .map(|m| m.len())
        .unwrap_or(0);

    Ok(Json(BackupResponse {
        archive: archive.display().to_string(),
        size_bytes,
    }))
}

/// GET /api/v1/admin/users
async fn list_users(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = state
        .user_service
        .list_users(user.org_id())
        .await
        .map_err(ApiError::internal_error)?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

/// PUT /api/v1/admin/users/{id}/role
async fn set_user_role(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let role = body
        .role
        .parse()
        .map_err(|_| ApiError::validation_error(format!("Invalid role: {}", body.role)))?;

    let updated = state.user_service.set_role(user.org_id(), id, role).await?;
    Ok(Json(updated.into()))
}

/// PUT /api/v1/admin/users/{id}/status
async fn set_user_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<SetStatusRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let status = body
        .status
        .parse()
        .map_err(|_| ApiError::validation_error(format!("Invalid status: {}", body.status)))?;

    if id == user.0.id && status == crate::models::UserStatus::Suspended {
        return Err(ApiError::validation_error(
            "You cannot suspend your own account",
        ));
    }

    let updated = state
        .user_service
        .set_status(user.org_id(), id, status)
        .await?;
    Ok(Json(updated.into()))
}

/// Format a byte count as a human-readable string
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let bytes = bytes as f64;
    if bytes >= GB {
        format!("{:.1} GB", bytes / GB)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes / MB)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes / KB)
    } else {
        format!("{} B", bytes as u64)
    }
}

/// Format an uptime in seconds as "2h 15m" style text
fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
