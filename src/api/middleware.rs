//! API middleware
//!
//! Contains:
//! - `AppState` with the shared services
//! - the `ApiError` JSON envelope and status mapping
//! - bearer-token authentication middleware and the `AuthenticatedUser`
//!   extractor
//! - capability checks against the caller's role
//! - lightweight request statistics

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::models::{Capability, User};
use crate::services::{
    budget::BudgetServiceError, contact::ContactServiceError, ledger::LedgerError,
    project::ProjectServiceError, task::TaskServiceError, user::UserServiceError,
};
use crate::services::{
    BudgetService, ContactService, LedgerService, LoginRateLimiter, ProjectService, TaskService,
    UserService,
};

// ============================================================================
// Request Statistics
// ============================================================================

/// Lightweight request statistics using atomic operations (no locks)
pub struct RequestStats {
    /// Total number of requests processed
    total_requests: AtomicU64,
    /// Total response time in microseconds (for calculating average)
    total_response_time_us: AtomicU64,
    /// Application start time
    start_time: Instant,
}

impl RequestStats {
    /// Create new stats tracker
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a request with its response time
    pub fn record(&self, duration_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(duration_us, Ordering::Relaxed);
    }

    /// Get total request count
    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Get average response time in microseconds
    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let total_time = self.total_response_time_us.load(Ordering::Relaxed);
        total_time as f64 / total as f64
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: crate::db::DynDatabasePool,
    /// Raw database URL from configuration (the backup endpoint resolves
    /// the SQLite file path from it)
    pub database_url: String,
    pub user_service: Arc<UserService>,
    pub contact_service: Arc<ContactService>,
    pub project_service: Arc<ProjectService>,
    pub task_service: Arc<TaskService>,
    pub ledger_service: Arc<LedgerService>,
    pub budget_service: Arc<BudgetService>,
    pub file_repo: Arc<dyn crate::db::repositories::FileShareRepository>,
    pub upload_config: Arc<crate::config::UploadConfig>,
    pub request_stats: Arc<RequestStats>,
    pub rate_limiter: Arc<LoginRateLimiter>,
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl AuthenticatedUser {
    /// Check a capability of the caller's role, failing with 403.
    pub fn require(&self, capability: Capability) -> Result<(), ApiError> {
        if self.0.can(capability) {
            Ok(())
        } else {
            Err(ApiError::forbidden(format!(
                "Missing capability: {}",
                capability
            )))
        }
    }

    /// The caller's organization
    pub fn org_id(&self) -> i64 {
        self.0.org_id
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("RATE_LIMITED", message)
    }

    /// Internal errors are logged with full detail and surfaced generically.
    pub fn internal_error(err: impl std::fmt::Display) -> Self {
        tracing::error!(error = %err, "internal error");
        Self::new("INTERNAL_ERROR", "An internal error occurred")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            "CONTENTION" => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

// ============================================================================
// Service error mapping
// ============================================================================

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::AlreadyExists(msg) => ApiError::conflict(msg),
            UserServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<ContactServiceError> for ApiError {
    fn from(err: ContactServiceError) -> Self {
        match err {
            ContactServiceError::NotFound(id) => {
                ApiError::not_found(format!("Contact not found: {}", id))
            }
            ContactServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ContactServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<ProjectServiceError> for ApiError {
    fn from(err: ProjectServiceError) -> Self {
        match err {
            ProjectServiceError::NotFound(id) => {
                ApiError::not_found(format!("Project not found: {}", id))
            }
            ProjectServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            ProjectServiceError::DuplicateCode(code) => {
                ApiError::conflict(format!("Project code already exists: {}", code))
            }
            err @ ProjectServiceError::InvalidTransition { .. } => {
                ApiError::validation_error(err.to_string())
            }
            ProjectServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<TaskServiceError> for ApiError {
    fn from(err: TaskServiceError) -> Self {
        match err {
            TaskServiceError::NotFound(id) => {
                ApiError::not_found(format!("Task not found: {}", id))
            }
            TaskServiceError::ProjectNotFound(id) => {
                ApiError::not_found(format!("Project not found: {}", id))
            }
            TaskServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            TaskServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            // Domain-financial errors are client errors with the message
            // surfaced verbatim
            err @ LedgerError::NotBalanced { .. } => ApiError::validation_error(err.to_string()),
            LedgerError::PeriodLocked => {
                ApiError::validation_error(LedgerError::PeriodLocked.to_string())
            }
            err @ LedgerError::NoPeriodForDate(_) => ApiError::validation_error(err.to_string()),
            LedgerError::PeriodNotFound(id) => {
                ApiError::not_found(format!("Accounting period not found: {}", id))
            }
            LedgerError::ValidationError(msg) => ApiError::validation_error(msg),
            LedgerError::NotFound(what) => ApiError::not_found(format!("Not found: {}", what)),
            LedgerError::DuplicateCode(code) => {
                ApiError::conflict(format!("Account code already exists: {}", code))
            }
            err @ LedgerError::Contention { .. } => ApiError::new("CONTENTION", err.to_string()),
            LedgerError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

impl From<BudgetServiceError> for ApiError {
    fn from(err: BudgetServiceError) -> Self {
        match err {
            BudgetServiceError::NotFound(id) => {
                ApiError::not_found(format!("Budget not found: {}", id))
            }
            BudgetServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            BudgetServiceError::InternalError(e) => ApiError::internal_error(e),
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Extract the bearer token from the Authorization header
fn extract_bearer_token(parts: &axum::http::HeaderMap) -> Option<String> {
    let auth_header = parts.get(header::AUTHORIZATION)?;
    let auth_str = auth_header.to_str().ok()?;
    auth_str.strip_prefix("Bearer ").map(|t| t.to_string())
}

/// Authentication middleware: resolves the bearer token to a user and
/// stashes it in the request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await
        .map_err(ApiError::internal_error)?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Admin authorization middleware, layered inside `require_auth`
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// Request statistics middleware
///
/// Records request count and response time for the admin stats endpoint.
/// Uses atomic operations for minimal overhead.
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let response = next.run(request).await;

    let duration_us = start.elapsed().as_micros() as u64;
    state.request_stats.record(duration_us);

    response
}

/// Demo-mode guard: blocks all write methods when compiled with
/// `--features demo`.
#[cfg(feature = "demo")]
pub async fn demo_guard(request: Request, next: Next) -> Result<Response, ApiError> {
    use axum::http::Method;

    let writable = matches!(
        *request.method(),
        Method::POST | Method::PUT | Method::PATCH | Method::DELETE
    );
    let is_login = request.uri().path().ends_with("/auth/login");

    if writable && !is_login {
        return Err(ApiError::forbidden("Write operations are disabled in demo mode"));
    }

    Ok(next.run(request).await)
}

// Extractor for AuthenticatedUser from request extensions
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}
