//! Authentication API endpoints
//!
//! - POST /api/v1/auth/register - Register an organization with its admin
//! - POST /api/v1/auth/login - Login, returns a bearer token
//! - POST /api/v1/auth/logout - Invalidate the current session
//! - GET  /api/v1/auth/me - Current user info
//! - PUT  /api/v1/auth/password - Change password

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::User;
use crate::services::user::{CreateUserInput, LoginInput, RegisterInput};

/// Request body for organization registration
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub organization: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Request body for login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username_or_email: String,
    pub password: String,
}

/// Request body for changing the password
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// User info embedded in responses (never includes the password hash)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub org_id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub status: String,
    pub capabilities: Vec<String>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            org_id: user.org_id,
            username: user.username.clone(),
            email: user.email.clone(),
            role: user.role.to_string(),
            status: user.status.to_string(),
            capabilities: user
                .role
                .capabilities()
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}

/// Response for registration
#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub organization_id: i64,
    pub organization_slug: String,
    pub user: UserResponse,
}

/// Response for login
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
    pub user: UserResponse,
}

/// Build the public auth router (no authentication required)
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Build the protected auth router
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password", put(change_password))
}

/// POST /api/v1/auth/register
async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), ApiError> {
    let (org, user) = state
        .user_service
        .register_organization(RegisterInput {
            org_name: body.organization,
            username: body.username,
            email: body.email,
            password: body.password,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            organization_id: org.id,
            organization_slug: org.slug,
            user: user.into(),
        }),
    ))
}

/// POST /api/v1/auth/login
///
/// Rate limited per username (and per forwarded client IP when present).
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    if let Some(ip) = client_ip(&headers) {
        if state.rate_limiter.is_ip_limited(ip).await {
            return Err(ApiError::rate_limited("Too many requests, slow down"));
        }
        state.rate_limiter.record_ip_request(ip).await;
    }

    if state
        .rate_limiter
        .is_username_limited(&body.username_or_email)
        .await
    {
        return Err(ApiError::rate_limited(
            "Too many failed login attempts, try again later",
        ));
    }

    let outcome = match state
        .user_service
        .login(LoginInput {
            username_or_email: body.username_or_email.clone(),
            password: body.password,
        })
        .await
    {
        Ok(outcome) => {
            state
                .rate_limiter
                .clear_username_attempts(&body.username_or_email)
                .await;
            outcome
        }
        Err(err) => {
            state
                .rate_limiter
                .record_failed_attempt(&body.username_or_email)
                .await;
            return Err(err.into());
        }
    };

    Ok(Json(LoginResponse {
        token: outcome.token,
        expires_at: outcome.session.expires_at.to_rfc3339(),
        user: outcome.user.into(),
    }))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
    _user: AuthenticatedUser,
) -> Result<StatusCode, ApiError> {
    if let Some(token) = bearer_token(&headers) {
        state
            .user_service
            .logout(&token)
            .await
            .map_err(ApiError::internal_error)?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/auth/me
async fn me(user: AuthenticatedUser) -> Json<UserResponse> {
    Json(user.0.into())
}

/// PUT /api/v1/auth/password
async fn change_password(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .user_service
        .change_password(user.0.id, &body.current_password, &body.new_password)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Admin: create another user inside the caller's organization. Mounted in
/// the admin router but implemented here next to the other account flows.
pub async fn create_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let role = body
        .role
        .parse()
        .map_err(|_| ApiError::validation_error(format!("Invalid role: {}", body.role)))?;

    let created = state
        .user_service
        .create_user(
            user.org_id(),
            CreateUserInput {
                username: body.username,
                email: body.email,
                password: body.password,
                role,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Request body for admin user creation
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: String,
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.to_string())
}

/// Best-effort client IP from X-Forwarded-For (first hop)
fn client_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_ip_parses_first_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            "203.0.113.7, 10.0.0.1".parse().unwrap(),
        );
        assert_eq!(client_ip(&headers), "203.0.113.7".parse().ok());
    }

    #[test]
    fn test_client_ip_missing_header() {
        assert!(client_ip(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_user_response_includes_capabilities() {
        let user = User::new(
            1,
            "alice".into(),
            "alice@example.com".into(),
            "hash".into(),
            crate::models::UserRole::Accountant,
        );
        let response: UserResponse = user.into();
        assert!(response
            .capabilities
            .contains(&"finance_post".to_string()));
        assert!(!response
            .capabilities
            .contains(&"projects_manage".to_string()));
    }
}
