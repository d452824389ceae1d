//! User service
//!
//! Implements business logic for accounts and authentication:
//! - Organization registration (creates the org plus its first admin user)
//! - Admin-driven user creation inside an organization
//! - Login/logout with opaque bearer tokens
//! - Session validation (tokens are stored as SHA-256 digests)
//! - Password changes

use crate::db::repositories::{OrganizationRepository, SessionRepository, UserRepository};
use crate::models::{Organization, Session, User, UserRole, UserStatus};
use crate::services::password::{hash_password, verify_password};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Default session expiration time in days
const DEFAULT_SESSION_DAYS: i64 = 7;

/// Minimum accepted password length
const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_.-]{3,50}$").expect("valid username regex"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// Authentication failed (invalid credentials)
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    /// Validation error (invalid input)
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// User or organization already exists
    #[error("{0}")]
    AlreadyExists(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Input for registering a new organization with its first user
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub org_name: String,
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Input for creating an additional user within an organization
#[derive(Debug, Clone)]
pub struct CreateUserInput {
    pub username: String,
    pub email: String,
    pub password: String,
    pub role: UserRole,
}

/// Input for logging in
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub username_or_email: String,
    pub password: String,
}

/// Result of a successful login. `token` is the raw bearer token and is
/// only available here; storage keeps the digest.
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    pub session: Session,
    pub token: String,
}

/// User service for managing users and authentication
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    org_repo: Arc<dyn OrganizationRepository>,
    session_days: i64,
}

impl UserService {
    /// Create a new user service with the given repositories
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        org_repo: Arc<dyn OrganizationRepository>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            org_repo,
            session_days: DEFAULT_SESSION_DAYS,
        }
    }

    /// Create a new user service with custom session expiration
    pub fn with_session_days(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        org_repo: Arc<dyn OrganizationRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            org_repo,
            session_days,
        }
    }

    /// Register a new organization together with its first user.
    ///
    /// The first user always becomes the organization's admin.
    pub async fn register_organization(
        &self,
        input: RegisterInput,
    ) -> Result<(Organization, User), UserServiceError> {
        if input.org_name.trim().is_empty() {
            return Err(UserServiceError::ValidationError(
                "Organization name must not be empty".into(),
            ));
        }
        self.validate_credentials(&input.username, &input.email, &input.password)?;

        let slug = slugify(&input.org_name);
        if slug.is_empty() {
            return Err(UserServiceError::ValidationError(
                "Organization name must contain letters or digits".into(),
            ));
        }

        if self
            .org_repo
            .exists_by_slug(&slug)
            .await
            .context("Failed to check organization slug")?
        {
            return Err(UserServiceError::AlreadyExists(format!(
                "Organization '{}' is already registered",
                slug
            )));
        }
        self.ensure_user_free(&input.username, &input.email).await?;

        let org = self
            .org_repo
            .create(&Organization::new(
                input.org_name.trim().to_string(),
                slug,
                "USD".to_string(),
            ))
            .await
            .context("Failed to create organization")?;

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = self
            .user_repo
            .create(&User::new(
                org.id,
                input.username,
                input.email,
                password_hash,
                UserRole::Admin,
            ))
            .await
            .context("Failed to create user")?;

        Ok((org, user))
    }

    /// Create an additional user in an organization (admin operation)
    pub async fn create_user(
        &self,
        org_id: i64,
        input: CreateUserInput,
    ) -> Result<User, UserServiceError> {
        self.validate_credentials(&input.username, &input.email, &input.password)?;
        self.ensure_user_free(&input.username, &input.email).await?;

        let password_hash = hash_password(&input.password).context("Failed to hash password")?;
        let user = self
            .user_repo
            .create(&User::new(
                org_id,
                input.username,
                input.email,
                password_hash,
                input.role,
            ))
            .await
            .context("Failed to create user")?;

        Ok(user)
    }

    /// Login with credentials, creating a new session on success.
    pub async fn login(&self, input: LoginInput) -> Result<LoginOutcome, UserServiceError> {
        let user = self
            .find_by_username_or_email(&input.username_or_email)
            .await
            .context("Failed to look up user")?
            .ok_or_else(|| {
                UserServiceError::AuthenticationError("Invalid credentials".to_string())
            })?;

        if user.is_suspended() {
            return Err(UserServiceError::AuthenticationError(
                "Account is suspended".to_string(),
            ));
        }

        let valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(UserServiceError::AuthenticationError(
                "Invalid credentials".to_string(),
            ));
        }

        let token = generate_token();
        let session = Session {
            id: token_digest(&token),
            user_id: user.id,
            expires_at: Utc::now() + Duration::days(self.session_days),
            created_at: Utc::now(),
        };

        self.session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;

        Ok(LoginOutcome {
            user,
            session,
            token,
        })
    }

    /// Validate a bearer token, returning its user when the session is live.
    ///
    /// Expired sessions are removed on sight; suspended users are treated as
    /// unauthenticated.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>> {
        let digest = token_digest(token);

        let Some(session) = self
            .session_repo
            .get(&digest)
            .await
            .context("Failed to look up session")?
        else {
            return Ok(None);
        };

        if session.is_expired() {
            self.session_repo.delete(&digest).await.ok();
            return Ok(None);
        }

        let Some(user) = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to load session user")?
        else {
            return Ok(None);
        };

        if user.is_suspended() {
            return Ok(None);
        }

        Ok(Some(user))
    }

    /// Logout: delete the session behind a bearer token
    pub async fn logout(&self, token: &str) -> Result<()> {
        self.session_repo
            .delete(&token_digest(token))
            .await
            .context("Failed to delete session")
    }

    /// Change a user's password after verifying the current one.
    ///
    /// All other sessions of the user are revoked.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<(), UserServiceError> {
        if new_password.len() < MIN_PASSWORD_LEN {
            return Err(UserServiceError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to load user")?
            .ok_or_else(|| UserServiceError::ValidationError("User not found".to_string()))?;

        let valid = verify_password(current_password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            return Err(UserServiceError::AuthenticationError(
                "Current password is incorrect".to_string(),
            ));
        }

        let password_hash = hash_password(new_password).context("Failed to hash password")?;
        self.user_repo
            .update_password(user_id, &password_hash)
            .await
            .context("Failed to store new password")?;

        self.session_repo
            .delete_for_user(user_id)
            .await
            .context("Failed to revoke sessions")?;

        Ok(())
    }

    /// List all users of an organization
    pub async fn list_users(&self, org_id: i64) -> Result<Vec<User>> {
        self.user_repo.list_by_org(org_id).await
    }

    /// Change a user's role (admin operation, scoped to the caller's org)
    pub async fn set_role(
        &self,
        org_id: i64,
        user_id: i64,
        role: UserRole,
    ) -> Result<User, UserServiceError> {
        let mut user = self.get_org_user(org_id, user_id).await?;
        user.role = role;
        Ok(self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user role")?)
    }

    /// Suspend or reactivate a user (admin operation). Suspension revokes
    /// all of the user's sessions.
    pub async fn set_status(
        &self,
        org_id: i64,
        user_id: i64,
        status: UserStatus,
    ) -> Result<User, UserServiceError> {
        let mut user = self.get_org_user(org_id, user_id).await?;
        user.status = status;
        let user = self
            .user_repo
            .update(&user)
            .await
            .context("Failed to update user status")?;

        if status == UserStatus::Suspended {
            self.session_repo
                .delete_for_user(user_id)
                .await
                .context("Failed to revoke sessions")?;
        }

        Ok(user)
    }

    /// Delete all expired sessions
    pub async fn sweep_sessions(&self) -> Result<u64> {
        self.session_repo.delete_expired().await
    }

    async fn get_org_user(&self, org_id: i64, user_id: i64) -> Result<User, UserServiceError> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await
            .context("Failed to load user")?
            .filter(|u| u.org_id == org_id)
            .ok_or_else(|| UserServiceError::ValidationError("User not found".to_string()))?;
        Ok(user)
    }

    async fn find_by_username_or_email(&self, needle: &str) -> Result<Option<User>> {
        if needle.contains('@') {
            self.user_repo.get_by_email(needle).await
        } else {
            self.user_repo.get_by_username(needle).await
        }
    }

    async fn ensure_user_free(
        &self,
        username: &str,
        email: &str,
    ) -> Result<(), UserServiceError> {
        if self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::AlreadyExists(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        if self
            .user_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::AlreadyExists(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        Ok(())
    }

    fn validate_credentials(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), UserServiceError> {
        if !USERNAME_RE.is_match(username) {
            return Err(UserServiceError::ValidationError(
                "Username must be 3-50 characters of letters, digits, '_', '.', or '-'".into(),
            ));
        }
        if !EMAIL_RE.is_match(email) {
            return Err(UserServiceError::ValidationError(
                "Email address is invalid".into(),
            ));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(UserServiceError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        Ok(())
    }
}

/// Generate an opaque bearer token (64 hex characters)
fn generate_token() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// SHA-256 digest of a token, hex encoded. This is what gets stored.
fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Turn a display name into a URL-friendly slug
fn slugify(name: &str) -> String {
    let mut slug = String::new();
    let mut last_dash = true;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxOrganizationRepository, SqlxSessionRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};

    async fn setup_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            SqlxOrganizationRepository::boxed(pool),
        )
    }

    fn register_input() -> RegisterInput {
        RegisterInput {
            org_name: "Acme Corp".into(),
            username: "alice".into(),
            email: "alice@acme.test".into(),
            password: "correct horse".into(),
        }
    }

    #[tokio::test]
    async fn test_register_creates_org_and_admin() {
        let service = setup_service().await;
        let (org, user) = service.register_organization(register_input()).await.unwrap();

        assert_eq!(org.slug, "acme-corp");
        assert_eq!(user.org_id, org.id);
        assert_eq!(user.role, UserRole::Admin);
    }

    #[tokio::test]
    async fn test_register_duplicate_org_rejected() {
        let service = setup_service().await;
        service.register_organization(register_input()).await.unwrap();

        let mut again = register_input();
        again.username = "bob".into();
        again.email = "bob@acme.test".into();
        let result = service.register_organization(again).await;
        assert!(matches!(result, Err(UserServiceError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let service = setup_service().await;
        let mut input = register_input();
        input.password = "short".into();
        let result = service.register_organization(input).await;
        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_register_rejects_bad_email() {
        let service = setup_service().await;
        let mut input = register_input();
        input.email = "not-an-email".into();
        let result = service.register_organization(input).await;
        assert!(matches!(result, Err(UserServiceError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let service = setup_service().await;
        service.register_organization(register_input()).await.unwrap();

        let outcome = service
            .login(LoginInput {
                username_or_email: "alice".into(),
                password: "correct horse".into(),
            })
            .await
            .unwrap();

        // The raw token is never the stored session id
        assert_ne!(outcome.token, outcome.session.id);

        let user = service
            .validate_session(&outcome.token)
            .await
            .unwrap()
            .expect("Session should be valid");
        assert_eq!(user.username, "alice");
    }

    #[tokio::test]
    async fn test_login_by_email() {
        let service = setup_service().await;
        service.register_organization(register_input()).await.unwrap();

        let outcome = service
            .login(LoginInput {
                username_or_email: "alice@acme.test".into(),
                password: "correct horse".into(),
            })
            .await;
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn test_login_wrong_password_rejected() {
        let service = setup_service().await;
        service.register_organization(register_input()).await.unwrap();

        let result = service
            .login(LoginInput {
                username_or_email: "alice".into(),
                password: "wrong password".into(),
            })
            .await;
        assert!(matches!(
            result,
            Err(UserServiceError::AuthenticationError(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let service = setup_service().await;
        service.register_organization(register_input()).await.unwrap();

        let outcome = service
            .login(LoginInput {
                username_or_email: "alice".into(),
                password: "correct horse".into(),
            })
            .await
            .unwrap();

        service.logout(&outcome.token).await.unwrap();
        assert!(service
            .validate_session(&outcome.token)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_suspended_user_cannot_login_or_keep_sessions() {
        let service = setup_service().await;
        let (org, user) = service.register_organization(register_input()).await.unwrap();

        let outcome = service
            .login(LoginInput {
                username_or_email: "alice".into(),
                password: "correct horse".into(),
            })
            .await
            .unwrap();

        service
            .set_status(org.id, user.id, UserStatus::Suspended)
            .await
            .unwrap();

        // Existing session is revoked, new logins fail
        assert!(service
            .validate_session(&outcome.token)
            .await
            .unwrap()
            .is_none());
        let result = service
            .login(LoginInput {
                username_or_email: "alice".into(),
                password: "correct horse".into(),
            })
            .await;
        assert!(matches!(
            result,
            Err(UserServiceError::AuthenticationError(_))
        ));
    }

    #[tokio::test]
    async fn test_change_password_revokes_sessions() {
        let service = setup_service().await;
        let (_org, user) = service.register_organization(register_input()).await.unwrap();

        let outcome = service
            .login(LoginInput {
                username_or_email: "alice".into(),
                password: "correct horse".into(),
            })
            .await
            .unwrap();

        service
            .change_password(user.id, "correct horse", "battery staple")
            .await
            .unwrap();

        assert!(service
            .validate_session(&outcome.token)
            .await
            .unwrap()
            .is_none());

        // New password works
        assert!(service
            .login(LoginInput {
                username_or_email: "alice".into(),
                password: "battery staple".into(),
            })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_create_user_respects_role() {
        let service = setup_service().await;
        let (org, _admin) = service.register_organization(register_input()).await.unwrap();

        let user = service
            .create_user(
                org.id,
                CreateUserInput {
                    username: "bob".into(),
                    email: "bob@acme.test".into(),
                    password: "some password".into(),
                    role: UserRole::Accountant,
                },
            )
            .await
            .unwrap();

        assert_eq!(user.role, UserRole::Accountant);
        assert_eq!(service.list_users(org.id).await.unwrap().len(), 2);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Acme Corp"), "acme-corp");
        assert_eq!(slugify("  Hello,  World! "), "hello-world");
        assert_eq!(slugify("---"), "");
    }

    #[test]
    fn test_token_digest_is_stable_hex() {
        let digest = token_digest("token");
        assert_eq!(digest.len(), 64);
        assert_eq!(digest, token_digest("token"));
        assert_ne!(digest, token_digest("other"));
    }
}
