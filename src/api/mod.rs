//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api/v1`. Everything except registration,
//! login, and the health check requires a bearer token; admin endpoints
//! additionally require the admin role. Capability checks happen inside
//! the handlers against the caller's role.

pub mod accounts;
pub mod admin;
pub mod auth;
pub mod budgets;
pub mod common;
pub mod contacts;
pub mod files;
pub mod journal;
pub mod middleware;
pub mod projects;
pub mod tasks;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, AuthenticatedUser, RequestStats};

/// Build the main API router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need the admin role)
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (need auth; capabilities are checked per handler)
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .nest("/contacts", contacts::router())
        .nest("/projects", projects::router())
        .nest("/tasks", tasks::router())
        .nest("/accounts", accounts::router())
        .nest("/periods", accounts::periods_router())
        .nest("/journal", journal::router())
        .nest("/budgets", budgets::router())
        .nest("/files", files::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes
    Router::new()
        .nest("/auth", auth::public_router())
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(
            cors_origin
                .parse::<HeaderValue>()
                .unwrap_or_else(|_| HeaderValue::from_static("http://localhost:3000")),
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true);

    let router = Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http());

    // Demo mode guard (blocks write operations when compiled with --features demo)
    #[cfg(feature = "demo")]
    let router = router.layer(axum_middleware::from_fn(middleware::demo_guard));

    router
        // Request stats middleware (outermost layer, runs for all requests)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}

/// GET /health - liveness probe with a database ping
async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let database = match state.pool.ping().await {
        Ok(()) => "ok",
        Err(_) => "unreachable",
    };

    Json(json!({
        "status": if database == "ok" { "ok" } else { "degraded" },
        "database": database,
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{create_cache, Cache};
    use crate::config::CacheConfig;
    use crate::db::repositories::{
        SqlxAccountRepository, SqlxBudgetRepository, SqlxContactRepository,
        SqlxFileShareRepository, SqlxJournalRepository, SqlxOrganizationRepository,
        SqlxPeriodRepository, SqlxProjectRepository, SqlxSessionRepository, SqlxTaskRepository,
        SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::services::{
        BudgetService, ContactService, LedgerService, LoginRateLimiter, ProjectService,
        TaskService, UserService,
    };
    use axum_test::TestServer;
    use std::sync::Arc;

    async fn test_state() -> AppState {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let cache: Arc<Cache> = create_cache(&CacheConfig::default()).await.unwrap();

        let org_repo = SqlxOrganizationRepository::boxed(pool.clone());
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let contact_repo = SqlxContactRepository::boxed(pool.clone());
        let project_repo = SqlxProjectRepository::boxed(pool.clone());
        let task_repo = SqlxTaskRepository::boxed(pool.clone());
        let account_repo = SqlxAccountRepository::boxed(pool.clone());
        let period_repo = SqlxPeriodRepository::boxed(pool.clone());
        let journal_repo = SqlxJournalRepository::boxed(pool.clone());
        let budget_repo = SqlxBudgetRepository::boxed(pool.clone());

        AppState {
            pool: pool.clone(),
            database_url: ":memory:".into(),
            user_service: Arc::new(UserService::new(
                user_repo.clone(),
                session_repo,
                org_repo,
            )),
            contact_service: Arc::new(ContactService::new(contact_repo.clone())),
            project_service: Arc::new(ProjectService::new(project_repo.clone(), contact_repo)),
            task_service: Arc::new(TaskService::new(task_repo, project_repo, user_repo)),
            ledger_service: Arc::new(LedgerService::new(
                account_repo.clone(),
                period_repo.clone(),
                journal_repo.clone(),
                cache.clone(),
            )),
            budget_service: Arc::new(BudgetService::new(
                budget_repo,
                period_repo,
                account_repo,
                journal_repo,
                cache,
            )),
            file_repo: SqlxFileShareRepository::boxed(pool),
            upload_config: Arc::new(crate::config::UploadConfig::default()),
            request_stats: Arc::new(RequestStats::new()),
            rate_limiter: Arc::new(LoginRateLimiter::new()),
        }
    }

    async fn test_server() -> TestServer {
        let state = test_state().await;
        let app = build_router(state, "http://localhost:3000");
        TestServer::new(app).expect("Failed to build test server")
    }

    /// Register an org and return the admin's bearer token
    async fn register_and_login(server: &TestServer) -> String {
        let response = server
            .post("/api/v1/auth/register")
            .json(&json!({
                "organization": "Acme Corp",
                "username": "alice",
                "email": "alice@acme.test",
                "password": "correct horse",
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({
                "username_or_email": "alice",
                "password": "correct horse",
            }))
            .await;
        response.assert_status_ok();
        response.json::<Value>()["token"].as_str().unwrap().to_string()
    }

    /// Seed two accounts and an open March period, returning the period id
    async fn seed_finance(server: &TestServer, token: &str) -> i64 {
        for (code, name, account_type) in
            [("1000", "Cash", "asset"), ("4000", "Revenue", "income")]
        {
            server
                .post("/api/v1/accounts")
                .authorization_bearer(token)
                .json(&json!({"code": code, "name": name, "account_type": account_type}))
                .await
                .assert_status(axum::http::StatusCode::CREATED);
        }

        let response = server
            .post("/api/v1/periods")
            .authorization_bearer(token)
            .json(&json!({
                "name": "2026-03",
                "start_date": "2026-03-01",
                "end_date": "2026-03-31",
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        response.json::<Value>()["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let server = test_server().await;
        let response = server.get("/health").await;
        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "ok");
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let server = test_server().await;
        let response = server.get("/api/v1/contacts").await;
        response.assert_status(axum::http::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_login_and_me() {
        let server = test_server().await;
        let token = register_and_login(&server).await;

        let response = server
            .get("/api/v1/auth/me")
            .authorization_bearer(&token)
            .await;
        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["username"], "alice");
        assert_eq!(body["role"], "admin");
    }

    #[tokio::test]
    async fn test_journal_posting_flow() {
        let server = test_server().await;
        let token = register_and_login(&server).await;
        seed_finance(&server, &token).await;

        // Balanced entry: accepted
        let response = server
            .post("/api/v1/journal/entries")
            .authorization_bearer(&token)
            .json(&json!({
                "entry_date": "2026-03-10",
                "memo": "Invoice 42",
                "lines": [
                    {"account_id": 1, "debit": 100.0, "credit": 0.0},
                    {"account_id": 2, "debit": 0.0, "credit": 100.0},
                ],
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let posted = response.json::<Value>();
        assert_eq!(posted["lines"].as_array().unwrap().len(), 2);

        // Unbalanced entry: rejected with a "not balanced" message
        let response = server
            .post("/api/v1/journal/entries")
            .authorization_bearer(&token)
            .json(&json!({
                "entry_date": "2026-03-11",
                "lines": [
                    {"account_id": 1, "debit": 100.0, "credit": 0.0},
                    {"account_id": 2, "debit": 0.0, "credit": 99.0},
                ],
            }))
            .await;
        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
        let body = response.json::<Value>();
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("not balanced"));
    }

    #[tokio::test]
    async fn test_locked_period_rejects_balanced_entry() {
        let server = test_server().await;
        let token = register_and_login(&server).await;
        let period_id = seed_finance(&server, &token).await;

        server
            .put(&format!("/api/v1/periods/{}/lock", period_id))
            .authorization_bearer(&token)
            .await
            .assert_status_ok();

        let response = server
            .post("/api/v1/journal/entries")
            .authorization_bearer(&token)
            .json(&json!({
                "entry_date": "2026-03-10",
                "lines": [
                    {"account_id": 1, "debit": 50.0, "credit": 0.0},
                    {"account_id": 2, "debit": 0.0, "credit": 50.0},
                ],
            }))
            .await;
        response.assert_status(axum::http::StatusCode::BAD_REQUEST);
        let body = response.json::<Value>();
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("period is locked"));
    }

    #[tokio::test]
    async fn test_member_cannot_post_journal_entries() {
        let server = test_server().await;
        let token = register_and_login(&server).await;
        seed_finance(&server, &token).await;

        // Admin creates a member user
        server
            .post("/api/v1/admin/users")
            .authorization_bearer(&token)
            .json(&json!({
                "username": "bob",
                "email": "bob@acme.test",
                "password": "some password",
                "role": "member",
            }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let response = server
            .post("/api/v1/auth/login")
            .json(&json!({"username_or_email": "bob", "password": "some password"}))
            .await;
        response.assert_status_ok();
        let member_token = response.json::<Value>()["token"]
            .as_str()
            .unwrap()
            .to_string();

        let response = server
            .post("/api/v1/journal/entries")
            .authorization_bearer(&member_token)
            .json(&json!({
                "entry_date": "2026-03-10",
                "lines": [
                    {"account_id": 1, "debit": 10.0, "credit": 0.0},
                    {"account_id": 2, "debit": 0.0, "credit": 10.0},
                ],
            }))
            .await;
        response.assert_status(axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_contact_crud_flow() {
        let server = test_server().await;
        let token = register_and_login(&server).await;

        let response = server
            .post("/api/v1/contacts")
            .authorization_bearer(&token)
            .json(&json!({"name": "Globex", "kind": "customer"}))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);
        let contact_id = response.json::<Value>()["id"].as_i64().unwrap();

        let response = server
            .get("/api/v1/contacts")
            .authorization_bearer(&token)
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Value>()["total"], 1);

        server
            .delete(&format!("/api/v1/contacts/{}", contact_id))
            .authorization_bearer(&token)
            .await
            .assert_status(axum::http::StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn test_trial_balance_endpoint() {
        let server = test_server().await;
        let token = register_and_login(&server).await;
        let period_id = seed_finance(&server, &token).await;

        server
            .post("/api/v1/journal/entries")
            .authorization_bearer(&token)
            .json(&json!({
                "entry_date": "2026-03-10",
                "lines": [
                    {"account_id": 1, "debit": 250.0, "credit": 0.0},
                    {"account_id": 2, "debit": 0.0, "credit": 250.0},
                ],
            }))
            .await
            .assert_status(axum::http::StatusCode::CREATED);

        let response = server
            .get(&format!("/api/v1/journal/trial-balance?period_id={}", period_id))
            .authorization_bearer(&token)
            .await;
        response.assert_status_ok();

        let body = response.json::<Value>();
        assert_eq!(body["total_debit"], 250.0);
        assert_eq!(body["total_credit"], 250.0);
    }
}
