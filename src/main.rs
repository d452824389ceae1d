//! Atrium - A lightweight modern ERP system

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atrium::{
    api::{self, middleware::RequestStats, AppState},
    cache::create_cache,
    config::Config,
    db::{
        self,
        repositories::{
            SqlxAccountRepository, SqlxBudgetRepository, SqlxContactRepository,
            SqlxFileShareRepository, SqlxJournalRepository, SqlxOrganizationRepository,
            SqlxPeriodRepository, SqlxProjectRepository, SqlxSessionRepository,
            SqlxTaskRepository, SqlxUserRepository,
        },
    },
    services::{
        BudgetService, ContactService, LedgerService, LoginRateLimiter, ProjectService,
        TaskService, UserService,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atrium=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Atrium ERP...");

    // Load configuration
    let config = Config::load_with_env(Path::new("config.yml"))?;
    tracing::info!("Configuration loaded");

    // Initialize database
    let pool = db::create_pool(&config.database).await?;
    tracing::info!("Database connected: {:?}", config.database.driver);

    // Run migrations
    db::migrations::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    // Initialize cache
    let cache = create_cache(&config.cache).await?;
    tracing::info!("Cache initialized");

    // Create repositories
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
    let file_repo = SqlxFileShareRepository::boxed(pool.clone());

    // Initialize services
    let user_service = Arc::new(UserService::with_session_days(
        user_repo.clone(),
        session_repo,
        org_repo,
        config.auth.session_days,
    ));
    let contact_service = Arc::new(ContactService::new(contact_repo.clone()));
    let project_service = Arc::new(ProjectService::new(project_repo.clone(), contact_repo));
    let task_service = Arc::new(TaskService::new(task_repo, project_repo, user_repo));
    let ledger_service = Arc::new(LedgerService::new(
        account_repo.clone(),
        period_repo.clone(),
        journal_repo.clone(),
        cache.clone(),
    ));
    let budget_service = Arc::new(BudgetService::new(
        budget_repo,
        period_repo,
        account_repo,
        journal_repo,
        cache.clone(),
    ));

    // Demo mode: create a demo organization with an admin user if missing
    #[cfg(feature = "demo")]
    {
        use atrium::services::user::RegisterInput;

        let demo = user_service
            .register_organization(RegisterInput {
                org_name: "Demo Organization".into(),
                username: "demo".into(),
                email: "demo@atrium.local".into(),
                password: "demo-password".into(),
            })
            .await;
        match demo {
            Ok(_) => tracing::info!("Demo mode: created demo organization (demo/demo-password)"),
            Err(_) => tracing::debug!("Demo mode: demo organization already present"),
        }
    }

    // Build application state
    let request_stats = Arc::new(RequestStats::new());
    let rate_limiter = Arc::new(LoginRateLimiter::new());

    let state = AppState {
        pool: pool.clone(),
        database_url: config.database.url.clone(),
        user_service: user_service.clone(),
        contact_service,
        project_service,
        task_service,
        ledger_service,
        budget_service,
        file_repo,
        upload_config: Arc::new(config.upload.clone()),
        request_stats,
        rate_limiter: rate_limiter.clone(),
    };

    // Rate limiter cleanup task (runs every 5 minutes)
    {
        let limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(300));
            loop {
                interval.tick().await;
                limiter.cleanup().await;
            }
        });
    }

    // Expired session sweep (hourly)
    {
        let user_service = user_service.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(3600));
            loop {
                interval.tick().await;
                match user_service.sweep_sessions().await {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Removed {} expired sessions", n),
                    Err(err) => tracing::warn!("Session sweep failed: {}", err),
                }
            }
        });
    }

    // Build router
    let app = api::build_router(state, &config.server.cors_origin);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
