//! Chart of accounts and accounting period API endpoints
//!
//! Accounts:
//! - GET  /api/v1/accounts - List the chart of accounts
//! - POST /api/v1/accounts - Create an account
//! - PUT  /api/v1/accounts/{id} - Rename or (de)activate an account
//! - GET  /api/v1/accounts/{id}/activity - Account activity within a period
//!
//! Periods:
//! - GET  /api/v1/periods - List periods
//! - POST /api/v1/periods - Create a period
//! - PUT  /api/v1/periods/{id}/lock - Lock a period against postings
//! - PUT  /api/v1/periods/{id}/unlock - Unlock a period

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::db::repositories::journal::ActivityRow;
use crate::models::{
    Account, AccountingPeriod, Capability, CreateAccountInput, CreatePeriodInput,
    UpdateAccountInput,
};

/// Build the accounts router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_accounts))
        .route("/", post(create_account))
        .route("/{id}", put(update_account))
        .route("/{id}/activity", get(account_activity))
}

/// Build the periods router
pub fn periods_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_periods))
        .route("/", post(create_period))
        .route("/{id}/lock", put(lock_period))
        .route("/{id}/unlock", put(unlock_period))
}

/// GET /api/v1/accounts
async fn list_accounts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<Account>>, ApiError> {
    user.require(Capability::FinanceView)?;

    let accounts = state.ledger_service.list_accounts(user.org_id()).await?;
    Ok(Json(accounts))
}

/// POST /api/v1/accounts
async fn create_account(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<CreateAccountInput>,
) -> Result<(StatusCode, Json<Account>), ApiError> {
    user.require(Capability::FinanceClose)?;

    let account = state
        .ledger_service
        .create_account(user.org_id(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(account)))
}

/// PUT /api/v1/accounts/{id}
async fn update_account(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateAccountInput>,
) -> Result<Json<Account>, ApiError> {
    user.require(Capability::FinanceClose)?;

    let account = state
        .ledger_service
        .update_account(user.org_id(), id, input)
        .await?;
    Ok(Json(account))
}

/// Query parameters for account activity
#[derive(Debug, Deserialize)]
pub struct ActivityQuery {
    pub period_id: i64,
}

/// GET /api/v1/accounts/{id}/activity?period_id=...
async fn account_activity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Query(query): Query<ActivityQuery>,
) -> Result<Json<Vec<ActivityRow>>, ApiError> {
    user.require(Capability::FinanceView)?;

    let activity = state
        .ledger_service
        .account_activity(user.org_id(), id, query.period_id)
        .await?;
    Ok(Json(activity))
}

/// GET /api/v1/periods
async fn list_periods(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<Vec<AccountingPeriod>>, ApiError> {
    user.require(Capability::FinanceView)?;

    let periods = state.ledger_service.list_periods(user.org_id()).await?;
    Ok(Json(periods))
}

/// POST /api/v1/periods
async fn create_period(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<CreatePeriodInput>,
) -> Result<(StatusCode, Json<AccountingPeriod>), ApiError> {
    user.require(Capability::FinanceClose)?;

    let period = state
        .ledger_service
        .create_period(user.org_id(), input)
        .await?;
    Ok((StatusCode::CREATED, Json(period)))
}

/// PUT /api/v1/periods/{id}/lock
async fn lock_period(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<AccountingPeriod>, ApiError> {
    user.require(Capability::FinanceClose)?;

    let period = state
        .ledger_service
        .set_period_locked(user.org_id(), id, true)
        .await?;
    Ok(Json(period))
}

/// PUT /api/v1/periods/{id}/unlock
async fn unlock_period(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<AccountingPeriod>, ApiError> {
    user.require(Capability::FinanceClose)?;

    let period = state
        .ledger_service
        .set_period_locked(user.org_id(), id, false)
        .await?;
    Ok(Json(period))
}
