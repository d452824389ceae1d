//! Budget API endpoints
//!
//! - GET    /api/v1/budgets - List budgets (optional period filter)
//! - POST   /api/v1/budgets - Create a budget with lines
//! - GET    /api/v1/budgets/{id} - Get a budget with lines
//! - PUT    /api/v1/budgets/{id} - Rename and replace lines
//! - DELETE /api/v1/budgets/{id} - Delete a budget
//! - GET    /api/v1/budgets/{id}/variance - Variance/forecast report

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::db::repositories::budget::BudgetWithLines;
use crate::models::{Budget, BudgetLineInput, Capability, CreateBudgetInput};
use crate::services::budget::VarianceReport;

/// Query parameters for listing budgets
#[derive(Debug, Deserialize)]
pub struct ListBudgetsQuery {
    pub period_id: Option<i64>,
}

/// Request body for updating a budget
#[derive(Debug, Deserialize)]
pub struct UpdateBudgetRequest {
    pub name: String,
    pub lines: Vec<BudgetLineInput>,
}

/// Query parameters for the variance report
#[derive(Debug, Deserialize)]
pub struct VarianceQuery {
    /// Reference date for the forecast; defaults to today
    pub as_of: Option<NaiveDate>,
}

/// Build the budgets router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_budgets))
        .route("/", post(create_budget))
        .route("/{id}", get(get_budget))
        .route("/{id}", put(update_budget))
        .route("/{id}", delete(delete_budget))
        .route("/{id}/variance", get(variance_report))
}

/// GET /api/v1/budgets
async fn list_budgets(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListBudgetsQuery>,
) -> Result<Json<Vec<Budget>>, ApiError> {
    user.require(Capability::BudgetsView)?;

    let budgets = state
        .budget_service
        .list(user.org_id(), query.period_id)
        .await?;
    Ok(Json(budgets))
}

/// POST /api/v1/budgets
async fn create_budget(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<CreateBudgetInput>,
) -> Result<(StatusCode, Json<BudgetWithLines>), ApiError> {
    user.require(Capability::BudgetsManage)?;

    let budget = state.budget_service.create(user.org_id(), input).await?;
    Ok((StatusCode::CREATED, Json(budget)))
}

/// GET /api/v1/budgets/{id}
async fn get_budget(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<BudgetWithLines>, ApiError> {
    user.require(Capability::BudgetsView)?;

    let budget = state.budget_service.get(user.org_id(), id).await?;
    Ok(Json(budget))
}

/// PUT /api/v1/budgets/{id}
async fn update_budget(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(body): Json<UpdateBudgetRequest>,
) -> Result<Json<BudgetWithLines>, ApiError> {
    user.require(Capability::BudgetsManage)?;

    let budget = state
        .budget_service
        .update(user.org_id(), id, &body.name, body.lines)
        .await?;
    Ok(Json(budget))
}

/// DELETE /api/v1/budgets/{id}
async fn delete_budget(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require(Capability::BudgetsManage)?;

    state.budget_service.delete(user.org_id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/budgets/{id}/variance
async fn variance_report(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Query(query): Query<VarianceQuery>,
) -> Result<Json<VarianceReport>, ApiError> {
    user.require(Capability::BudgetsView)?;

    let report = state
        .budget_service
        .variance_report(user.org_id(), id, query.as_of)
        .await?;
    Ok(Json(report))
}
