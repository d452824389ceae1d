//! Journal API endpoints
//!
//! - POST /api/v1/journal/entries - Post a journal entry
//! - GET  /api/v1/journal/entries - List entries (paginated, period filter)
//! - GET  /api/v1/journal/entries/{id} - Get an entry with its lines
//! - GET  /api/v1/journal/trial-balance?period_id=... - Trial balance
//!
//! Posting enforces the accounting identity (debits equal credits within
//! tolerance) and the locked-period rule before anything is written; the
//! write itself is atomic and retried on transient database conflicts.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_page, default_per_page};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::db::repositories::journal::TrialBalanceRow;
use crate::models::{
    Capability, EntryWithLines, JournalEntry, JournalEntryInput, ListParams, PagedResult,
};

/// Query parameters for listing entries
#[derive(Debug, Deserialize)]
pub struct ListEntriesQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Restrict to one accounting period
    pub period_id: Option<i64>,
}

/// Query parameters for the trial balance
#[derive(Debug, Deserialize)]
pub struct TrialBalanceQuery {
    pub period_id: i64,
}

/// Trial balance response with overall totals
#[derive(Debug, Serialize)]
pub struct TrialBalanceResponse {
    pub period_id: i64,
    pub rows: Vec<TrialBalanceRow>,
    pub total_debit: f64,
    pub total_credit: f64,
}

/// Build the journal router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/entries", post(post_entry))
        .route("/entries", get(list_entries))
        .route("/entries/{id}", get(get_entry))
        .route("/trial-balance", get(trial_balance))
}

/// POST /api/v1/journal/entries
async fn post_entry(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<JournalEntryInput>,
) -> Result<(StatusCode, Json<EntryWithLines>), ApiError> {
    user.require(Capability::FinancePost)?;

    let posted = state
        .ledger_service
        .post_entry(user.org_id(), user.0.id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(posted)))
}

/// GET /api/v1/journal/entries
async fn list_entries(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListEntriesQuery>,
) -> Result<Json<PagedResult<JournalEntry>>, ApiError> {
    user.require(Capability::FinanceView)?;

    let params = ListParams::new(query.page, query.per_page);
    let result = state
        .ledger_service
        .list_entries(user.org_id(), &params, query.period_id)
        .await?;
    Ok(Json(result))
}

/// GET /api/v1/journal/entries/{id}
async fn get_entry(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<EntryWithLines>, ApiError> {
    user.require(Capability::FinanceView)?;

    let entry = state.ledger_service.get_entry(user.org_id(), id).await?;
    Ok(Json(entry))
}

/// GET /api/v1/journal/trial-balance?period_id=...
async fn trial_balance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<TrialBalanceQuery>,
) -> Result<Json<TrialBalanceResponse>, ApiError> {
    user.require(Capability::FinanceView)?;

    let rows = state
        .ledger_service
        .trial_balance(user.org_id(), query.period_id)
        .await?;

    let total_debit = rows.iter().map(|r| r.total_debit).sum();
    let total_credit = rows.iter().map(|r| r.total_credit).sum();

    Ok(Json(TrialBalanceResponse {
        period_id: query.period_id,
        rows,
        total_debit,
        total_credit,
    }))
}
