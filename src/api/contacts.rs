//! Contact API endpoints
//!
//! - GET    /api/v1/contacts - List contacts with pagination and filters
//! - POST   /api/v1/contacts - Create a contact
//! - GET    /api/v1/contacts/{id} - Get a contact
//! - PUT    /api/v1/contacts/{id} - Update a contact
//! - POST   /api/v1/contacts/{id}/archive - Archive a contact
//! - DELETE /api/v1/contacts/{id} - Delete a contact

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::str::FromStr;

use crate::api::common::{default_page, default_per_page};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::db::repositories::ContactFilter;
use crate::models::{
    Capability, Contact, ContactKind, CreateContactInput, ListParams, PagedResult,
    UpdateContactInput,
};

/// Query parameters for listing contacts
#[derive(Debug, Deserialize)]
pub struct ListContactsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    /// Filter by kind (customer, vendor, lead)
    pub kind: Option<String>,
    /// Substring search on name/company/email
    pub search: Option<String>,
    /// Include archived contacts
    #[serde(default)]
    pub include_archived: bool,
}

/// Build the contacts router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_contacts))
        .route("/", post(create_contact))
        .route("/{id}", get(get_contact))
        .route("/{id}", put(update_contact))
        .route("/{id}", delete(delete_contact))
        .route("/{id}/archive", post(archive_contact))
}

/// GET /api/v1/contacts
async fn list_contacts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListContactsQuery>,
) -> Result<Json<PagedResult<Contact>>, ApiError> {
    user.require(Capability::ContactsView)?;

    let kind = match query.kind.as_deref() {
        Some(raw) => Some(
            ContactKind::from_str(raw)
                .map_err(|_| ApiError::validation_error(format!("Invalid kind: {}", raw)))?,
        ),
        None => None,
    };

    let filter = ContactFilter {
        kind,
        search: query.search,
        include_archived: query.include_archived,
    };
    let params = ListParams::new(query.page, query.per_page);

    let result = state
        .contact_service
        .list(user.org_id(), &params, &filter)
        .await?;
    Ok(Json(result))
}

/// POST /api/v1/contacts
async fn create_contact(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(input): Json<CreateContactInput>,
) -> Result<(StatusCode, Json<Contact>), ApiError> {
    user.require(Capability::ContactsManage)?;

    let contact = state.contact_service.create(user.org_id(), input).await?;
    Ok((StatusCode::CREATED, Json(contact)))
}

/// GET /api/v1/contacts/{id}
async fn get_contact(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Contact>, ApiError> {
    user.require(Capability::ContactsView)?;

    let contact = state.contact_service.get(user.org_id(), id).await?;
    Ok(Json(contact))
}

/// PUT /api/v1/contacts/{id}
async fn update_contact(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
    Json(input): Json<UpdateContactInput>,
) -> Result<Json<Contact>, ApiError> {
    user.require(Capability::ContactsManage)?;

    let contact = state
        .contact_service
        .update(user.org_id(), id, input)
        .await?;
    Ok(Json(contact))
}

/// POST /api/v1/contacts/{id}/archive
async fn archive_contact(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<Contact>, ApiError> {
    user.require(Capability::ContactsManage)?;

    let contact = state.contact_service.archive(user.org_id(), id).await?;
    Ok(Json(contact))
}

/// DELETE /api/v1/contacts/{id}
async fn delete_contact(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    user.require(Capability::ContactsManage)?;

    state.contact_service.delete(user.org_id(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
