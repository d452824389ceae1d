//! Contact service
//!
//! Business logic for contact management: validation, CRUD, archiving.

use crate::db::repositories::{ContactFilter, ContactRepository};
use crate::models::{Contact, CreateContactInput, ListParams, PagedResult, UpdateContactInput};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

/// Error types for contact service operations
#[derive(Debug, thiserror::Error)]
pub enum ContactServiceError {
    /// Contact not found
    #[error("Contact not found: {0}")]
    NotFound(i64),

    /// Validation error
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Contact service
pub struct ContactService {
    repo: Arc<dyn ContactRepository>,
}

impl ContactService {
    pub fn new(repo: Arc<dyn ContactRepository>) -> Self {
        Self { repo }
    }

    /// Create a new contact
    pub async fn create(
        &self,
        org_id: i64,
        input: CreateContactInput,
    ) -> Result<Contact, ContactServiceError> {
        if input.name.trim().is_empty() {
            return Err(ContactServiceError::ValidationError(
                "Contact name must not be empty".into(),
            ));
        }
        if let Some(ref email) = input.email {
            if !EMAIL_RE.is_match(email) {
                return Err(ContactServiceError::ValidationError(
                    "Email address is invalid".into(),
                ));
            }
        }

        let mut contact = Contact::new(org_id, input.name.trim().to_string(), input.kind);
        contact.email = input.email;
        contact.phone = input.phone;
        contact.company = input.company;
        contact.notes = input.notes;

        Ok(self
            .repo
            .create(&contact)
            .await
            .context("Failed to create contact")?)
    }

    /// Get a contact by id
    pub async fn get(&self, org_id: i64, id: i64) -> Result<Contact, ContactServiceError> {
        self.repo
            .get_by_id(org_id, id)
            .await
            .context("Failed to load contact")?
            .ok_or(ContactServiceError::NotFound(id))
    }

    /// List contacts with pagination and filtering
    pub async fn list(
        &self,
        org_id: i64,
        params: &ListParams,
        filter: &ContactFilter,
    ) -> Result<PagedResult<Contact>, ContactServiceError> {
        Ok(self
            .repo
            .list(org_id, params, filter)
            .await
            .context("Failed to list contacts")?)
    }

    /// Update a contact
    pub async fn update(
        &self,
        org_id: i64,
        id: i64,
        input: UpdateContactInput,
    ) -> Result<Contact, ContactServiceError> {
        if !input.has_changes() {
            return self.get(org_id, id).await;
        }

        let mut contact = self.get(org_id, id).await?;

        if let Some(name) = input.name {
            if name.trim().is_empty() {
                return Err(ContactServiceError::ValidationError(
                    "Contact name must not be empty".into(),
                ));
            }
            contact.name = name.trim().to_string();
        }
        if let Some(kind) = input.kind {
            contact.kind = kind;
        }
        if let Some(email) = input.email {
            if !EMAIL_RE.is_match(&email) {
                return Err(ContactServiceError::ValidationError(
                    "Email address is invalid".into(),
                ));
            }
            contact.email = Some(email);
        }
        if let Some(phone) = input.phone {
            contact.phone = Some(phone);
        }
        if let Some(company) = input.company {
            contact.company = Some(company);
        }
        if let Some(notes) = input.notes {
            contact.notes = Some(notes);
        }
        if let Some(archived) = input.archived {
            contact.archived = archived;
        }

        Ok(self
            .repo
            .update(&contact)
            .await
            .context("Failed to update contact")?)
    }

    /// Archive a contact (hidden from default listings, kept for history)
    pub async fn archive(&self, org_id: i64, id: i64) -> Result<Contact, ContactServiceError> {
        let mut contact = self.get(org_id, id).await?;
        contact.archived = true;
        Ok(self
            .repo
            .update(&contact)
            .await
            .context("Failed to archive contact")?)
    }

    /// Delete a contact permanently
    pub async fn delete(&self, org_id: i64, id: i64) -> Result<(), ContactServiceError> {
        // Surface a 404 rather than silently deleting nothing
        self.get(org_id, id).await?;
        Ok(self
            .repo
            .delete(org_id, id)
            .await
            .context("Failed to delete contact")?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxContactRepository;
    use crate::db::{create_test_pool, migrations};
    use crate::models::ContactKind;

    async fn setup_service() -> ContactService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute("INSERT INTO organizations (name, slug) VALUES ('Test Org', 'test-org')")
            .await
            .unwrap();
        ContactService::new(SqlxContactRepository::boxed(pool))
    }

    fn input(name: &str) -> CreateContactInput {
        CreateContactInput {
            name: name.to_string(),
            kind: ContactKind::Customer,
            email: None,
            phone: None,
            company: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_trims_name() {
        let service = setup_service().await;
        let contact = service.create(1, input("  Globex  ")).await.unwrap();
        assert_eq!(contact.name, "Globex");
    }

    #[tokio::test]
    async fn test_create_rejects_empty_name() {
        let service = setup_service().await;
        let result = service.create(1, input("   ")).await;
        assert!(matches!(
            result,
            Err(ContactServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_email() {
        let service = setup_service().await;
        let mut bad = input("Globex");
        bad.email = Some("nope".into());
        let result = service.create(1, bad).await;
        assert!(matches!(
            result,
            Err(ContactServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_archive_hides_from_default_listing() {
        let service = setup_service().await;
        let contact = service.create(1, input("Globex")).await.unwrap();

        service.archive(1, contact.id).await.unwrap();

        let listed = service
            .list(1, &ListParams::default(), &ContactFilter::default())
            .await
            .unwrap();
        assert!(listed.is_empty());
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let service = setup_service().await;
        let result = service.get(1, 42).await;
        assert!(matches!(result, Err(ContactServiceError::NotFound(42))));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let service = setup_service().await;
        let result = service.delete(1, 42).await;
        assert!(matches!(result, Err(ContactServiceError::NotFound(42))));
    }
}
