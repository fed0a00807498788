use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        helpers::{
            pagination::{Page, PageRequest},
            slug::generate_slug,
        },
        ports::{clock::Clock, ids::IdGenerator},
        validators::{
            ORGANIZATION_DESCRIPTION_MAX_LEN, ORGANIZATION_NAME_MAX_LEN,
            ORGANIZATION_NAME_MIN_LEN, is_valid_email, validate_length,
        },
    },
    domain::entities::organization::Organization,
};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrganizationInput {
    pub name: String,
    pub description: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOrganizationInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub email: Option<String>,
    pub is_active: Option<bool>,
}

#[async_trait]
pub trait OrganizationRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Organization>>;
    async fn get_by_slug(&self, slug: &str) -> AppResult<Option<Organization>>;
    async fn list(&self, page: PageRequest) -> AppResult<Page<Organization>>;
    async fn create(&self, organization: &Organization) -> AppResult<()>;
    async fn update(&self, organization: &Organization) -> AppResult<()>;
    /// Tombstones the organization. Fails with `Conflict` while it holds a
    /// trialing or active subscription; the check and the write are one unit.
    async fn soft_delete(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()>;
}

pub struct OrganizationUseCases {
    organization_repo: Arc<dyn OrganizationRepo>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl OrganizationUseCases {
    pub fn new(
        organization_repo: Arc<dyn OrganizationRepo>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            organization_repo,
            clock,
            ids,
        }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_organization(
        &self,
        input: CreateOrganizationInput,
    ) -> AppResult<Organization> {
        let name = input.name.trim().to_string();
        validate_length(
            "Organization name",
            &name,
            ORGANIZATION_NAME_MIN_LEN,
            ORGANIZATION_NAME_MAX_LEN,
        )?;
        let description = normalize_description(input.description)?;
        let email = normalize_email(input.email)?;

        let slug = generate_slug(&name);
        if self.organization_repo.get_by_slug(&slug).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "An organization with slug '{}' already exists",
                slug
            )));
        }

        let now = self.clock.now();
        let organization = Organization {
            id: self.ids.new_id(),
            name,
            slug,
            description,
            email,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.organization_repo.create(&organization).await?;

        info!(organization_id = %organization.id, slug = %organization.slug, "Organization created");
        Ok(organization)
    }

    #[instrument(skip(self))]
    pub async fn get_organization(&self, id: Uuid) -> AppResult<Organization> {
        self.organization_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Organization not found".into()))
    }

    #[instrument(skip(self))]
    pub async fn get_organization_by_slug(&self, slug: &str) -> AppResult<Organization> {
        self.organization_repo
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound("Organization not found".into()))
    }

    pub async fn list_organizations(&self, page: PageRequest) -> AppResult<Page<Organization>> {
        self.organization_repo.list(page.normalized()).await
    }

    #[instrument(skip(self, input))]
    pub async fn update_organization(
        &self,
        id: Uuid,
        input: UpdateOrganizationInput,
    ) -> AppResult<Organization> {
        let mut organization = self.get_organization(id).await?;

        if let Some(name) = input.name {
            let name = name.trim().to_string();
            validate_length(
                "Organization name",
                &name,
                ORGANIZATION_NAME_MIN_LEN,
                ORGANIZATION_NAME_MAX_LEN,
            )?;
            let slug = generate_slug(&name);
            if slug != organization.slug {
                if let Some(existing) = self.organization_repo.get_by_slug(&slug).await? {
                    if existing.id != organization.id {
                        return Err(AppError::Conflict(format!(
                            "An organization with slug '{}' already exists",
                            slug
                        )));
                    }
                }
            }
            organization.name = name;
            organization.slug = slug;
        }
        if input.description.is_some() {
            organization.description = normalize_description(input.description)?;
        }
        if input.email.is_some() {
            organization.email = normalize_email(input.email)?;
        }
        if let Some(is_active) = input.is_active {
            organization.is_active = is_active;
        }
        organization.updated_at = self.clock.now();

        self.organization_repo.update(&organization).await?;
        Ok(organization)
    }

    /// Soft-deletes the organization. Refused while it holds an open subscription.
    #[instrument(skip(self))]
    pub async fn delete_organization(&self, id: Uuid) -> AppResult<()> {
        self.organization_repo
            .soft_delete(id, self.clock.now())
            .await?;
        info!(organization_id = %id, "Organization deleted");
        Ok(())
    }
}

fn normalize_description(description: Option<String>) -> AppResult<Option<String>> {
    match description.map(|d| d.trim().to_string()) {
        Some(d) if d.is_empty() => Ok(None),
        Some(d) => {
            validate_length(
                "Organization description",
                &d,
                0,
                ORGANIZATION_DESCRIPTION_MAX_LEN,
            )?;
            Ok(Some(d))
        }
        None => Ok(None),
    }
}

fn normalize_email(email: Option<String>) -> AppResult<Option<String>> {
    match email.map(|e| e.trim().to_string()) {
        Some(e) if e.is_empty() => Ok(None),
        Some(e) if is_valid_email(&e) => Ok(Some(e)),
        Some(_) => Err(AppError::InvalidInput("Invalid email address".into())),
        None => Ok(None),
    }
}
