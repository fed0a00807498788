use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    application::{
        helpers::pagination::{Page, PageRequest},
        use_cases::organization::OrganizationRepo,
    },
    domain::entities::organization::Organization,
};

fn row_to_organization(row: sqlx::postgres::PgRow) -> Organization {
    Organization {
        id: row.get("id"),
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        email: row.get("email"),
        is_active: row.get("is_active"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = "id, name, slug, description, email, is_active, created_at, updated_at";

#[async_trait]
impl OrganizationRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Organization>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM organizations WHERE id = $1 AND deleted_at IS NULL",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_organization))
    }

    async fn get_by_slug(&self, slug: &str) -> AppResult<Option<Organization>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM organizations WHERE slug = $1 AND deleted_at IS NULL",
            SELECT_COLS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_organization))
    }

    async fn list(&self, page: PageRequest) -> AppResult<Page<Organization>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM organizations WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(AppError::from)?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM organizations WHERE deleted_at IS NULL ORDER BY created_at DESC, id LIMIT $1 OFFSET $2",
            SELECT_COLS
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(Page::new(
            rows.into_iter().map(row_to_organization).collect(),
            total,
            page,
        ))
    }

    async fn create(&self, organization: &Organization) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, slug, description, email, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(organization.id)
        .bind(&organization.name)
        .bind(&organization.slug)
        .bind(&organization.description)
        .bind(&organization.email)
        .bind(organization.is_active)
        .bind(organization.created_at)
        .bind(organization.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn update(&self, organization: &Organization) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE organizations
            SET name = $2, slug = $3, description = $4, email = $5, is_active = $6, updated_at = $7
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(organization.id)
        .bind(&organization.name)
        .bind(&organization.slug)
        .bind(&organization.description)
        .bind(&organization.email)
        .bind(organization.is_active)
        .bind(organization.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Organization not found".into()));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // Row lock first: a subscription insert holds FOR SHARE on the same row,
        // so the open-subscription check below sees it once it commits.
        let locked = sqlx::query(
            "SELECT id FROM organizations WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?;
        if locked.is_none() {
            return Err(AppError::NotFound("Organization not found".into()));
        }

        let result = sqlx::query(
            r#"
            UPDATE organizations
            SET deleted_at = $2, updated_at = $2
            WHERE id = $1
              AND NOT EXISTS (
                  SELECT 1 FROM subscriptions
                  WHERE organization_id = $1 AND status IN ('trialing', 'active')
              )
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::Conflict(
                "Organization has an open subscription; cancel it first".into(),
            ));
        }

        tx.commit().await.map_err(AppError::from)?;
        Ok(())
    }
}
