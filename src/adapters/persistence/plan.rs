use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, parse_json_with_fallback},
    app_error::{AppError, AppResult},
    application::{
        helpers::pagination::{Page, PageRequest},
        use_cases::plan_catalog::PlanRepo,
    },
    domain::entities::plan::Plan,
};

fn row_to_plan(row: sqlx::postgres::PgRow) -> Plan {
    let id: Uuid = row.get("id");
    let features_json: serde_json::Value = row.get("features");
    let features: Vec<String> =
        parse_json_with_fallback(&features_json, "features", "plan", &id.to_string());

    Plan {
        id,
        name: row.get("name"),
        slug: row.get("slug"),
        description: row.get("description"),
        price: row.get("price"),
        currency: row.get("currency"),
        interval: row.get("interval"),
        features,
        trial_days: row.get("trial_days"),
        is_active: row.get("is_active"),
        is_popular: row.get("is_popular"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, name, slug, description, price, currency, interval, features,
    trial_days, is_active, is_popular, created_at, updated_at
"#;

fn features_to_json(plan: &Plan) -> serde_json::Value {
    serde_json::Value::Array(
        plan.features
            .iter()
            .cloned()
            .map(serde_json::Value::String)
            .collect(),
    )
}

#[async_trait]
impl PlanRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Plan>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM plans WHERE id = $1 AND deleted_at IS NULL",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_plan))
    }

    async fn get_by_slug(&self, slug: &str) -> AppResult<Option<Plan>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM plans WHERE slug = $1 AND deleted_at IS NULL",
            SELECT_COLS
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_plan))
    }

    async fn list(&self, page: PageRequest) -> AppResult<Page<Plan>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plans WHERE deleted_at IS NULL")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::from)?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM plans WHERE deleted_at IS NULL ORDER BY created_at DESC, id LIMIT $1 OFFSET $2",
            SELECT_COLS
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(Page::new(
            rows.into_iter().map(row_to_plan).collect(),
            total,
            page,
        ))
    }

    async fn list_active(&self) -> AppResult<Vec<Plan>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM plans WHERE is_active = true AND deleted_at IS NULL ORDER BY price, id",
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_plan).collect())
    }

    async fn list_popular(&self) -> AppResult<Vec<Plan>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM plans WHERE is_active = true AND is_popular = true AND deleted_at IS NULL ORDER BY price, id",
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_plan).collect())
    }

    async fn create(&self, plan: &Plan) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO plans (
                id, name, slug, description, price, currency, interval, features,
                trial_days, is_active, is_popular, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(plan.id)
        .bind(&plan.name)
        .bind(&plan.slug)
        .bind(&plan.description)
        .bind(plan.price)
        .bind(&plan.currency)
        .bind(&plan.interval)
        .bind(features_to_json(plan))
        .bind(plan.trial_days)
        .bind(plan.is_active)
        .bind(plan.is_popular)
        .bind(plan.created_at)
        .bind(plan.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(())
    }

    async fn update(&self, plan: &Plan) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE plans
            SET name = $2, slug = $3, description = $4, price = $5, currency = $6,
                interval = $7, features = $8, trial_days = $9, is_active = $10,
                updated_at = $11
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(plan.id)
        .bind(&plan.name)
        .bind(&plan.slug)
        .bind(&plan.description)
        .bind(plan.price)
        .bind(&plan.currency)
        .bind(&plan.interval)
        .bind(features_to_json(plan))
        .bind(plan.trial_days)
        .bind(plan.is_active)
        .bind(plan.updated_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Plan not found".into()));
        }
        Ok(())
    }

    async fn clear_popular(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE plans
            SET is_popular = false,
                updated_at = CASE WHEN is_popular THEN $2 ELSE updated_at END
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Plan not found".into()));
        }
        Ok(())
    }

    async fn set_active(&self, id: Uuid, is_active: bool, now: DateTime<Utc>) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE plans SET is_active = $2, updated_at = $3 WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(is_active)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Plan not found".into()));
        }
        Ok(())
    }

    async fn set_popular(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        // One statement over every live row: each row is locked and rewritten,
        // so a concurrent call waits and then overwrites the whole flag set.
        let result = sqlx::query(
            r#"
            UPDATE plans
            SET is_popular = (id = $1),
                updated_at = CASE WHEN is_popular <> (id = $1) THEN $2 ELSE updated_at END
            WHERE deleted_at IS NULL
              AND EXISTS (SELECT 1 FROM plans WHERE id = $1 AND deleted_at IS NULL)
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Plan not found".into()));
        }
        Ok(())
    }
}
