use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::error;
use uuid::Uuid;

use crate::{
    adapters::persistence::{PostgresPersistence, invoice::insert_invoice},
    app_error::{AppError, AppResult},
    application::{
        helpers::pagination::{Page, PageRequest},
        use_cases::subscription::{SubscriptionRepo, TransitionGuard},
    },
    domain::entities::{invoice::InvoiceWithItems, subscription::Subscription},
};

fn row_to_subscription(row: sqlx::postgres::PgRow) -> Subscription {
    Subscription {
        id: row.get("id"),
        organization_id: row.get("organization_id"),
        plan_id: row.get("plan_id"),
        status: row.get("status"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        trial_end_date: row.get("trial_end_date"),
        current_period_start: row.get("current_period_start"),
        current_period_end: row.get("current_period_end"),
        canceled_at: row.get("canceled_at"),
        auto_renew: row.get("auto_renew"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const SELECT_COLS: &str = r#"
    id, organization_id, plan_id, status, start_date, end_date, trial_end_date,
    current_period_start, current_period_end, canceled_at, auto_renew, created_at, updated_at
"#;

async fn commit(tx: sqlx::Transaction<'_, sqlx::Postgres>) -> AppResult<()> {
    tx.commit().await.map_err(|e| {
        error!(error = ?e, "Failed to commit subscription write");
        AppError::from(e)
    })
}

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE id = $1 AND deleted_at IS NULL",
            SELECT_COLS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_subscription))
    }

    async fn get_open_by_organization(
        &self,
        organization_id: Uuid,
    ) -> AppResult<Option<Subscription>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE organization_id = $1 AND status IN ('trialing', 'active') AND deleted_at IS NULL",
            SELECT_COLS
        ))
        .bind(organization_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(row.map(row_to_subscription))
    }

    async fn list(&self, page: PageRequest) -> AppResult<Page<Subscription>> {
        let total: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE deleted_at IS NULL")
                .fetch_one(&self.pool)
                .await
                .map_err(AppError::from)?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE deleted_at IS NULL ORDER BY created_at DESC, id LIMIT $1 OFFSET $2",
            SELECT_COLS
        ))
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(Page::new(
            rows.into_iter().map(row_to_subscription).collect(),
            total,
            page,
        ))
    }

    async fn list_by_organization(
        &self,
        organization_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Subscription>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM subscriptions WHERE organization_id = $1 AND deleted_at IS NULL",
        )
        .bind(organization_id)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::from)?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE organization_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC, id LIMIT $2 OFFSET $3",
            SELECT_COLS
        ))
        .bind(organization_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(Page::new(
            rows.into_iter().map(row_to_subscription).collect(),
            total,
            page,
        ))
    }

    async fn list_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE status = 'active' AND current_period_end <= $1 AND deleted_at IS NULL ORDER BY current_period_end, id",
            SELECT_COLS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_subscription).collect())
    }

    async fn list_elapsed_trials(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM subscriptions WHERE status = 'trialing' AND trial_end_date <= $1 AND deleted_at IS NULL ORDER BY trial_end_date, id",
            SELECT_COLS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(rows.into_iter().map(row_to_subscription).collect())
    }

    async fn insert(
        &self,
        subscription: &Subscription,
        invoice: Option<&InvoiceWithItems>,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // Blocks a concurrent soft delete of the organization until this commits.
        let organization = sqlx::query(
            "SELECT id FROM organizations WHERE id = $1 AND deleted_at IS NULL FOR SHARE",
        )
        .bind(subscription.organization_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(AppError::from)?;
        if organization.is_none() {
            return Err(AppError::NotFound("Organization not found".into()));
        }

        // The partial unique index turns a racing second insert into a Conflict.
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                id, organization_id, plan_id, status, start_date, end_date, trial_end_date,
                current_period_start, current_period_end, canceled_at, auto_renew, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(subscription.id)
        .bind(subscription.organization_id)
        .bind(subscription.plan_id)
        .bind(subscription.status)
        .bind(subscription.start_date)
        .bind(subscription.end_date)
        .bind(subscription.trial_end_date)
        .bind(subscription.current_period_start)
        .bind(subscription.current_period_end)
        .bind(subscription.canceled_at)
        .bind(subscription.auto_renew)
        .bind(subscription.created_at)
        .bind(subscription.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if let Some(invoice) = invoice {
            insert_invoice(&mut *tx, invoice).await?;
        }

        commit(tx).await
    }

    async fn apply_transition(
        &self,
        subscription: &Subscription,
        guard: TransitionGuard,
        invoice: Option<&InvoiceWithItems>,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        let result = sqlx::query(
            r#"
            UPDATE subscriptions
            SET status = $2, end_date = $3, trial_end_date = $4, current_period_start = $5,
                current_period_end = $6, canceled_at = $7, auto_renew = $8, updated_at = $9
            WHERE id = $1 AND status = $10 AND current_period_end = $11 AND deleted_at IS NULL
            "#,
        )
        .bind(subscription.id)
        .bind(subscription.status)
        .bind(subscription.end_date)
        .bind(subscription.trial_end_date)
        .bind(subscription.current_period_start)
        .bind(subscription.current_period_end)
        .bind(subscription.canceled_at)
        .bind(subscription.auto_renew)
        .bind(subscription.updated_at)
        .bind(guard.status)
        .bind(guard.current_period_end)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        if result.rows_affected() == 0 {
            tx.rollback().await.ok();
            return Err(AppError::Conflict(
                "Subscription was modified concurrently; retry the operation".into(),
            ));
        }

        if let Some(invoice) = invoice {
            insert_invoice(&mut *tx, invoice).await?;
        }

        commit(tx).await
    }
}
