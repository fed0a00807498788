use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
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
            PLAN_DESCRIPTION_MAX_LEN, PLAN_DESCRIPTION_MIN_LEN, PLAN_NAME_MAX_LEN,
            PLAN_NAME_MIN_LEN, parse_interval, validate_currency, validate_features,
            validate_length, validate_price, validate_trial_days,
        },
    },
    domain::entities::plan::Plan,
};

// ============================================================================
// Inputs
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePlanInput {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub currency: String,
    pub interval: String,
    pub features: Vec<String>,
    #[serde(default)]
    pub trial_days: i32,
    #[serde(default)]
    pub is_popular: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePlanInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub interval: Option<String>,
    pub features: Option<Vec<String>>,
    pub trial_days: Option<i32>,
    pub is_active: Option<bool>,
    pub is_popular: Option<bool>,
}

// ============================================================================
// Repository port
// ============================================================================

#[async_trait]
pub trait PlanRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Plan>>;
    async fn get_by_slug(&self, slug: &str) -> AppResult<Option<Plan>>;
    async fn list(&self, page: PageRequest) -> AppResult<Page<Plan>>;
    /// Active plans ordered by ascending price.
    async fn list_active(&self) -> AppResult<Vec<Plan>>;
    /// Active plans flagged popular, ordered by ascending price.
    async fn list_popular(&self) -> AppResult<Vec<Plan>>;
    /// Fails with `Conflict` when the slug is taken.
    async fn create(&self, plan: &Plan) -> AppResult<()>;
    /// Writes every field except `is_popular`, which only `set_popular` and
    /// `clear_popular` change. Fails with `NotFound` when no live plan has this id.
    async fn update(&self, plan: &Plan) -> AppResult<()>;
    async fn set_active(&self, id: Uuid, is_active: bool, now: DateTime<Utc>) -> AppResult<()>;
    /// Marks `id` popular and every other plan not popular as one atomic write.
    async fn set_popular(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()>;
    async fn clear_popular(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()>;
}

// ============================================================================
// Use cases
// ============================================================================

pub struct PlanCatalogUseCases {
    plan_repo: Arc<dyn PlanRepo>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl PlanCatalogUseCases {
    pub fn new(
        plan_repo: Arc<dyn PlanRepo>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            plan_repo,
            clock,
            ids,
        }
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create_plan(&self, input: CreatePlanInput) -> AppResult<Plan> {
        let name = input.name.trim().to_string();
        validate_length("Plan name", &name, PLAN_NAME_MIN_LEN, PLAN_NAME_MAX_LEN)?;
        validate_length(
            "Plan description",
            &input.description,
            PLAN_DESCRIPTION_MIN_LEN,
            PLAN_DESCRIPTION_MAX_LEN,
        )?;
        validate_price(input.price)?;
        validate_currency(&input.currency)?;
        parse_interval(&input.interval)?;
        validate_features(&input.features)?;
        validate_trial_days(input.trial_days)?;

        let slug = generate_slug(&name);
        if self.plan_repo.get_by_slug(&slug).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "A plan with slug '{}' already exists",
                slug
            )));
        }

        let now = self.clock.now();
        let mut plan = Plan {
            id: self.ids.new_id(),
            name,
            slug,
            description: input.description.trim().to_string(),
            price: input.price,
            currency: input.currency,
            interval: input.interval,
            features: input.features,
            trial_days: input.trial_days,
            is_active: true,
            is_popular: false,
            created_at: now,
            updated_at: now,
        };
        self.plan_repo.create(&plan).await?;

        if input.is_popular {
            self.plan_repo.set_popular(plan.id, now).await?;
            plan.is_popular = true;
        }

        info!(plan_id = %plan.id, slug = %plan.slug, "Plan created");
        Ok(plan)
    }

    #[instrument(skip(self))]
    pub async fn get_plan(&self, id: Uuid) -> AppResult<Plan> {
        self.plan_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Plan not found".into()))
    }

    #[instrument(skip(self))]
    pub async fn get_plan_by_slug(&self, slug: &str) -> AppResult<Plan> {
        self.plan_repo
            .get_by_slug(slug)
            .await?
            .ok_or_else(|| AppError::NotFound("Plan not found".into()))
    }

    pub async fn list_plans(&self, page: PageRequest) -> AppResult<Page<Plan>> {
        self.plan_repo.list(page.normalized()).await
    }

    pub async fn list_active_plans(&self) -> AppResult<Vec<Plan>> {
        self.plan_repo.list_active().await
    }

    pub async fn list_popular_plans(&self) -> AppResult<Vec<Plan>> {
        self.plan_repo.list_popular().await
    }

    #[instrument(skip(self, input))]
    pub async fn update_plan(&self, id: Uuid, input: UpdatePlanInput) -> AppResult<Plan> {
        let mut plan = self.get_plan(id).await?;

        if let Some(name) = input.name {
            let name = name.trim().to_string();
            validate_length("Plan name", &name, PLAN_NAME_MIN_LEN, PLAN_NAME_MAX_LEN)?;
            let slug = generate_slug(&name);
            if slug != plan.slug {
                if let Some(existing) = self.plan_repo.get_by_slug(&slug).await? {
                    if existing.id != plan.id {
                        return Err(AppError::Conflict(format!(
                            "A plan with slug '{}' already exists",
                            slug
                        )));
                    }
                }
            }
            plan.name = name;
            plan.slug = slug;
        }
        if let Some(description) = input.description {
            validate_length(
                "Plan description",
                &description,
                PLAN_DESCRIPTION_MIN_LEN,
                PLAN_DESCRIPTION_MAX_LEN,
            )?;
            plan.description = description.trim().to_string();
        }
        if let Some(price) = input.price {
            validate_price(price)?;
            plan.price = price;
        }
        if let Some(currency) = input.currency {
            validate_currency(&currency)?;
            plan.currency = currency;
        }
        if let Some(interval) = input.interval {
            parse_interval(&interval)?;
            plan.interval = interval;
        }
        if let Some(features) = input.features {
            validate_features(&features)?;
            plan.features = features;
        }
        if let Some(trial_days) = input.trial_days {
            validate_trial_days(trial_days)?;
            plan.trial_days = trial_days;
        }
        if let Some(is_active) = input.is_active {
            plan.is_active = is_active;
        }

        let now = self.clock.now();
        plan.updated_at = now;
        self.plan_repo.update(&plan).await?;

        match input.is_popular {
            Some(true) => self.plan_repo.set_popular(plan.id, now).await?,
            Some(false) => self.plan_repo.clear_popular(plan.id, now).await?,
            None => {}
        }

        info!(plan_id = %plan.id, "Plan updated");
        self.get_plan(id).await
    }

    #[instrument(skip(self))]
    pub async fn set_plan_active(&self, id: Uuid, is_active: bool) -> AppResult<Plan> {
        self.plan_repo
            .set_active(id, is_active, self.clock.now())
            .await?;
        info!(plan_id = %id, is_active, "Plan availability changed");
        self.get_plan(id).await
    }

    pub async fn activate_plan(&self, id: Uuid) -> AppResult<Plan> {
        self.set_plan_active(id, true).await
    }

    pub async fn deactivate_plan(&self, id: Uuid) -> AppResult<Plan> {
        self.set_plan_active(id, false).await
    }

    /// Plans are never removed while subscriptions may reference them;
    /// deleting a plan withdraws it from sale.
    pub async fn delete_plan(&self, id: Uuid) -> AppResult<()> {
        self.deactivate_plan(id).await.map(|_| ())
    }

    #[instrument(skip(self))]
    pub async fn set_popular_plan(&self, id: Uuid) -> AppResult<Plan> {
        self.plan_repo.set_popular(id, self.clock.now()).await?;
        info!(plan_id = %id, "Popular plan changed");
        self.get_plan(id).await
    }
}
