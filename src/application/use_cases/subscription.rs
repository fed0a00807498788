use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        helpers::pagination::{Page, PageRequest},
        ports::{clock::Clock, ids::IdGenerator},
        use_cases::{
            invoice::InvoiceGenerator, organization::OrganizationRepo, plan_catalog::PlanRepo,
        },
    },
    domain::entities::{
        invoice::InvoiceWithItems,
        organization::Organization,
        plan::{BillingInterval, Plan},
        subscription::{Subscription, SubscriptionStatus},
    },
};

// ============================================================================
// Types
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateSubscriptionInput {
    pub organization_id: Uuid,
    pub plan_id: Uuid,
    pub auto_renew: bool,
}

/// A subscription with the plan and organization it references.
#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionDetails {
    #[serde(flatten)]
    pub subscription: Subscription,
    pub plan: Plan,
    pub organization: Organization,
    /// Present when the call that produced this value also issued an invoice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<InvoiceWithItems>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RenewalOutcome {
    pub subscription: Subscription,
    pub invoice: InvoiceWithItems,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub candidates: usize,
    pub trials_converted: usize,
    pub renewed: usize,
    pub expired: usize,
    pub failed: usize,
}

/// Values a transition expects the stored row to still hold. The write is
/// rejected with `Conflict` when either has moved since the row was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionGuard {
    pub status: SubscriptionStatus,
    pub current_period_end: DateTime<Utc>,
}

impl TransitionGuard {
    pub fn of(subscription: &Subscription) -> Self {
        TransitionGuard {
            status: subscription.status,
            current_period_end: subscription.current_period_end,
        }
    }
}

// ============================================================================
// Repository port
// ============================================================================

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>>;
    /// The organization's trialing or active subscription, if any.
    async fn get_open_by_organization(&self, organization_id: Uuid)
    -> AppResult<Option<Subscription>>;
    async fn list(&self, page: PageRequest) -> AppResult<Page<Subscription>>;
    async fn list_by_organization(
        &self,
        organization_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Subscription>>;
    /// Active subscriptions with `current_period_end <= now`.
    async fn list_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>>;
    /// Trialing subscriptions with `trial_end_date <= now`.
    async fn list_elapsed_trials(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>>;
    /// Inserts a subscription and its first invoice in one unit of work.
    ///
    /// Fails with `Conflict` when the organization already holds an open
    /// subscription, and with `NotFound` when it has been deleted.
    async fn insert(
        &self,
        subscription: &Subscription,
        invoice: Option<&InvoiceWithItems>,
    ) -> AppResult<()>;
    /// Writes `subscription` over the stored row and inserts `invoice`, both or
    /// neither. Fails with `Conflict` when the stored row no longer matches `guard`.
    async fn apply_transition(
        &self,
        subscription: &Subscription,
        guard: TransitionGuard,
        invoice: Option<&InvoiceWithItems>,
    ) -> AppResult<()>;
}

// ============================================================================
// Lifecycle engine
// ============================================================================

pub struct SubscriptionUseCases {
    subscription_repo: Arc<dyn SubscriptionRepo>,
    plan_repo: Arc<dyn PlanRepo>,
    organization_repo: Arc<dyn OrganizationRepo>,
    invoice_generator: Arc<InvoiceGenerator>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
    pub(crate) sweep_lock: Mutex<()>,
}

impl SubscriptionUseCases {
    pub fn new(
        subscription_repo: Arc<dyn SubscriptionRepo>,
        plan_repo: Arc<dyn PlanRepo>,
        organization_repo: Arc<dyn OrganizationRepo>,
        invoice_generator: Arc<InvoiceGenerator>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            subscription_repo,
            plan_repo,
            organization_repo,
            invoice_generator,
            clock,
            ids,
            sweep_lock: Mutex::new(()),
        }
    }

    #[instrument(skip(self, input), fields(organization_id = %input.organization_id, plan_id = %input.plan_id))]
    pub async fn create_subscription(
        &self,
        input: CreateSubscriptionInput,
    ) -> AppResult<SubscriptionDetails> {
        let organization = self.load_organization(input.organization_id).await?;
        let plan = self.load_plan(input.plan_id).await?;

        if !plan.is_active {
            return Err(AppError::InvalidInput("Plan is not active".into()));
        }

        if self
            .subscription_repo
            .get_open_by_organization(organization.id)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(
                "Organization already has an active subscription".into(),
            ));
        }

        let interval = billing_interval(&plan)?;
        let now = self.clock.now();
        let period_end = advance(interval, now)?;

        let trial_end_date = plan
            .has_trial()
            .then(|| now + Duration::days(i64::from(plan.trial_days)));
        let status = match trial_end_date {
            Some(trial_end) if now < trial_end => SubscriptionStatus::Trialing,
            _ => SubscriptionStatus::Active,
        };

        let subscription = Subscription {
            id: self.ids.new_id(),
            organization_id: organization.id,
            plan_id: plan.id,
            status,
            start_date: now,
            end_date: Some(period_end),
            trial_end_date,
            current_period_start: now,
            current_period_end: period_end,
            canceled_at: None,
            auto_renew: input.auto_renew,
            created_at: now,
            updated_at: now,
        };

        let invoice = match status {
            SubscriptionStatus::Active => Some(
                self.invoice_generator
                    .generate_for_period(&subscription, &plan)
                    .await?,
            ),
            _ => None,
        };

        self.subscription_repo
            .insert(&subscription, invoice.as_ref())
            .await?;

        info!(
            subscription_id = %subscription.id,
            status = %subscription.status,
            period_end = %subscription.current_period_end,
            "Subscription created"
        );

        Ok(SubscriptionDetails {
            subscription,
            plan,
            organization,
            invoice,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_subscription(&self, id: Uuid) -> AppResult<SubscriptionDetails> {
        let subscription = self.load_subscription(id).await?;
        self.with_details(subscription).await
    }

    /// The organization's trialing or active subscription.
    #[instrument(skip(self))]
    pub async fn get_current_subscription(
        &self,
        organization_id: Uuid,
    ) -> AppResult<SubscriptionDetails> {
        self.load_organization(organization_id).await?;
        let subscription = self
            .subscription_repo
            .get_open_by_organization(organization_id)
            .await?
            .ok_or_else(|| AppError::NotFound("No active subscription found".into()))?;
        self.with_details(subscription).await
    }

    pub async fn list_subscriptions(&self, page: PageRequest) -> AppResult<Page<Subscription>> {
        self.subscription_repo.list(page.normalized()).await
    }

    #[instrument(skip(self))]
    pub async fn list_organization_subscriptions(
        &self,
        organization_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Subscription>> {
        self.load_organization(organization_id).await?;
        self.subscription_repo
            .list_by_organization(organization_id, page.normalized())
            .await
    }

    /// Immediate cancellation ends the subscription now. Otherwise it only stops
    /// renewal and the sweep expires it when the current period ends.
    #[instrument(skip(self))]
    pub async fn cancel_subscription(&self, id: Uuid, immediate: bool) -> AppResult<Subscription> {
        let mut subscription = self.load_subscription(id).await?;

        if !subscription
            .status
            .can_transition_to(SubscriptionStatus::Canceled)
        {
            return Err(AppError::InvalidState(format!(
                "Subscription is already {}",
                subscription.status
            )));
        }

        let guard = TransitionGuard::of(&subscription);
        let now = self.clock.now();
        subscription.canceled_at = Some(now);
        if immediate {
            subscription.status = SubscriptionStatus::Canceled;
            subscription.end_date = Some(now);
        } else {
            subscription.auto_renew = false;
        }
        subscription.updated_at = now;

        self.subscription_repo
            .apply_transition(&subscription, guard, None)
            .await?;

        info!(subscription_id = %id, immediate, "Subscription canceled");
        Ok(subscription)
    }

    #[instrument(skip(self))]
    pub async fn renew_subscription(&self, id: Uuid) -> AppResult<RenewalOutcome> {
        let subscription = self.load_subscription(id).await?;
        self.renew(subscription).await
    }

    /// Converts a trial whose end has passed into a paid period starting at the
    /// trial end.
    #[instrument(skip(self))]
    pub async fn activate_trial(&self, id: Uuid) -> AppResult<RenewalOutcome> {
        let subscription = self.load_subscription(id).await?;
        self.convert_trial(subscription).await
    }

    /// One pass of the expiry sweep.
    ///
    /// Elapsed trials are converted first, or expired when renewal was turned
    /// off during the trial. Then every due active subscription is renewed
    /// period by period until it is current, or expired. Each candidate is
    /// handled on its own; a failure is counted and logged without stopping
    /// the pass.
    pub async fn process_expired(&self) -> AppResult<SweepReport> {
        let _running = self
            .sweep_lock
            .try_lock()
            .map_err(|_| AppError::Conflict("An expiry sweep is already running".into()))?;

        let now = self.clock.now();
        let mut report = SweepReport::default();

        for subscription in self.subscription_repo.list_elapsed_trials(now).await? {
            report.candidates += 1;
            let id = subscription.id;
            if !subscription.auto_renew {
                match self.expire(subscription).await {
                    Ok(()) => report.expired += 1,
                    Err(err) => {
                        report.failed += 1;
                        error!(subscription_id = %id, error = ?err, "Failed to expire trial");
                    }
                }
                continue;
            }
            match self.convert_trial(subscription).await {
                Ok(_) => report.trials_converted += 1,
                Err(err) => {
                    report.failed += 1;
                    warn!(subscription_id = %id, error = ?err, "Trial conversion failed");
                }
            }
        }

        for subscription in self.subscription_repo.list_due(now).await? {
            report.candidates += 1;
            self.sweep_one(subscription, now, &mut report).await;
        }

        info!(
            candidates = report.candidates,
            trials_converted = report.trials_converted,
            renewed = report.renewed,
            expired = report.expired,
            failed = report.failed,
            "Expiry sweep finished"
        );
        Ok(report)
    }

    async fn sweep_one(
        &self,
        mut subscription: Subscription,
        now: DateTime<Utc>,
        report: &mut SweepReport,
    ) {
        let id = subscription.id;

        if subscription.auto_renew {
            // One invoice per missed period until the subscription is current.
            loop {
                match self.renew(subscription.clone()).await {
                    Ok(outcome) => {
                        subscription = outcome.subscription;
                        if subscription.current_period_end > now {
                            report.renewed += 1;
                            return;
                        }
                    }
                    Err(err) => {
                        warn!(subscription_id = %id, error = ?err, "Renewal failed, expiring subscription");
                        break;
                    }
                }
            }
        }

        match self.expire(subscription).await {
            Ok(()) => report.expired += 1,
            Err(err) => {
                report.failed += 1;
                error!(subscription_id = %id, error = ?err, "Failed to expire subscription");
            }
        }
    }

    async fn renew(&self, mut subscription: Subscription) -> AppResult<RenewalOutcome> {
        if subscription.status != SubscriptionStatus::Active {
            return Err(AppError::InvalidState(
                "Only active subscriptions can be renewed".into(),
            ));
        }

        let plan = self.load_plan(subscription.plan_id).await?;
        let interval = billing_interval(&plan)?;
        let guard = TransitionGuard::of(&subscription);

        let period_start = subscription.current_period_end;
        let period_end = advance(interval, period_start)?;
        subscription.current_period_start = period_start;
        subscription.current_period_end = period_end;
        subscription.end_date = Some(period_end);
        subscription.updated_at = self.clock.now();

        let invoice = self
            .invoice_generator
            .generate_for_period(&subscription, &plan)
            .await?;
        self.subscription_repo
            .apply_transition(&subscription, guard, Some(&invoice))
            .await?;

        info!(
            subscription_id = %subscription.id,
            invoice_number = %invoice.invoice.invoice_number,
            period_end = %period_end,
            "Subscription renewed"
        );
        Ok(RenewalOutcome {
            subscription,
            invoice,
        })
    }

    async fn convert_trial(&self, mut subscription: Subscription) -> AppResult<RenewalOutcome> {
        if !subscription
            .status
            .can_transition_to(SubscriptionStatus::Active)
        {
            return Err(AppError::InvalidState(
                "Only trialing subscriptions can be activated".into(),
            ));
        }
        let now = self.clock.now();
        let trial_end = subscription.trial_end_date.unwrap_or(subscription.start_date);
        if trial_end > now {
            return Err(AppError::InvalidState("Trial period has not ended yet".into()));
        }

        let plan = self.load_plan(subscription.plan_id).await?;
        let interval = billing_interval(&plan)?;
        let guard = TransitionGuard::of(&subscription);

        let period_end = advance(interval, trial_end)?;
        subscription.status = SubscriptionStatus::Active;
        subscription.current_period_start = trial_end;
        subscription.current_period_end = period_end;
        subscription.end_date = Some(period_end);
        subscription.updated_at = now;

        let invoice = self
            .invoice_generator
            .generate_for_period(&subscription, &plan)
            .await?;
        self.subscription_repo
            .apply_transition(&subscription, guard, Some(&invoice))
            .await?;

        info!(subscription_id = %subscription.id, "Trial converted to paid subscription");
        Ok(RenewalOutcome {
            subscription,
            invoice,
        })
    }

    async fn expire(&self, mut subscription: Subscription) -> AppResult<()> {
        if !subscription
            .status
            .can_transition_to(SubscriptionStatus::Expired)
        {
            return Err(AppError::InvalidState(format!(
                "A {} subscription cannot expire",
                subscription.status
            )));
        }
        let guard = TransitionGuard::of(&subscription);
        subscription.status = SubscriptionStatus::Expired;
        subscription.updated_at = self.clock.now();
        self.subscription_repo
            .apply_transition(&subscription, guard, None)
            .await?;
        info!(subscription_id = %subscription.id, "Subscription expired");
        Ok(())
    }

    async fn with_details(&self, subscription: Subscription) -> AppResult<SubscriptionDetails> {
        let plan = self.load_plan(subscription.plan_id).await?;
        let organization = self.load_organization(subscription.organization_id).await?;
        Ok(SubscriptionDetails {
            subscription,
            plan,
            organization,
            invoice: None,
        })
    }

    async fn load_subscription(&self, id: Uuid) -> AppResult<Subscription> {
        self.subscription_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Subscription not found".into()))
    }

    async fn load_plan(&self, id: Uuid) -> AppResult<Plan> {
        self.plan_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Plan not found".into()))
    }

    async fn load_organization(&self, id: Uuid) -> AppResult<Organization> {
        self.organization_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Organization not found".into()))
    }
}

fn billing_interval(plan: &Plan) -> AppResult<BillingInterval> {
    plan.billing_interval().ok_or_else(|| {
        AppError::InvalidInput(format!(
            "Plan has an invalid billing interval '{}'",
            plan.interval
        ))
    })
}

fn advance(interval: BillingInterval, from: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    interval
        .advance(from)
        .ok_or_else(|| AppError::InvalidInput("Billing period end is out of range".into()))
}
