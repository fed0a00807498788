use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        helpers::pagination::{Page, PageRequest},
        ports::{clock::Clock, ids::IdGenerator},
        use_cases::organization::OrganizationRepo,
    },
    domain::entities::{
        invoice::{Invoice, InvoiceItem, InvoiceStatus, InvoiceWithItems},
        plan::Plan,
        subscription::Subscription,
    },
};

#[async_trait]
pub trait InvoiceRepo: Send + Sync {
    /// Next value of the store-side invoice number sequence.
    async fn next_invoice_sequence(&self) -> AppResult<i64>;
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<InvoiceWithItems>>;
    async fn get_by_number(&self, invoice_number: &str) -> AppResult<Option<InvoiceWithItems>>;
    async fn list(&self, page: PageRequest) -> AppResult<Page<Invoice>>;
    async fn list_by_organization(
        &self,
        organization_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Invoice>>;
    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<Invoice>>;
    /// Unpaid, uncanceled invoices with `due_date < now`.
    async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Invoice>>;
    /// Invoices with `from <= issue_date <= to`.
    async fn list_by_issue_date(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page: PageRequest,
    ) -> AppResult<Page<Invoice>>;
}

pub fn format_invoice_number(issue_date: DateTime<Utc>, sequence: i64) -> String {
    format!("INV-{}-{:06}", issue_date.format("%Y%m%d"), sequence)
}

// ============================================================================
// Generator
// ============================================================================

/// Builds the draft invoice for a subscription's current period.
///
/// Nothing is written here: the lifecycle transition that asked for the
/// invoice persists it together with the subscription change.
pub struct InvoiceGenerator {
    invoice_repo: Arc<dyn InvoiceRepo>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl InvoiceGenerator {
    pub fn new(
        invoice_repo: Arc<dyn InvoiceRepo>,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            invoice_repo,
            clock,
            ids,
        }
    }

    #[instrument(skip(self, subscription, plan), fields(subscription_id = %subscription.id, plan_id = %plan.id))]
    pub async fn generate_for_period(
        &self,
        subscription: &Subscription,
        plan: &Plan,
    ) -> AppResult<InvoiceWithItems> {
        let now = self.clock.now();
        let sequence = self.invoice_repo.next_invoice_sequence().await?;
        let invoice_id = self.ids.new_id();

        let mut invoice = Invoice {
            id: invoice_id,
            organization_id: subscription.organization_id,
            subscription_id: Some(subscription.id),
            invoice_number: format_invoice_number(now, sequence),
            status: InvoiceStatus::Draft,
            subtotal: plan.price,
            tax_amount: Decimal::ZERO,
            discount_amount: Decimal::ZERO,
            total: plan.price,
            currency: plan.currency.clone(),
            issue_date: now,
            due_date: subscription.current_period_end,
            paid_at: None,
            notes: Some(format!("Subscription: {}", plan.name)),
            created_at: now,
            updated_at: now,
        };
        invoice.recompute_total();

        let item = InvoiceItem::new(
            self.ids.new_id(),
            invoice_id,
            format!("{} - {} subscription", plan.name, plan.interval),
            1,
            plan.price,
            now,
        );

        Ok(InvoiceWithItems {
            invoice,
            items: vec![item],
        })
    }
}

// ============================================================================
// Queries
// ============================================================================

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DateRangeQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

impl DateRangeQuery {
    /// Covers `start` from midnight through the last instant of `end`, both UTC.
    pub fn whole_days(start: NaiveDate, end: NaiveDate) -> AppResult<Self> {
        let from = start.and_time(NaiveTime::MIN).and_utc();
        let to = end
            .checked_add_days(Days::new(1))
            .map(|next| next.and_time(NaiveTime::MIN).and_utc() - chrono::Duration::microseconds(1))
            .ok_or_else(|| AppError::InvalidInput("Invalid end_date".into()))?;
        Ok(Self { from, to })
    }
}

pub struct InvoiceUseCases {
    invoice_repo: Arc<dyn InvoiceRepo>,
    organization_repo: Arc<dyn OrganizationRepo>,
    clock: Arc<dyn Clock>,
}

impl InvoiceUseCases {
    pub fn new(
        invoice_repo: Arc<dyn InvoiceRepo>,
        organization_repo: Arc<dyn OrganizationRepo>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            invoice_repo,
            organization_repo,
            clock,
        }
    }

    #[instrument(skip(self))]
    pub async fn get_invoice(&self, id: Uuid) -> AppResult<InvoiceWithItems> {
        self.invoice_repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice not found".into()))
    }

    #[instrument(skip(self))]
    pub async fn get_invoice_by_number(&self, invoice_number: &str) -> AppResult<InvoiceWithItems> {
        self.invoice_repo
            .get_by_number(invoice_number)
            .await?
            .ok_or_else(|| AppError::NotFound("Invoice not found".into()))
    }

    pub async fn list_invoices(&self, page: PageRequest) -> AppResult<Page<Invoice>> {
        self.invoice_repo.list(page.normalized()).await
    }

    #[instrument(skip(self))]
    pub async fn list_organization_invoices(
        &self,
        organization_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Invoice>> {
        if self
            .organization_repo
            .get_by_id(organization_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFound("Organization not found".into()));
        }
        self.invoice_repo
            .list_by_organization(organization_id, page.normalized())
            .await
    }

    pub async fn list_subscription_invoices(&self, subscription_id: Uuid) -> AppResult<Vec<Invoice>> {
        self.invoice_repo.list_by_subscription(subscription_id).await
    }

    pub async fn list_overdue_invoices(&self) -> AppResult<Vec<Invoice>> {
        self.invoice_repo.list_overdue(self.clock.now()).await
    }

    pub async fn list_invoices_by_date_range(
        &self,
        range: DateRangeQuery,
        page: PageRequest,
    ) -> AppResult<Page<Invoice>> {
        if range.from > range.to {
            return Err(AppError::InvalidInput(
                "Start date must not be after end date".into(),
            ));
        }
        self.invoice_repo
            .list_by_issue_date(range.from, range.to, page.normalized())
            .await
    }
}
