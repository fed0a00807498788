//! In-memory implementation of every billing repository trait.
//!
//! One store backs all four traits so that a subscription transition and the
//! invoice it produces are written under a single lock, mirroring the
//! transaction the Postgres adapter uses.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::{
        helpers::pagination::{Page, PageRequest},
        use_cases::{
            invoice::InvoiceRepo,
            organization::OrganizationRepo,
            plan_catalog::PlanRepo,
            subscription::{SubscriptionRepo, TransitionGuard},
        },
    },
    domain::entities::{
        invoice::{Invoice, InvoiceItem, InvoiceWithItems},
        organization::Organization,
        plan::Plan,
        subscription::Subscription,
    },
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoreSnapshot {
    pub organizations: HashMap<Uuid, Organization>,
    pub deleted_organizations: HashSet<Uuid>,
    pub plans: HashMap<Uuid, Plan>,
    pub subscriptions: HashMap<Uuid, Subscription>,
    pub invoices: HashMap<Uuid, Invoice>,
    pub invoice_items: HashMap<Uuid, InvoiceItem>,
}

impl StoreSnapshot {
    fn live_organization(&self, id: Uuid) -> Option<&Organization> {
        self.organizations
            .get(&id)
            .filter(|_| !self.deleted_organizations.contains(&id))
    }

    fn with_items(&self, invoice: &Invoice) -> InvoiceWithItems {
        let mut items: Vec<InvoiceItem> = self
            .invoice_items
            .values()
            .filter(|item| item.invoice_id == invoice.id)
            .cloned()
            .collect();
        items.sort_by_key(|item| (item.created_at, item.id));
        InvoiceWithItems {
            invoice: invoice.clone(),
            items,
        }
    }

    fn write_invoice(&mut self, invoice: &InvoiceWithItems) -> AppResult<()> {
        if self
            .invoices
            .values()
            .any(|existing| existing.invoice_number == invoice.invoice.invoice_number)
        {
            return Err(AppError::Conflict("Invoice number already exists".into()));
        }
        self.invoices
            .insert(invoice.invoice.id, invoice.invoice.clone());
        for item in &invoice.items {
            self.invoice_items.insert(item.id, item.clone());
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryBillingStore {
    data: Mutex<StoreSnapshot>,
    invoice_sequence: AtomicI64,
    fail_invoice_writes: AtomicBool,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_organization(&self, organization: Organization) -> Organization {
        self.data
            .lock()
            .unwrap()
            .organizations
            .insert(organization.id, organization.clone());
        organization
    }

    pub fn insert_plan(&self, plan: Plan) -> Plan {
        self.data.lock().unwrap().plans.insert(plan.id, plan.clone());
        plan
    }

    pub fn insert_subscription(&self, subscription: Subscription) -> Subscription {
        self.data
            .lock()
            .unwrap()
            .subscriptions
            .insert(subscription.id, subscription.clone());
        subscription
    }

    pub fn insert_invoice(&self, invoice: InvoiceWithItems) -> InvoiceWithItems {
        let mut data = self.data.lock().unwrap();
        data.invoices
            .insert(invoice.invoice.id, invoice.invoice.clone());
        for item in &invoice.items {
            data.invoice_items.insert(item.id, item.clone());
        }
        invoice
    }

    /// Makes every subsequent invoice write fail with a storage error.
    pub fn fail_invoice_writes(&self, fail: bool) {
        self.fail_invoice_writes.store(fail, Ordering::SeqCst);
    }

    pub fn subscription(&self, id: Uuid) -> Option<Subscription> {
        self.data.lock().unwrap().subscriptions.get(&id).cloned()
    }

    pub fn invoices_for(&self, subscription_id: Uuid) -> Vec<Invoice> {
        let mut invoices: Vec<Invoice> = self
            .data
            .lock()
            .unwrap()
            .invoices
            .values()
            .filter(|i| i.subscription_id == Some(subscription_id))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| a.invoice_number.cmp(&b.invoice_number));
        invoices
    }

    pub fn subscription_count(&self) -> usize {
        self.data.lock().unwrap().subscriptions.len()
    }

    pub fn open_subscription_count(&self, organization_id: Uuid) -> usize {
        self.data
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .filter(|s| s.organization_id == organization_id && s.status.is_open())
            .count()
    }

    pub fn invoice_count(&self) -> usize {
        self.data.lock().unwrap().invoices.len()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        self.data.lock().unwrap().clone()
    }

    fn check_invoice_write(&self, invoice: Option<&InvoiceWithItems>) -> AppResult<()> {
        if invoice.is_some() && self.fail_invoice_writes.load(Ordering::SeqCst) {
            return Err(AppError::Storage("Simulated invoice write failure".into()));
        }
        Ok(())
    }
}

fn paginate<T>(mut items: Vec<T>, page: PageRequest) -> Page<T> {
    let total = items.len() as i64;
    let start = (page.offset() as usize).min(items.len());
    let end = (start + page.per_page as usize).min(items.len());
    let slice = items.drain(start..end).collect();
    Page::new(slice, total, page)
}

// ============================================================================
// PlanRepo
// ============================================================================

#[async_trait]
impl PlanRepo for InMemoryBillingStore {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Plan>> {
        Ok(self.data.lock().unwrap().plans.get(&id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> AppResult<Option<Plan>> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .plans
            .values()
            .find(|p| p.slug == slug)
            .cloned())
    }

    async fn list(&self, page: PageRequest) -> AppResult<Page<Plan>> {
        let mut plans: Vec<Plan> = self.data.lock().unwrap().plans.values().cloned().collect();
        plans.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(plans, page))
    }

    async fn list_active(&self) -> AppResult<Vec<Plan>> {
        let mut plans: Vec<Plan> = self
            .data
            .lock()
            .unwrap()
            .plans
            .values()
            .filter(|p| p.is_active)
            .cloned()
            .collect();
        plans.sort_by(|a, b| a.price.cmp(&b.price).then(a.id.cmp(&b.id)));
        Ok(plans)
    }

    async fn list_popular(&self) -> AppResult<Vec<Plan>> {
        Ok(self
            .list_active()
            .await?
            .into_iter()
            .filter(|p| p.is_popular)
            .collect())
    }

    async fn create(&self, plan: &Plan) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        if data.plans.values().any(|p| p.slug == plan.slug) {
            return Err(AppError::Conflict("Plan slug already exists".into()));
        }
        data.plans.insert(plan.id, plan.clone());
        Ok(())
    }

    async fn update(&self, plan: &Plan) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        if data
            .plans
            .values()
            .any(|p| p.slug == plan.slug && p.id != plan.id)
        {
            return Err(AppError::Conflict("Plan slug already exists".into()));
        }
        match data.plans.get_mut(&plan.id) {
            Some(stored) => {
                let is_popular = stored.is_popular;
                *stored = plan.clone();
                stored.is_popular = is_popular;
                Ok(())
            }
            None => Err(AppError::NotFound("Plan not found".into())),
        }
    }

    async fn set_active(&self, id: Uuid, is_active: bool, now: DateTime<Utc>) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        let plan = data
            .plans
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Plan not found".into()))?;
        plan.is_active = is_active;
        plan.updated_at = now;
        Ok(())
    }

    async fn set_popular(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        if !data.plans.contains_key(&id) {
            return Err(AppError::NotFound("Plan not found".into()));
        }
        for plan in data.plans.values_mut() {
            let popular = plan.id == id;
            if plan.is_popular != popular {
                plan.is_popular = popular;
                plan.updated_at = now;
            }
        }
        Ok(())
    }

    async fn clear_popular(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        let plan = data
            .plans
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Plan not found".into()))?;
        if plan.is_popular {
            plan.is_popular = false;
            plan.updated_at = now;
        }
        Ok(())
    }
}

// ============================================================================
// OrganizationRepo
// ============================================================================

#[async_trait]
impl OrganizationRepo for InMemoryBillingStore {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Organization>> {
        Ok(self.data.lock().unwrap().live_organization(id).cloned())
    }

    async fn get_by_slug(&self, slug: &str) -> AppResult<Option<Organization>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .organizations
            .values()
            .find(|o| o.slug == slug && !data.deleted_organizations.contains(&o.id))
            .cloned())
    }

    async fn list(&self, page: PageRequest) -> AppResult<Page<Organization>> {
        let data = self.data.lock().unwrap();
        let mut organizations: Vec<Organization> = data
            .organizations
            .values()
            .filter(|o| !data.deleted_organizations.contains(&o.id))
            .cloned()
            .collect();
        organizations.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(organizations, page))
    }

    async fn create(&self, organization: &Organization) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        if data
            .organizations
            .values()
            .any(|o| o.slug == organization.slug && !data.deleted_organizations.contains(&o.id))
        {
            return Err(AppError::Conflict("Organization slug already exists".into()));
        }
        data.organizations
            .insert(organization.id, organization.clone());
        Ok(())
    }

    async fn update(&self, organization: &Organization) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        if data.live_organization(organization.id).is_none() {
            return Err(AppError::NotFound("Organization not found".into()));
        }
        data.organizations
            .insert(organization.id, organization.clone());
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid, now: DateTime<Utc>) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        if data.live_organization(id).is_none() {
            return Err(AppError::NotFound("Organization not found".into()));
        }
        if data
            .subscriptions
            .values()
            .any(|s| s.organization_id == id && s.status.is_open())
        {
            return Err(AppError::Conflict(
                "Organization has an open subscription; cancel it first".into(),
            ));
        }
        if let Some(organization) = data.organizations.get_mut(&id) {
            organization.updated_at = now;
        }
        data.deleted_organizations.insert(id);
        Ok(())
    }
}

// ============================================================================
// SubscriptionRepo
// ============================================================================

#[async_trait]
impl SubscriptionRepo for InMemoryBillingStore {
    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<Subscription>> {
        Ok(self.subscription(id))
    }

    async fn get_open_by_organization(
        &self,
        organization_id: Uuid,
    ) -> AppResult<Option<Subscription>> {
        Ok(self
            .data
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .find(|s| s.organization_id == organization_id && s.status.is_open())
            .cloned())
    }

    async fn list(&self, page: PageRequest) -> AppResult<Page<Subscription>> {
        let mut subscriptions: Vec<Subscription> = self
            .data
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .cloned()
            .collect();
        subscriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(subscriptions, page))
    }

    async fn list_by_organization(
        &self,
        organization_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Subscription>> {
        let mut subscriptions: Vec<Subscription> = self
            .data
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .filter(|s| s.organization_id == organization_id)
            .cloned()
            .collect();
        subscriptions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(paginate(subscriptions, page))
    }

    async fn list_due(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        let mut due: Vec<Subscription> = self
            .data
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .filter(|s| s.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|s| (s.current_period_end, s.id));
        Ok(due)
    }

    async fn list_elapsed_trials(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        let mut trials: Vec<Subscription> = self
            .data
            .lock()
            .unwrap()
            .subscriptions
            .values()
            .filter(|s| s.is_trial_elapsed(now))
            .cloned()
            .collect();
        trials.sort_by_key(|s| (s.trial_end_date, s.id));
        Ok(trials)
    }

    async fn insert(
        &self,
        subscription: &Subscription,
        invoice: Option<&InvoiceWithItems>,
    ) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        if data.live_organization(subscription.organization_id).is_none() {
            return Err(AppError::NotFound("Organization not found".into()));
        }
        if subscription.status.is_open()
            && data.subscriptions.values().any(|s| {
                s.organization_id == subscription.organization_id && s.status.is_open()
            })
        {
            return Err(AppError::Conflict(
                "Organization already has an active subscription".into(),
            ));
        }
        self.check_invoice_write(invoice)?;

        let mut staged = data.clone();
        staged
            .subscriptions
            .insert(subscription.id, subscription.clone());
        if let Some(invoice) = invoice {
            staged.write_invoice(invoice)?;
        }
        *data = staged;
        Ok(())
    }

    async fn apply_transition(
        &self,
        subscription: &Subscription,
        guard: TransitionGuard,
        invoice: Option<&InvoiceWithItems>,
    ) -> AppResult<()> {
        let mut data = self.data.lock().unwrap();
        let matches = data.subscriptions.get(&subscription.id).is_some_and(|stored| {
            stored.status == guard.status && stored.current_period_end == guard.current_period_end
        });
        if !matches {
            return Err(AppError::Conflict(
                "Subscription was modified concurrently; retry the operation".into(),
            ));
        }
        self.check_invoice_write(invoice)?;

        let mut staged = data.clone();
        staged
            .subscriptions
            .insert(subscription.id, subscription.clone());
        if let Some(invoice) = invoice {
            staged.write_invoice(invoice)?;
        }
        *data = staged;
        Ok(())
    }
}

// ============================================================================
// InvoiceRepo
// ============================================================================

#[async_trait]
impl InvoiceRepo for InMemoryBillingStore {
    async fn next_invoice_sequence(&self) -> AppResult<i64> {
        Ok(self.invoice_sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn get_by_id(&self, id: Uuid) -> AppResult<Option<InvoiceWithItems>> {
        let data = self.data.lock().unwrap();
        Ok(data.invoices.get(&id).map(|i| data.with_items(i)))
    }

    async fn get_by_number(&self, invoice_number: &str) -> AppResult<Option<InvoiceWithItems>> {
        let data = self.data.lock().unwrap();
        Ok(data
            .invoices
            .values()
            .find(|i| i.invoice_number == invoice_number)
            .map(|i| data.with_items(i)))
    }

    async fn list(&self, page: PageRequest) -> AppResult<Page<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .data
            .lock()
            .unwrap()
            .invoices
            .values()
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.issue_date.cmp(&a.issue_date).then(a.id.cmp(&b.id)));
        Ok(paginate(invoices, page))
    }

    async fn list_by_organization(
        &self,
        organization_id: Uuid,
        page: PageRequest,
    ) -> AppResult<Page<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .data
            .lock()
            .unwrap()
            .invoices
            .values()
            .filter(|i| i.organization_id == organization_id)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.issue_date.cmp(&a.issue_date).then(a.id.cmp(&b.id)));
        Ok(paginate(invoices, page))
    }

    async fn list_by_subscription(&self, subscription_id: Uuid) -> AppResult<Vec<Invoice>> {
        Ok(self.invoices_for(subscription_id))
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .data
            .lock()
            .unwrap()
            .invoices
            .values()
            .filter(|i| i.status.is_collectible() && i.due_date < now)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| (i.due_date, i.id));
        Ok(invoices)
    }

    async fn list_by_issue_date(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        page: PageRequest,
    ) -> AppResult<Page<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .data
            .lock()
            .unwrap()
            .invoices
            .values()
            .filter(|i| i.issue_date >= from && i.issue_date <= to)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.issue_date.cmp(&a.issue_date).then(a.id.cmp(&b.id)));
        Ok(paginate(invoices, page))
    }
}
