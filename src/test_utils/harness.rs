use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::{
    application::{
        ports::ids::UuidV4Generator,
        use_cases::{
            invoice::{InvoiceGenerator, InvoiceUseCases},
            organization::OrganizationUseCases,
            plan_catalog::PlanCatalogUseCases,
            subscription::SubscriptionUseCases,
        },
    },
    test_utils::{FixedClock, InMemoryBillingStore, test_datetime},
};

/// Every use case wired to one in-memory store and one fixed clock.
pub struct BillingHarness {
    pub store: Arc<InMemoryBillingStore>,
    pub clock: Arc<FixedClock>,
    pub plans: Arc<PlanCatalogUseCases>,
    pub organizations: Arc<OrganizationUseCases>,
    pub subscriptions: Arc<SubscriptionUseCases>,
    pub invoices: Arc<InvoiceUseCases>,
}

impl Default for BillingHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl BillingHarness {
    pub fn new() -> Self {
        Self::at(test_datetime())
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        let store = Arc::new(InMemoryBillingStore::new());
        let clock = Arc::new(FixedClock::new(now));
        let ids = Arc::new(UuidV4Generator);

        let generator = Arc::new(InvoiceGenerator::new(
            store.clone(),
            clock.clone(),
            ids.clone(),
        ));

        let plans = Arc::new(PlanCatalogUseCases::new(
            store.clone(),
            clock.clone(),
            ids.clone(),
        ));
        let organizations = Arc::new(OrganizationUseCases::new(
            store.clone(),
            clock.clone(),
            ids.clone(),
        ));
        let subscriptions = Arc::new(SubscriptionUseCases::new(
            store.clone(),
            store.clone(),
            store.clone(),
            generator,
            clock.clone(),
            ids,
        ));
        let invoices = Arc::new(InvoiceUseCases::new(
            store.clone(),
            store.clone(),
            clock.clone(),
        ));

        Self {
            store,
            clock,
            plans,
            organizations,
            subscriptions,
            invoices,
        }
    }

    pub fn generator(&self) -> InvoiceGenerator {
        InvoiceGenerator::new(
            self.store.clone(),
            self.clock.clone(),
            Arc::new(UuidV4Generator),
        )
    }
}
