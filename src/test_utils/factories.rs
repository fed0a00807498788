//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use chrono::{DateTime, Duration, Months, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    application::use_cases::plan_catalog::CreatePlanInput,
    domain::entities::{
        invoice::{Invoice, InvoiceItem, InvoiceStatus, InvoiceWithItems},
        organization::Organization,
        plan::Plan,
        subscription::{Subscription, SubscriptionStatus},
    },
};

/// Fixed "now" shared by factories and the default harness clock.
pub fn test_datetime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
}

/// Create a test organization with sensible defaults.
pub fn create_test_organization(overrides: impl FnOnce(&mut Organization)) -> Organization {
    let mut organization = Organization {
        id: Uuid::new_v4(),
        name: "Acme Corp".to_string(),
        slug: "acme-corp".to_string(),
        description: Some("Widgets and gadgets".to_string()),
        email: Some("billing@acme.test".to_string()),
        is_active: true,
        created_at: test_datetime(),
        updated_at: test_datetime(),
    };
    overrides(&mut organization);
    organization
}

/// Create a test plan: monthly, 29.99 USD, no trial.
pub fn create_test_plan(overrides: impl FnOnce(&mut Plan)) -> Plan {
    let mut plan = Plan {
        id: Uuid::new_v4(),
        name: "Basic Plan".to_string(),
        slug: "basic-plan".to_string(),
        description: "Everything a small team needs".to_string(),
        price: Decimal::new(2999, 2),
        currency: "USD".to_string(),
        interval: "monthly".to_string(),
        features: vec!["API access".to_string(), "Email support".to_string()],
        trial_days: 0,
        is_active: true,
        is_popular: false,
        created_at: test_datetime(),
        updated_at: test_datetime(),
    };
    overrides(&mut plan);
    plan
}

/// Valid plan creation input matching [`create_test_plan`].
pub fn create_plan_input(overrides: impl FnOnce(&mut CreatePlanInput)) -> CreatePlanInput {
    let mut input = CreatePlanInput {
        name: "Basic Plan".to_string(),
        description: "Everything a small team needs".to_string(),
        price: Decimal::new(2999, 2),
        currency: "USD".to_string(),
        interval: "monthly".to_string(),
        features: vec!["API access".to_string()],
        trial_days: 0,
        is_popular: false,
    };
    overrides(&mut input);
    input
}

/// Create an active subscription that started ten days before [`test_datetime`]
/// and runs for one month.
pub fn create_test_subscription(
    organization_id: Uuid,
    plan_id: Uuid,
    overrides: impl FnOnce(&mut Subscription),
) -> Subscription {
    let start = test_datetime() - Duration::days(10);
    let end = start.checked_add_months(Months::new(1)).unwrap();
    let mut subscription = Subscription {
        id: Uuid::new_v4(),
        organization_id,
        plan_id,
        status: SubscriptionStatus::Active,
        start_date: start,
        end_date: Some(end),
        trial_end_date: None,
        current_period_start: start,
        current_period_end: end,
        canceled_at: None,
        auto_renew: true,
        created_at: start,
        updated_at: start,
    };
    overrides(&mut subscription);
    subscription
}

/// Create a draft invoice with a single line item.
pub fn create_test_invoice(
    organization_id: Uuid,
    overrides: impl FnOnce(&mut Invoice),
) -> InvoiceWithItems {
    let issued = test_datetime();
    let mut invoice = Invoice {
        id: Uuid::new_v4(),
        organization_id,
        subscription_id: None,
        invoice_number: "INV-20240615-000001".to_string(),
        status: InvoiceStatus::Draft,
        subtotal: Decimal::new(2999, 2),
        tax_amount: Decimal::ZERO,
        discount_amount: Decimal::ZERO,
        total: Decimal::new(2999, 2),
        currency: "USD".to_string(),
        issue_date: issued,
        due_date: issued + Duration::days(30),
        paid_at: None,
        notes: None,
        created_at: issued,
        updated_at: issued,
    };
    overrides(&mut invoice);
    let item = InvoiceItem::new(
        Uuid::new_v4(),
        invoice.id,
        "Basic Plan - monthly subscription",
        1,
        invoice.subtotal,
        invoice.created_at,
    );
    InvoiceWithItems {
        invoice,
        items: vec![item],
    }
}
