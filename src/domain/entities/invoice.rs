use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    sqlx::Type,
    AsRefStr,
    Display,
    EnumString,
)]
#[sqlx(type_name = "invoice_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
    Canceled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
            InvoiceStatus::Canceled => "canceled",
        }
    }

    /// Statuses that still expect a payment.
    pub fn is_collectible(&self) -> bool {
        matches!(
            self,
            InvoiceStatus::Draft | InvoiceStatus::Sent | InvoiceStatus::Overdue
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub subscription_id: Option<Uuid>,
    pub invoice_number: String,
    pub status: InvoiceStatus,
    pub subtotal: Decimal,
    pub tax_amount: Decimal,
    pub discount_amount: Decimal,
    pub total: Decimal,
    pub currency: String,
    pub issue_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn is_paid(&self) -> bool {
        self.status == InvoiceStatus::Paid && self.paid_at.is_some()
    }

    /// Past due and not paid. Overdue listings additionally skip canceled invoices.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != InvoiceStatus::Paid && self.due_date < now
    }

    /// total = subtotal + tax - discount
    pub fn recompute_total(&mut self) {
        self.total = self.subtotal + self.tax_amount - self.discount_amount;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceItem {
    pub id: Uuid,
    pub invoice_id: Uuid,
    pub description: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceItem {
    pub fn new(
        id: Uuid,
        invoice_id: Uuid,
        description: impl Into<String>,
        quantity: i32,
        unit_price: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        InvoiceItem {
            id,
            invoice_id,
            description: description.into(),
            quantity,
            unit_price,
            amount: unit_price * Decimal::from(quantity),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_quantity(&mut self, quantity: i32) {
        self.quantity = quantity;
        self.recompute_amount();
    }

    pub fn set_unit_price(&mut self, unit_price: Decimal) {
        self.unit_price = unit_price;
        self.recompute_amount();
    }

    fn recompute_amount(&mut self) {
        self.amount = self.unit_price * Decimal::from(self.quantity);
    }
}

/// An invoice together with its line items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceWithItems {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
}
