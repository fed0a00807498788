use chrono::{DateTime, Days, Months, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

/// Billing cadence of a plan.
///
/// Plans store the interval as free text so that a bad value written by an
/// operator surfaces as an error at billing time instead of at read time.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BillingInterval {
    Weekly,
    Monthly,
    Yearly,
}

impl BillingInterval {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingInterval::Weekly => "weekly",
            BillingInterval::Monthly => "monthly",
            BillingInterval::Yearly => "yearly",
        }
    }

    /// Moves `from` forward by one interval.
    ///
    /// Month and year steps land on the last day of the target month when the
    /// source day does not exist there (Jan 31 + 1 month = Feb 29 in 2024).
    /// Returns `None` only when the result is outside the representable range.
    pub fn advance(&self, from: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            BillingInterval::Weekly => from.checked_add_days(Days::new(7)),
            BillingInterval::Monthly => from.checked_add_months(Months::new(1)),
            BillingInterval::Yearly => from.checked_add_months(Months::new(12)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub price: Decimal,
    pub currency: String,
    pub interval: String,
    pub features: Vec<String>,
    pub trial_days: i32,
    pub is_active: bool,
    pub is_popular: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// Parsed billing interval, or `None` when the stored text is not one of
    /// `weekly`, `monthly`, `yearly`.
    pub fn billing_interval(&self) -> Option<BillingInterval> {
        self.interval.parse().ok()
    }

    pub fn has_trial(&self) -> bool {
        self.trial_days > 0
    }
}
