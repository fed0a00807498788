use chrono::{DateTime, Utc};
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
#[sqlx(type_name = "subscription_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionStatus {
    Trialing,
    Active,
    Canceled,
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Expired => "expired",
        }
    }

    /// Trialing and active subscriptions count against the one-per-organization limit.
    pub fn is_open(&self) -> bool {
        matches!(self, SubscriptionStatus::Trialing | SubscriptionStatus::Active)
    }

    /// Status changes reachable from this status. Renewal keeps a subscription
    /// `Active` and is not listed here. A trial expires when renewal was turned
    /// off before it ended.
    pub fn valid_transitions(&self) -> &'static [SubscriptionStatus] {
        match self {
            SubscriptionStatus::Trialing => &[
                SubscriptionStatus::Active,
                SubscriptionStatus::Canceled,
                SubscriptionStatus::Expired,
            ],
            SubscriptionStatus::Active => {
                &[SubscriptionStatus::Canceled, SubscriptionStatus::Expired]
            }
            SubscriptionStatus::Canceled | SubscriptionStatus::Expired => &[],
        }
    }

    pub fn can_transition_to(&self, target: SubscriptionStatus) -> bool {
        self.valid_transitions().contains(&target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
    pub trial_end_date: Option<DateTime<Utc>>,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub canceled_at: Option<DateTime<Utc>>,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn is_in_trial(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Trialing
            && self.trial_end_date.is_some_and(|end| now < end)
    }

    /// Active with the current period already over.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.current_period_end <= now
    }

    /// Trialing with the trial already over.
    pub fn is_trial_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Trialing
            && self.trial_end_date.is_some_and(|end| end <= now)
    }
}
