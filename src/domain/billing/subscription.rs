//! User subscription - one entitlement period of a user to a plan.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    PlanId, StateMachine, SubscriptionId, Timestamp, UserId, ValidationError,
};

/// Subscription lifecycle.
///
/// ```text
/// Pending ──► Active ──► Expired
///    │          │  ▲
///    │          ▼  │ (restoration)
///    └──────► Canceled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Expired,
    Canceled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Canceled => "canceled",
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SubscriptionStatus::*;
        matches!(
            (self, target),
            (Pending, Active)
                | (Pending, Canceled)
                | (Active, Canceled)
                | (Active, Expired)
                | (Canceled, Active)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending => vec![Active, Canceled],
            Active => vec![Canceled, Expired],
            Canceled => vec![Active],
            Expired => vec![],
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(SubscriptionStatus::Pending),
            "active" => Ok(SubscriptionStatus::Active),
            "expired" => Ok(SubscriptionStatus::Expired),
            "canceled" | "cancelled" => Ok(SubscriptionStatus::Canceled),
            other => Err(ValidationError::invalid_format(
                "subscription_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

/// One entitlement period for a user to a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSubscription {
    pub id: SubscriptionId,
    pub user_id: UserId,
    pub plan_id: PlanId,
    pub start_date: Timestamp,
    pub end_date: Timestamp,
    pub status: SubscriptionStatus,
    pub auto_renew: bool,
    /// Set the first time the subscription becomes active.
    pub activated_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl UserSubscription {
    /// Creates the pending half of a purchase intent.
    pub fn new_pending(user_id: UserId, plan_id: PlanId, duration_days: i64, now: Timestamp) -> Self {
        Self {
            id: SubscriptionId::new(),
            user_id,
            plan_id,
            start_date: now,
            end_date: now.add_days(duration_days),
            status: SubscriptionStatus::Pending,
            auto_renew: false,
            activated_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Creates an immediately active subscription (free plan grants).
    pub fn new_active(user_id: UserId, plan_id: PlanId, duration_days: i64, now: Timestamp) -> Self {
        Self {
            status: SubscriptionStatus::Active,
            activated_at: Some(now),
            ..Self::new_pending(user_id, plan_id, duration_days, now)
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SubscriptionStatus::Active
    }

    /// Active, but its period has already ended.
    pub fn is_lapsed(&self, now: &Timestamp) -> bool {
        self.is_active() && !self.end_date.is_after(now)
    }

    /// Active and still inside its entitlement period.
    pub fn grants_access(&self, now: &Timestamp) -> bool {
        self.is_active() && self.end_date.is_after(now) && self.deleted_at.is_none()
    }

    /// Whether this subscription may be reactivated after another purchase was abandoned.
    ///
    /// Only subscriptions that were paid for (or granted) at some point qualify,
    /// so an abandoned checkout can never be turned into free access.
    pub fn is_restorable(&self, now: &Timestamp) -> bool {
        self.status == SubscriptionStatus::Canceled
            && self.activated_at.is_some()
            && self.deleted_at.is_none()
            && self.end_date.is_after(now)
    }
}
