//! Payment aggregate - one purchase attempt correlated with the provider by order code.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{
    PaymentId, StateMachine, SubscriptionId, Timestamp, UserId, ValidationError,
};

/// Largest integer the provider accepts as an order code (2^53 - 1).
pub const MAX_ORDER_CODE: i64 = 9_007_199_254_740_991;

/// Default settlement currency.
pub const DEFAULT_CURRENCY: &str = "VND";

/// Lifecycle of a payment attempt.
///
/// ```text
/// Pending ──► Completed
///    │
///    ├──────► Cancelled
///    │
///    └──────► Failed
/// ```
///
/// Terminal states never change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Cancelled,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Cancelled => "cancelled",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl StateMachine for PaymentStatus {
    fn can_transition_to(&self, target: &Self) -> bool {
        matches!(
            (self, target),
            (PaymentStatus::Pending, PaymentStatus::Completed)
                | (PaymentStatus::Pending, PaymentStatus::Cancelled)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        match self {
            PaymentStatus::Pending => vec![
                PaymentStatus::Completed,
                PaymentStatus::Cancelled,
                PaymentStatus::Failed,
            ],
            _ => vec![],
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "cancelled" => Ok(PaymentStatus::Cancelled),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(ValidationError::invalid_format(
                "payment_status",
                format!("unknown status '{}'", other),
            )),
        }
    }
}

/// Payment processors a payment can be routed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Stripe,
    Paypal,
    Razorpay,
    Square,
    Momo,
    Vnpay,
    Payos,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Stripe => "stripe",
            ProviderKind::Paypal => "paypal",
            ProviderKind::Razorpay => "razorpay",
            ProviderKind::Square => "square",
            ProviderKind::Momo => "momo",
            ProviderKind::Vnpay => "vnpay",
            ProviderKind::Payos => "payos",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "stripe" => Ok(ProviderKind::Stripe),
            "paypal" => Ok(ProviderKind::Paypal),
            "razorpay" => Ok(ProviderKind::Razorpay),
            "square" => Ok(ProviderKind::Square),
            "momo" => Ok(ProviderKind::Momo),
            "vnpay" => Ok(ProviderKind::Vnpay),
            "payos" => Ok(ProviderKind::Payos),
            other => Err(ValidationError::invalid_format(
                "provider",
                format!("unknown provider '{}'", other),
            )),
        }
    }
}

/// Correlation token shared between a local payment and the provider's record.
///
/// Always a positive integer within the provider's 53-bit range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderCode(i64);

impl OrderCode {
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if value <= 0 || value > MAX_ORDER_CODE {
            return Err(ValidationError::out_of_range(
                "order_code",
                1,
                MAX_ORDER_CODE,
                value,
            ));
        }
        Ok(Self(value))
    }

    /// Generates a fresh code from the clock plus a random suffix.
    ///
    /// Uniqueness is enforced by storage; callers regenerate on collision.
    pub fn generate(now: &Timestamp) -> Self {
        let suffix: i64 = rand::thread_rng().gen_range(0..1000);
        Self(now.as_unix_millis() * 1000 + suffix)
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for OrderCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for OrderCode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim().parse::<i64>().map_err(|_| {
            ValidationError::invalid_format("order_code", format!("'{}' is not a number", s))
        })?;
        Self::new(value)
    }
}

/// One purchase attempt, owning exactly one paired subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub subscription_id: SubscriptionId,
    pub amount: i64,
    pub currency: String,
    pub provider: ProviderKind,
    pub order_code: OrderCode,
    pub status: PaymentStatus,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub deleted_at: Option<Timestamp>,
}

impl Payment {
    /// Creates a new pending payment for a subscription.
    pub fn new_pending(
        user_id: UserId,
        subscription_id: SubscriptionId,
        amount: i64,
        order_code: OrderCode,
        now: Timestamp,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            user_id,
            subscription_id,
            amount,
            currency: DEFAULT_CURRENCY.to_string(),
            provider: ProviderKind::Payos,
            order_code,
            status: PaymentStatus::Pending,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the payment was created before the given cutoff and never resolved.
    pub fn is_stale(&self, cutoff: &Timestamp) -> bool {
        self.is_pending() && self.created_at.is_before(cutoff)
    }
}
