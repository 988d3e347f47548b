//! Append-only ledger of payment status transitions.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{PaymentId, PaymentLogId, Timestamp};

use super::PaymentStatus;

/// One ledger entry. Written once per status transition, never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentLog {
    pub id: PaymentLogId,
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
    pub description: String,
    pub created_at: Timestamp,
}

impl PaymentLog {
    pub fn new(
        payment_id: PaymentId,
        status: PaymentStatus,
        description: impl Into<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: PaymentLogId::new(),
            payment_id,
            status,
            description: description.into(),
            created_at: now,
        }
    }

    pub fn initiated(payment_id: PaymentId, plan_name: &str, now: Timestamp) -> Self {
        Self::new(
            payment_id,
            PaymentStatus::Pending,
            format!("Payment initiated for subscription plan: {}", plan_name),
            now,
        )
    }

    pub fn superseded(payment_id: PaymentId, now: Timestamp) -> Self {
        Self::new(
            payment_id,
            PaymentStatus::Cancelled,
            "Payment cancelled to create new payment link",
            now,
        )
    }

    pub fn completed(payment_id: PaymentId, reference: &str, now: Timestamp) -> Self {
        Self::new(
            payment_id,
            PaymentStatus::Completed,
            format!("Payment completed successfully via PayOS. Reference: {}", reference),
            now,
        )
    }

    pub fn cancelled_by_provider(payment_id: PaymentId, reason: &str, now: Timestamp) -> Self {
        Self::new(
            payment_id,
            PaymentStatus::Cancelled,
            format!("Payment cancelled via PayOS. Reason: {}", reason),
            now,
        )
    }

    /// Cancellation initiated through the browser redirect.
    pub fn cancelled_by_user(payment_id: PaymentId, reason: Option<&str>, now: Timestamp) -> Self {
        let description = match reason.map(str::trim).filter(|r| !r.is_empty()) {
            Some(r) => r.to_string(),
            None => "Payment cancelled by user".to_string(),
        };
        Self::new(payment_id, PaymentStatus::Cancelled, description, now)
    }

    pub fn failed(payment_id: PaymentId, reason: &str, now: Timestamp) -> Self {
        Self::new(
            payment_id,
            PaymentStatus::Failed,
            format!("Payment failed: {}", reason),
            now,
        )
    }

    pub fn timed_out(payment_id: PaymentId, threshold_minutes: i64, now: Timestamp) -> Self {
        Self::new(
            payment_id,
            PaymentStatus::Failed,
            format!(
                "Payment timed out - no response received within {} minutes",
                threshold_minutes
            ),
            now,
        )
    }
}
