//! Per-user payment statistics.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::Timestamp;

use super::{Payment, PaymentStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStats {
    pub total: u64,
    pub successful: u64,
    pub pending: u64,
    pub failed: u64,
    pub cancelled: u64,
    /// Sum of completed payment amounts.
    pub total_amount: i64,
    pub last_payment_at: Option<Timestamp>,
}

impl PaymentStats {
    /// Aggregates statistics over a user's non-deleted payments.
    pub fn from_payments<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> Self {
        let mut stats = PaymentStats::default();
        for payment in payments.into_iter().filter(|p| p.deleted_at.is_none()) {
            stats.total += 1;
            match payment.status {
                PaymentStatus::Completed => {
                    stats.successful += 1;
                    stats.total_amount += payment.amount;
                }
                PaymentStatus::Pending => stats.pending += 1,
                PaymentStatus::Failed => stats.failed += 1,
                PaymentStatus::Cancelled => stats.cancelled += 1,
            }
            if stats.last_payment_at.map_or(true, |last| payment.created_at > last) {
                stats.last_payment_at = Some(payment.created_at);
            }
        }
        stats
    }
}
