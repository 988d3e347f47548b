//! Read-side port for billing queries.
//!
//! Queries here run outside any unit of work and never mutate state.

use async_trait::async_trait;

use crate::domain::billing::{OrderCode, Payment, PaymentLog, UserSubscription};
use crate::domain::foundation::{DomainError, PaymentId, SubscriptionId, Timestamp, UserId};

#[async_trait]
pub trait BillingReader: Send + Sync {
    async fn find_payment(&self, id: PaymentId) -> Result<Option<Payment>, DomainError>;

    async fn find_payment_by_order_code(
        &self,
        order_code: OrderCode,
    ) -> Result<Option<Payment>, DomainError>;

    async fn find_subscription(
        &self,
        id: SubscriptionId,
    ) -> Result<Option<UserSubscription>, DomainError>;

    /// Ledger entries of a payment, oldest first.
    async fn list_payment_logs(&self, payment_id: PaymentId) -> Result<Vec<PaymentLog>, DomainError>;

    /// Non-deleted payments of a user, newest first.
    async fn list_user_payments(&self, user_id: &UserId) -> Result<Vec<Payment>, DomainError>;

    /// Pending payments created before `cutoff`, oldest first.
    async fn find_stale_pending_payments(
        &self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<Payment>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn billing_reader_is_object_safe() {
        fn _accepts_dyn(_reader: &dyn BillingReader) {}
    }
}
