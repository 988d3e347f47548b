//! Billing store port - transactional access to payments, subscriptions and the ledger.
//!
//! Every state change goes through an explicit unit of work:
//!
//! ```ignore
//! let mut tx = store.begin().await?;
//! if tx.transition_payment(id, PaymentStatus::Pending, PaymentStatus::Completed, now).await? {
//!     tx.append_log(&entry).await?;
//! }
//! tx.commit().await?;
//! ```
//!
//! Dropping a transaction without calling `commit` discards its writes.
//!
//! # Concurrency contract
//!
//! - `transition_payment` and `transition_subscription` are conditional updates:
//!   they only apply when the stored status matches `from`, and report whether
//!   a row changed.
//! - `lock_user` serializes entitlement changes for one user until the
//!   transaction ends.

use async_trait::async_trait;

use crate::domain::billing::{
    OrderCode, Payment, PaymentLog, PaymentStatus, SubscriptionStatus, UserSubscription,
};
use crate::domain::foundation::{DomainError, PlanId, PaymentId, SubscriptionId, Timestamp, UserId};

/// Outcome of inserting a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// Payment was stored.
    Inserted,
    /// Another payment already uses the order code; nothing was written.
    DuplicateOrderCode,
}

/// Opens units of work against the billing tables.
#[async_trait]
pub trait BillingStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn BillingTransaction>, DomainError>;
}

/// A single unit of work. All reads observe the transaction's own writes.
#[async_trait]
pub trait BillingTransaction: Send {
    /// Serialize subscription changes for this user until commit or drop.
    async fn lock_user(&mut self, user_id: &UserId) -> Result<(), DomainError>;

    async fn find_payment_by_order_code(
        &mut self,
        order_code: OrderCode,
    ) -> Result<Option<Payment>, DomainError>;

    /// The user's pending payment whose subscription targets `plan_id`.
    async fn find_pending_payment_for_plan(
        &mut self,
        user_id: &UserId,
        plan_id: PlanId,
    ) -> Result<Option<Payment>, DomainError>;

    async fn insert_payment(&mut self, payment: &Payment) -> Result<InsertOutcome, DomainError>;

    /// Conditionally moves a payment from `from` to `to`.
    ///
    /// Returns `false` when the payment is no longer in `from`.
    async fn transition_payment(
        &mut self,
        id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
        now: Timestamp,
    ) -> Result<bool, DomainError>;

    async fn append_log(&mut self, entry: &PaymentLog) -> Result<(), DomainError>;

    async fn insert_subscription(&mut self, subscription: &UserSubscription)
        -> Result<(), DomainError>;

    async fn find_subscription(
        &mut self,
        id: SubscriptionId,
    ) -> Result<Option<UserSubscription>, DomainError>;

    /// Non-deleted subscriptions of a user, newest first.
    async fn find_user_subscriptions(
        &mut self,
        user_id: &UserId,
    ) -> Result<Vec<UserSubscription>, DomainError>;

    /// Conditionally moves a subscription whose status is one of `from` to `to`.
    ///
    /// Moving to `Active` records `activated_at` when it is not set yet.
    async fn transition_subscription(
        &mut self,
        id: SubscriptionId,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
        now: Timestamp,
    ) -> Result<bool, DomainError>;

    /// Cancels every active or pending subscription of the user except one.
    async fn cancel_other_subscriptions(
        &mut self,
        user_id: &UserId,
        except: SubscriptionId,
        now: Timestamp,
    ) -> Result<Vec<SubscriptionId>, DomainError>;

    async fn commit(self: Box<Self>) -> Result<(), DomainError>;
}
