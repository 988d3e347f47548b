//! In-memory billing store for tests and local development.
//!
//! A transaction takes the store-wide lock, works on a private copy of the
//! tables, and publishes the copy on commit. This makes every unit of work
//! fully serialized, which trivially satisfies the per-user lock contract.
//!
//! # Note
//!
//! A task must not open a second transaction (or call a reader method)
//! while it still holds one; doing so waits on itself.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::domain::billing::{
    OrderCode, Payment, PaymentLog, PaymentStatus, SubscriptionStatus, UserSubscription,
};
use crate::domain::foundation::{
    DomainError, PaymentId, PlanId, StateMachine, SubscriptionId, Timestamp, UserId,
};
use crate::ports::{BillingReader, BillingStore, BillingTransaction, InsertOutcome};

#[derive(Debug, Clone, Default)]
struct BillingTables {
    payments: Vec<Payment>,
    subscriptions: Vec<UserSubscription>,
    logs: Vec<PaymentLog>,
}

/// In-memory implementation of `BillingStore` and `BillingReader`.
#[derive(Clone, Default)]
pub struct InMemoryBillingStore {
    tables: Arc<Mutex<BillingTables>>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Inserts a payment directly, bypassing any checks.
    pub async fn seed_payment(&self, payment: Payment) {
        self.tables.lock().await.payments.push(payment);
    }

    /// Inserts a subscription directly, bypassing any checks.
    pub async fn seed_subscription(&self, subscription: UserSubscription) {
        self.tables.lock().await.subscriptions.push(subscription);
    }

    pub async fn payments(&self) -> Vec<Payment> {
        self.tables.lock().await.payments.clone()
    }

    pub async fn subscriptions(&self) -> Vec<UserSubscription> {
        self.tables.lock().await.subscriptions.clone()
    }

    pub async fn subscription(&self, id: SubscriptionId) -> Option<UserSubscription> {
        self.tables
            .lock()
            .await
            .subscriptions
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    pub async fn payment(&self, id: PaymentId) -> Option<Payment> {
        self.tables
            .lock()
            .await
            .payments
            .iter()
            .find(|p| p.id == id)
            .cloned()
    }

    pub async fn logs_for(&self, payment_id: PaymentId) -> Vec<PaymentLog> {
        self.tables
            .lock()
            .await
            .logs
            .iter()
            .filter(|l| l.payment_id == payment_id)
            .cloned()
            .collect()
    }

    /// Subscriptions of a user currently marked active.
    pub async fn active_subscriptions(&self, user_id: &UserId) -> Vec<UserSubscription> {
        self.tables
            .lock()
            .await
            .subscriptions
            .iter()
            .filter(|s| &s.user_id == user_id && s.is_active())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BillingStore for InMemoryBillingStore {
    async fn begin(&self) -> Result<Box<dyn BillingTransaction>, DomainError> {
        let guard = self.tables.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTransaction { guard, working }))
    }
}

struct InMemoryTransaction {
    guard: OwnedMutexGuard<BillingTables>,
    working: BillingTables,
}

impl InMemoryTransaction {
    fn subscription_plan(&self, id: SubscriptionId) -> Option<PlanId> {
        self.working
            .subscriptions
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.plan_id)
    }
}

#[async_trait]
impl BillingTransaction for InMemoryTransaction {
    async fn lock_user(&mut self, _user_id: &UserId) -> Result<(), DomainError> {
        // The store-wide guard is already held.
        Ok(())
    }

    async fn find_payment_by_order_code(
        &mut self,
        order_code: OrderCode,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .working
            .payments
            .iter()
            .find(|p| p.order_code == order_code && p.deleted_at.is_none())
            .cloned())
    }

    async fn find_pending_payment_for_plan(
        &mut self,
        user_id: &UserId,
        plan_id: PlanId,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .working
            .payments
            .iter()
            .filter(|p| &p.user_id == user_id && p.is_pending() && p.deleted_at.is_none())
            .filter(|p| self.subscription_plan(p.subscription_id) == Some(plan_id))
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<InsertOutcome, DomainError> {
        if self
            .working
            .payments
            .iter()
            .any(|p| p.order_code == payment.order_code)
        {
            return Ok(InsertOutcome::DuplicateOrderCode);
        }
        self.working.payments.push(payment.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn transition_payment(
        &mut self,
        id: PaymentId,
        from: PaymentStatus,
        to: PaymentStatus,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        from.transition_to(to)?;
        match self
            .working
            .payments
            .iter_mut()
            .find(|p| p.id == id && p.status == from)
        {
            Some(payment) => {
                payment.status = to;
                payment.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_log(&mut self, entry: &PaymentLog) -> Result<(), DomainError> {
        self.working.logs.push(entry.clone());
        Ok(())
    }

    async fn insert_subscription(
        &mut self,
        subscription: &UserSubscription,
    ) -> Result<(), DomainError> {
        self.working.subscriptions.push(subscription.clone());
        Ok(())
    }

    async fn find_subscription(
        &mut self,
        id: SubscriptionId,
    ) -> Result<Option<UserSubscription>, DomainError> {
        Ok(self
            .working
            .subscriptions
            .iter()
            .find(|s| s.id == id)
            .cloned())
    }

    async fn find_user_subscriptions(
        &mut self,
        user_id: &UserId,
    ) -> Result<Vec<UserSubscription>, DomainError> {
        let mut subs: Vec<UserSubscription> = self
            .working
            .subscriptions
            .iter()
            .filter(|s| &s.user_id == user_id && s.deleted_at.is_none())
            .cloned()
            .collect();
        subs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(subs)
    }

    async fn transition_subscription(
        &mut self,
        id: SubscriptionId,
        from: &[SubscriptionStatus],
        to: SubscriptionStatus,
        now: Timestamp,
    ) -> Result<bool, DomainError> {
        for status in from {
            status.transition_to(to)?;
        }
        match self
            .working
            .subscriptions
            .iter_mut()
            .find(|s| s.id == id && from.contains(&s.status))
        {
            Some(sub) => {
                sub.status = to;
                sub.updated_at = now;
                if to == SubscriptionStatus::Active && sub.activated_at.is_none() {
                    sub.activated_at = Some(now);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn cancel_other_subscriptions(
        &mut self,
        user_id: &UserId,
        except: SubscriptionId,
        now: Timestamp,
    ) -> Result<Vec<SubscriptionId>, DomainError> {
        let mut cancelled = Vec::new();
        for sub in self.working.subscriptions.iter_mut().filter(|s| {
            &s.user_id == user_id
                && s.id != except
                && s.deleted_at.is_none()
                && matches!(s.status, SubscriptionStatus::Active | SubscriptionStatus::Pending)
        }) {
            sub.status = SubscriptionStatus::Canceled;
            sub.updated_at = now;
            cancelled.push(sub.id);
        }
        Ok(cancelled)
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let InMemoryTransaction { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[async_trait]
impl BillingReader for InMemoryBillingStore {
    async fn find_payment(&self, id: PaymentId) -> Result<Option<Payment>, DomainError> {
        Ok(self.payment(id).await.filter(|p| p.deleted_at.is_none()))
    }

    async fn find_payment_by_order_code(
        &self,
        order_code: OrderCode,
    ) -> Result<Option<Payment>, DomainError> {
        Ok(self
            .tables
            .lock()
            .await
            .payments
            .iter()
            .find(|p| p.order_code == order_code && p.deleted_at.is_none())
            .cloned())
    }

    async fn find_subscription(
        &self,
        id: SubscriptionId,
    ) -> Result<Option<UserSubscription>, DomainError> {
        Ok(self.subscription(id).await.filter(|s| s.deleted_at.is_none()))
    }

    async fn list_payment_logs(&self, payment_id: PaymentId) -> Result<Vec<PaymentLog>, DomainError> {
        let mut logs = self.logs_for(payment_id).await;
        logs.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(logs)
    }

    async fn list_user_payments(&self, user_id: &UserId) -> Result<Vec<Payment>, DomainError> {
        let mut payments: Vec<Payment> = self
            .tables
            .lock()
            .await
            .payments
            .iter()
            .filter(|p| &p.user_id == user_id && p.deleted_at.is_none())
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn find_stale_pending_payments(
        &self,
        cutoff: Timestamp,
        limit: u32,
    ) -> Result<Vec<Payment>, DomainError> {
        let mut stale: Vec<Payment> = self
            .tables
            .lock()
            .await
            .payments
            .iter()
            .filter(|p| p.is_stale(&cutoff) && p.deleted_at.is_none())
            .cloned()
            .collect();
        stale.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        stale.truncate(limit as usize);
        Ok(stale)
    }
}
