//! Shared fixture for billing handler tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::adapters::memory::{InMemoryBillingStore, InMemoryCatalog};
use crate::adapters::payos::MockPaymentGateway;
use crate::domain::billing::{
    OrderCode, Payment, PaymentLog, PaymentStatus, Plan, RestorationPolicy, SubscriptionStatus,
    UserProfile, UserSubscription,
};
use crate::domain::foundation::{PlanId, Timestamp, UserId};
use crate::ports::BillingReader;

use super::{
    CancelPaymentIntentHandler, CheckPaymentStatusHandler, CheckoutUrlDefaults,
    CreatePaymentIntentHandler, GetPaymentDetailsHandler, ReconcileWebhookHandler,
    SubscriptionLifecycle, SweepPaymentTimeoutsHandler,
};

pub(crate) struct Fixture {
    pub store: InMemoryBillingStore,
    pub catalog: InMemoryCatalog,
    pub gateway: MockPaymentGateway,
    pub user: UserProfile,
    pub premium: Plan,
    pub free: Plan,
    next_order_code: AtomicI64,
}

impl Fixture {
    pub async fn new() -> Self {
        Self::build(MockPaymentGateway::new(), true).await
    }

    pub async fn with_gateway(gateway: MockPaymentGateway) -> Self {
        Self::build(gateway, true).await
    }

    pub async fn without_free_plan() -> Self {
        Self::build(MockPaymentGateway::new(), false).await
    }

    async fn build(gateway: MockPaymentGateway, with_free_plan: bool) -> Self {
        let catalog = InMemoryCatalog::new();
        let user = UserProfile {
            id: UserId::new("user-1").unwrap(),
            email: "buyer@example.com".to_string(),
            name: Some("Buyer".to_string()),
        };
        let premium = plan("Premium", 99_000, 30);
        let free = plan("Free", 0, 365);

        catalog.add_user(user.clone()).await;
        catalog.add_plan(premium.clone()).await;
        if with_free_plan {
            catalog.add_plan(free.clone()).await;
        }

        Self {
            store: InMemoryBillingStore::new(),
            catalog,
            gateway,
            user,
            premium,
            free,
            next_order_code: AtomicI64::new(1000),
        }
    }

    pub async fn add_plan(&self, name: &str, price: i64) -> Plan {
        let p = plan(name, price, 30);
        self.catalog.add_plan(p.clone()).await;
        p
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Seeding
    // ════════════════════════════════════════════════════════════════════════════

    pub async fn seed_pending_subscription(&self, plan_id: PlanId, created_at: Timestamp) -> UserSubscription {
        let sub = UserSubscription::new_pending(self.user.id.clone(), plan_id, 30, created_at);
        self.store.seed_subscription(sub.clone()).await;
        sub
    }

    pub async fn seed_active_subscription(&self, plan_id: PlanId, created_at: Timestamp) -> UserSubscription {
        let sub = UserSubscription::new_active(self.user.id.clone(), plan_id, 30, created_at);
        self.store.seed_subscription(sub.clone()).await;
        sub
    }

    /// A subscription that was paid for and later replaced.
    pub async fn seed_cancelled_paid_subscription(
        &self,
        plan_id: PlanId,
        created_at: Timestamp,
    ) -> UserSubscription {
        let mut sub = UserSubscription::new_active(self.user.id.clone(), plan_id, 30, created_at);
        sub.status = SubscriptionStatus::Canceled;
        self.store.seed_subscription(sub.clone()).await;
        sub
    }

    /// A pending subscription and its pending payment, with an "initiated" ledger entry.
    pub async fn seed_pending_intent(
        &self,
        plan_id: PlanId,
        created_at: Timestamp,
    ) -> (UserSubscription, Payment) {
        self.seed_intent(plan_id, PaymentStatus::Pending, created_at).await
    }

    pub async fn seed_intent(
        &self,
        plan_id: PlanId,
        status: PaymentStatus,
        created_at: Timestamp,
    ) -> (UserSubscription, Payment) {
        let sub = self.seed_pending_subscription(plan_id, created_at).await;
        let code = OrderCode::new(self.next_order_code.fetch_add(1, Ordering::SeqCst)).unwrap();
        let mut payment = Payment::new_pending(self.user.id.clone(), sub.id, self.premium.price, code, created_at);
        payment.status = status;
        self.store.seed_payment(payment.clone()).await;

        let mut tx = crate::ports::BillingStore::begin(&self.store).await.unwrap();
        tx.append_log(&PaymentLog::initiated(payment.id, "Premium", created_at))
            .await
            .unwrap();
        tx.commit().await.unwrap();

        (sub, payment)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Handlers
    // ════════════════════════════════════════════════════════════════════════════

    pub fn reader(&self) -> Arc<dyn BillingReader> {
        Arc::new(self.store.clone())
    }

    pub fn lifecycle(&self) -> SubscriptionLifecycle {
        SubscriptionLifecycle::new(Arc::new(self.store.clone()), Arc::new(self.catalog.clone()))
    }

    pub fn intent_handler(&self) -> CreatePaymentIntentHandler {
        CreatePaymentIntentHandler::new(
            Arc::new(self.store.clone()),
            Arc::new(self.catalog.clone()),
            Arc::new(self.catalog.clone()),
            Arc::new(self.gateway.clone()),
            CheckoutUrlDefaults {
                client_url: "https://app.example.com".to_string(),
                public_url: "https://api.example.com/".to_string(),
            },
        )
    }

    pub fn reconcile_handler(&self) -> ReconcileWebhookHandler {
        self.reconcile_handler_with(RestorationPolicy::default())
    }

    pub fn reconcile_handler_with(&self, policy: RestorationPolicy) -> ReconcileWebhookHandler {
        ReconcileWebhookHandler::new(
            Arc::new(self.store.clone()),
            self.reader(),
            Arc::new(self.gateway.clone()),
            self.lifecycle(),
            policy,
        )
    }

    pub fn sweep_handler(&self) -> SweepPaymentTimeoutsHandler {
        SweepPaymentTimeoutsHandler::new(
            Arc::new(self.store.clone()),
            self.reader(),
            Arc::new(self.gateway.clone()),
            self.lifecycle(),
            RestorationPolicy::default(),
        )
    }

    pub fn cancel_handler(&self) -> CancelPaymentIntentHandler {
        CancelPaymentIntentHandler::new(
            Arc::new(self.store.clone()),
            self.reader(),
            Arc::new(self.gateway.clone()),
            self.lifecycle(),
            RestorationPolicy::default(),
        )
    }

    pub fn status_handler(&self) -> CheckPaymentStatusHandler {
        CheckPaymentStatusHandler::new(
            self.reader(),
            Arc::new(self.gateway.clone()),
            Arc::new(self.reconcile_handler()),
        )
    }

    pub fn details_handler(&self) -> GetPaymentDetailsHandler {
        GetPaymentDetailsHandler::new(
            self.reader(),
            Arc::new(self.catalog.clone()),
            Arc::new(self.catalog.clone()),
        )
    }
}

fn plan(name: &str, price: i64, duration_days: i64) -> Plan {
    Plan {
        id: PlanId::new(),
        name: name.to_string(),
        description: None,
        price,
        duration_days,
    }
}
